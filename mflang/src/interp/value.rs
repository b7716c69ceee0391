//! Runtime values for the interpreter

use super::env::EnvRef;
use super::error::EvalResult;
use super::object::{ClassObject, InstanceObject};
use super::task::AsyncTask;
use crate::ast::{IntentDecl, InterfaceDecl};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Native builtin handler. Builtins receive the interpreter as an explicit
/// context handle; there is no process-global interpreter pointer.
pub type NativeHandler = fn(&mut super::eval::Interpreter, &[Value]) -> EvalResult;

/// A named native function
#[derive(Clone, Copy)]
pub struct NativeFn {
    pub name: &'static str,
    pub handler: NativeHandler,
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

impl PartialEq for NativeFn {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// A native function bound to a receiver value (prototype/container methods)
#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub method: NativeFn,
}

/// A closure: an intent declaration captured together with its defining
/// scope, optionally bound to a receiver and a display name for stack frames.
#[derive(Debug)]
pub struct Closure {
    pub decl: Arc<IntentDecl>,
    pub env: EnvRef,
    pub bound_this: Option<Value>,
    pub bound_name: Option<String>,
}

impl Closure {
    /// Display name used in call frames: `Class.method` when bound,
    /// the declaration name otherwise.
    pub fn frame_name(&self) -> String {
        self.bound_name
            .clone()
            .unwrap_or_else(|| self.decl.name.clone())
    }
}

/// Ordered sequence with a recorded element type argument
#[derive(Debug)]
pub struct ListObject {
    pub elem_type: String,
    pub items: Mutex<Vec<Value>>,
}

impl ListObject {
    pub fn new(elem_type: impl Into<String>) -> Self {
        ListObject {
            elem_type: elem_type.into(),
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn with_items(elem_type: impl Into<String>, items: Vec<Value>) -> Self {
        ListObject {
            elem_type: elem_type.into(),
            items: Mutex::new(items),
        }
    }
}

/// Insertion-ordered key/value mapping. Entries are keyed by full value
/// equality, so any value can act as a key.
#[derive(Debug)]
pub struct MapObject {
    pub key_type: String,
    pub value_type: String,
    pub entries: Mutex<Vec<(Value, Value)>>,
}

impl MapObject {
    pub fn new(key_type: impl Into<String>, value_type: impl Into<String>) -> Self {
        MapObject {
            key_type: key_type.into(),
            value_type: value_type.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries
            .lock()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn insert(&self, key: Value, value: Value) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            entries.push((key, value));
        }
    }

    pub fn remove(&self, key: &Value) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(k, _)| k != key);
        entries.len() != before
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.lock().iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Unique-element set backed by an insertion-ordered vector
#[derive(Debug)]
pub struct SetObject {
    pub elem_type: String,
    pub items: Mutex<Vec<Value>>,
}

impl SetObject {
    pub fn new(elem_type: impl Into<String>) -> Self {
        SetObject {
            elem_type: elem_type.into(),
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, value: Value) -> bool {
        let mut items = self.items.lock();
        if items.iter().any(|v| *v == value) {
            false
        } else {
            items.push(value);
            true
        }
    }

    pub fn remove(&self, value: &Value) -> bool {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|v| v != value);
        items.len() != before
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.lock().iter().any(|v| v == value)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }
}

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<String>),
    List(Arc<ListObject>),
    Map(Arc<MapObject>),
    Set(Arc<SetObject>),
    Closure(Arc<Closure>),
    Class(Arc<ClassObject>),
    Instance(Arc<InstanceObject>),
    Task(Arc<AsyncTask>),
    Native(NativeFn),
    Bound(Arc<BoundMethod>),
    Interface(Arc<InterfaceDecl>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(Arc::new(s.into()))
    }

    /// Check if value is truthy: null, false, numeric zero and the empty
    /// string are falsy; everything else (including empty containers) is
    /// truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Get type name for error messages and the `type()` builtin
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::Set(_) => "Set".to_string(),
            Value::Closure(_) => "intent".to_string(),
            Value::Class(c) => format!("class {}", c.name),
            Value::Instance(i) => i.class.name.clone(),
            Value::Task(_) => "AsyncTask".to_string(),
            Value::Native(_) | Value::Bound(_) => "native".to_string(),
            Value::Interface(i) => format!("interface {}", i.name),
        }
    }

    /// Base type name plus type arguments, as seen by the type matcher.
    /// Containers expose the type arguments they were constructed with;
    /// instances expose their class name.
    pub fn type_expr(&self) -> (String, Vec<String>) {
        match self {
            Value::List(l) => ("List".to_string(), vec![l.elem_type.clone()]),
            Value::Map(m) => (
                "Map".to_string(),
                vec![m.key_type.clone(), m.value_type.clone()],
            ),
            Value::Set(s) => ("Set".to_string(), vec![s.elem_type.clone()]),
            Value::Instance(i) => (i.class.name.clone(), Vec::new()),
            Value::Class(c) => (format!("class {}", c.name), Vec::new()),
            other => (other.type_name(), Vec::new()),
        }
    }

    /// Pointer identity for heap-backed values, used to key the
    /// exception-trace side table. Scalars have no identity.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(Arc::as_ptr(s) as usize),
            Value::List(l) => Some(Arc::as_ptr(l) as usize),
            Value::Map(m) => Some(Arc::as_ptr(m) as usize),
            Value::Set(s) => Some(Arc::as_ptr(s) as usize),
            Value::Closure(c) => Some(Arc::as_ptr(c) as usize),
            Value::Class(c) => Some(Arc::as_ptr(c) as usize),
            Value::Instance(i) => Some(Arc::as_ptr(i) as usize),
            Value::Task(t) => Some(Arc::as_ptr(t) as usize),
            Value::Bound(b) => Some(Arc::as_ptr(b) as usize),
            Value::Interface(i) => Some(Arc::as_ptr(i) as usize),
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Native(_) => {
                None
            }
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Whether this value can be invoked with call syntax
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Closure(_) | Value::Native(_) | Value::Bound(_) | Value::Class(_)
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Str(s) => write!(f, "{s}"),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.items.lock().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.entries.lock().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Set(s) => {
                write!(f, "{{")?;
                for (i, v) in s.items.lock().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
            Value::Closure(c) => write!(f, "<intent {}>", c.frame_name()),
            Value::Class(c) => write!(f, "<class {}>", c.name),
            Value::Instance(i) => write!(f, "<{} instance>", i.class.name),
            Value::Task(_) => write!(f, "<task>"),
            Value::Native(n) => write!(f, "<native {}>", n.name),
            Value::Bound(b) => write!(f, "<native {}>", b.method.name),
            Value::Interface(i) => write!(f, "<interface {}>", i.name),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            // numeric cross-equality: 5 == 5.0
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Arc::ptr_eq(a, b) || *a.items.lock() == *b.items.lock()
            }
            (Value::Map(a), Value::Map(b)) => {
                Arc::ptr_eq(a, b) || *a.entries.lock() == *b.entries.lock()
            }
            (Value::Set(a), Value::Set(b)) => {
                Arc::ptr_eq(a, b) || *a.items.lock() == *b.items.lock()
            }
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
            (Value::Task(a), Value::Task(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a == b,
            (Value::Bound(a), Value::Bound(b)) => Arc::ptr_eq(a, b),
            (Value::Interface(a), Value::Interface(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Convert a runtime value to a serde_json value, for `JSON.stringify`
/// and the native JSON bindings. Non-data values stringify through Display.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::Number((*n).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.to_string()),
        Value::List(l) => serde_json::Value::Array(l.items.lock().iter().map(to_json).collect()),
        Value::Set(s) => serde_json::Value::Array(s.items.lock().iter().map(to_json).collect()),
        Value::Map(m) => {
            let mut object = serde_json::Map::new();
            for (k, v) in m.entries.lock().iter() {
                let key = match k {
                    Value::Str(s) => s.to_string(),
                    other => other.to_string(),
                };
                object.insert(key, to_json(v));
            }
            serde_json::Value::Object(object)
        }
        Value::Instance(i) => {
            let mut object = serde_json::Map::new();
            for (k, v) in i.fields.lock().iter() {
                object.insert(k.clone(), to_json(v));
            }
            serde_json::Value::Object(object)
        }
        other => serde_json::Value::String(other.to_string()),
    }
}

/// Convert a serde_json value into a runtime value, for `JSON.parse`.
pub fn from_json(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::string(s.clone()),
        serde_json::Value::Array(items) => Value::List(Arc::new(ListObject::with_items(
            "any",
            items.iter().map(from_json).collect(),
        ))),
        serde_json::Value::Object(entries) => {
            let map = MapObject::new("string", "any");
            for (k, v) in entries {
                map.insert(Value::string(k.clone()), from_json(v));
            }
            Value::Map(Arc::new(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::Int(42)), "42");
        assert_eq!(format!("{}", Value::Float(3.5)), "3.5");
        assert_eq!(format!("{}", Value::Float(2.0)), "2.0");
        assert_eq!(format!("{}", Value::Bool(true)), "true");
        assert_eq!(format!("{}", Value::Null), "null");
        assert_eq!(format!("{}", Value::string("hi")), "hi");
    }

    #[test]
    fn test_value_truthy() {
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("x").is_truthy());
        // empty containers are truthy
        assert!(Value::List(Arc::new(ListObject::new("any"))).is_truthy());
    }

    #[test]
    fn test_numeric_cross_equality() {
        assert_eq!(Value::Int(5), Value::Float(5.0));
        assert_ne!(Value::Int(5), Value::Float(5.5));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Float(1.0).type_name(), "float");
        assert_eq!(Value::string("x").type_name(), "string");
        assert_eq!(Value::Bool(true).type_name(), "bool");
    }

    #[test]
    fn test_list_type_expr() {
        let list = Value::List(Arc::new(ListObject::new("int")));
        let (base, args) = list.type_expr();
        assert_eq!(base, "List");
        assert_eq!(args, vec!["int".to_string()]);
    }

    #[test]
    fn test_map_operations() {
        let map = MapObject::new("string", "int");
        map.insert(Value::string("a"), Value::Int(1));
        map.insert(Value::string("a"), Value::Int(2));
        map.insert(Value::string("b"), Value::Int(3));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Value::string("a")), Some(Value::Int(2)));
        assert!(map.remove(&Value::string("a")));
        assert!(!map.remove(&Value::string("a")));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_set_deduplicates() {
        let set = SetObject::new("int");
        assert!(set.add(Value::Int(1)));
        assert!(!set.add(Value::Int(1)));
        assert!(set.add(Value::Int(2)));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Value::Int(1)));
        assert!(set.remove(&Value::Int(1)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_identity_only_for_heap_values() {
        assert!(Value::Int(3).identity().is_none());
        assert!(Value::Null.identity().is_none());
        let s = Value::string("x");
        assert!(s.identity().is_some());
        // identity is stable across clones of the same Arc
        assert_eq!(s.identity(), s.clone().identity());
    }

    #[test]
    fn test_json_round_trip() {
        let parsed = from_json(&serde_json::json!({"a": 1, "b": [true, null, "s"], "c": 1.5}));
        let back = to_json(&parsed);
        assert_eq!(back["a"], serde_json::json!(1));
        assert_eq!(back["b"][0], serde_json::json!(true));
        assert_eq!(back["b"][2], serde_json::json!("s"));
        assert_eq!(back["c"], serde_json::json!(1.5));
    }

    #[test]
    fn test_list_display() {
        let list = Value::List(Arc::new(ListObject::with_items(
            "any",
            vec![Value::Int(1), Value::string("two")],
        )));
        assert_eq!(format!("{list}"), "[1, two]");
    }
}
