//! Class and instance objects

use super::error::RuntimeError;
use super::value::Value;
use crate::ast::{ClassDecl, FieldDecl, Member, MethodDecl};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Runtime class: member tables partitioned on the static flag, evaluated
/// static field values, and a parent link resolved at declaration time.
#[derive(Debug)]
pub struct ClassObject {
    pub name: String,
    pub instance_fields: HashMap<String, FieldDecl>,
    pub static_fields: HashMap<String, FieldDecl>,
    pub instance_methods: HashMap<String, Arc<MethodDecl>>,
    pub static_methods: HashMap<String, Arc<MethodDecl>>,
    pub static_field_values: Mutex<HashMap<String, Value>>,
    pub parent: Option<Arc<ClassObject>>,
    pub interfaces: Vec<String>,
    pub is_abstract: bool,
}

impl ClassObject {
    /// Build the member tables from a class declaration. The parent link is
    /// resolved by the evaluator before construction.
    pub fn from_decl(decl: &ClassDecl, parent: Option<Arc<ClassObject>>) -> Self {
        let mut instance_fields = HashMap::new();
        let mut static_fields = HashMap::new();
        let mut instance_methods = HashMap::new();
        let mut static_methods = HashMap::new();

        for member in &decl.members {
            match member {
                Member::Field(field) => {
                    if field.is_static {
                        static_fields.insert(field.name.clone(), field.clone());
                    } else {
                        instance_fields.insert(field.name.clone(), field.clone());
                    }
                }
                Member::Method(method) => {
                    let name = method.intent.name.clone();
                    if method.is_static {
                        static_methods.insert(name, Arc::new(method.clone()));
                    } else {
                        instance_methods.insert(name, Arc::new(method.clone()));
                    }
                }
            }
        }

        ClassObject {
            name: decl.name.clone(),
            instance_fields,
            static_fields,
            instance_methods,
            static_methods,
            static_field_values: Mutex::new(HashMap::new()),
            parent,
            interfaces: decl.implements.clone(),
            is_abstract: decl.is_abstract,
        }
    }

    /// Instance-method lookup walking the parent chain, child to root.
    pub fn get_instance_method(&self, name: &str) -> Option<(Arc<MethodDecl>, &ClassObject)> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(method) = class.instance_methods.get(name) {
                return Some((Arc::clone(method), class));
            }
            current = class.parent.as_deref();
        }
        None
    }

    /// Static-method lookup walking the parent chain.
    pub fn get_static_method(&self, name: &str) -> Option<(Arc<MethodDecl>, &ClassObject)> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(method) = class.static_methods.get(name) {
                return Some((Arc::clone(method), class));
            }
            current = class.parent.as_deref();
        }
        None
    }

    /// Static-field value lookup walking the parent chain.
    pub fn get_static_field_value(&self, name: &str) -> Option<Value> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(value) = class.static_field_values.lock().get(name) {
                return Some(value.clone());
            }
            current = class.parent.as_deref();
        }
        None
    }

    /// Find the class that declares an instance field, walking child to
    /// root. First match wins (single-inheritance shadowing).
    pub fn find_field_decl(&self, name: &str) -> Option<(&FieldDecl, &ClassObject)> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(field) = class.instance_fields.get(name) {
                return Some((field, class));
            }
            current = class.parent.as_deref();
        }
        None
    }

    /// Inheritance chain from this class to the root.
    pub fn chain(self: &Arc<Self>) -> Vec<Arc<ClassObject>> {
        let mut chain = Vec::new();
        let mut current = Some(Arc::clone(self));
        while let Some(class) = current {
            current = class.parent.clone();
            chain.push(class);
        }
        chain
    }

    /// Whether `name` is this class or one of its ancestors.
    pub fn is_or_extends(&self, name: &str) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.name == name {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }
}

/// Runtime instance: a field store plus its class.
#[derive(Debug)]
pub struct InstanceObject {
    pub class: Arc<ClassObject>,
    pub fields: Mutex<HashMap<String, Value>>,
}

impl InstanceObject {
    pub fn new(class: Arc<ClassObject>) -> Self {
        InstanceObject {
            class,
            fields: Mutex::new(HashMap::new()),
        }
    }

    /// Enforce private access for a field. Access is granted only when the
    /// currently executing method (the top call-stack frame's display name)
    /// belongs to the field's *declaring* class.
    fn check_private(&self, name: &str, caller: Option<&str>) -> Result<(), RuntimeError> {
        if let Some((field, declaring)) = self.class.find_field_decl(name) {
            if field.is_private {
                let allowed = caller
                    .map(|frame| frame.starts_with(&format!("{}.", declaring.name)))
                    .unwrap_or(false);
                if !allowed {
                    return Err(RuntimeError::private_access(&declaring.name, name));
                }
            }
        }
        Ok(())
    }

    /// Read a field. Returns Ok(None) when no such field exists (the caller
    /// falls through to method lookup).
    pub fn get_field(&self, name: &str, caller: Option<&str>) -> Result<Option<Value>, RuntimeError> {
        if let Some(value) = self.fields.lock().get(name) {
            self.check_private(name, caller)?;
            return Ok(Some(value.clone()));
        }
        Ok(None)
    }

    /// Write a field, enforcing the same private-access rule.
    pub fn set_field(
        &self,
        name: &str,
        value: Value,
        caller: Option<&str>,
    ) -> Result<(), RuntimeError> {
        self.check_private(name, caller)?;
        self.fields.lock().insert(name.to_string(), value);
        Ok(())
    }

    /// Write bypassing access control, for internal bookkeeping such as
    /// attaching a captured stack trace to a raised instance.
    pub fn set_field_raw(&self, name: &str, value: Value) {
        self.fields.lock().insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{IntentDecl, Span};

    fn field(name: &str, is_private: bool, is_static: bool) -> FieldDecl {
        FieldDecl {
            name: name.to_string(),
            type_annotation: None,
            value: None,
            is_static,
            is_private,
            span: Span::new(0, 0),
        }
    }

    fn method(name: &str, is_static: bool) -> MethodDecl {
        MethodDecl {
            intent: IntentDecl {
                name: name.to_string(),
                params: Vec::new(),
                return_type: None,
                body: Vec::new(),
                is_async: false,
                span: Span::new(0, 0),
            },
            is_static,
            is_private: false,
            is_abstract: false,
        }
    }

    fn class_decl(name: &str, members: Vec<Member>) -> ClassDecl {
        ClassDecl {
            name: name.to_string(),
            members,
            extends: None,
            implements: Vec::new(),
            is_abstract: false,
            generic_params: Vec::new(),
            span: Span::new(0, 0),
        }
    }

    fn base_class() -> Arc<ClassObject> {
        let decl = class_decl(
            "Animal",
            vec![
                Member::Field(field("name", false, false)),
                Member::Field(field("secret", true, false)),
                Member::Field(field("population", false, true)),
                Member::Method(method("speak", false)),
                Member::Method(method("create", true)),
            ],
        );
        Arc::new(ClassObject::from_decl(&decl, None))
    }

    fn sub_class(parent: Arc<ClassObject>) -> Arc<ClassObject> {
        let decl = class_decl("Dog", vec![Member::Method(method("fetch", false))]);
        Arc::new(ClassObject::from_decl(&decl, Some(parent)))
    }

    #[test]
    fn test_member_partitioning() {
        let class = base_class();
        assert!(class.instance_fields.contains_key("name"));
        assert!(class.instance_fields.contains_key("secret"));
        assert!(class.static_fields.contains_key("population"));
        assert!(class.instance_methods.contains_key("speak"));
        assert!(class.static_methods.contains_key("create"));
    }

    #[test]
    fn test_method_lookup_walks_chain() {
        let animal = base_class();
        let dog = sub_class(Arc::clone(&animal));
        let (speak, owner) = dog.get_instance_method("speak").unwrap();
        assert_eq!(speak.intent.name, "speak");
        assert_eq!(owner.name, "Animal");
        let (fetch, owner) = dog.get_instance_method("fetch").unwrap();
        assert_eq!(fetch.intent.name, "fetch");
        assert_eq!(owner.name, "Dog");
        assert!(dog.get_instance_method("missing").is_none());
    }

    #[test]
    fn test_static_field_value_inherited() {
        let animal = base_class();
        animal
            .static_field_values
            .lock()
            .insert("population".to_string(), Value::Int(7));
        let dog = sub_class(Arc::clone(&animal));
        assert_eq!(dog.get_static_field_value("population"), Some(Value::Int(7)));
    }

    #[test]
    fn test_is_or_extends() {
        let animal = base_class();
        let dog = sub_class(Arc::clone(&animal));
        assert!(dog.is_or_extends("Dog"));
        assert!(dog.is_or_extends("Animal"));
        assert!(!dog.is_or_extends("Cat"));
    }

    #[test]
    fn test_chain_order() {
        let animal = base_class();
        let dog = sub_class(Arc::clone(&animal));
        let names: Vec<_> = dog.chain().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["Dog".to_string(), "Animal".to_string()]);
    }

    #[test]
    fn test_public_field_access() {
        let animal = base_class();
        let instance = InstanceObject::new(animal);
        instance.set_field("name", Value::string("Rex"), None).unwrap();
        assert_eq!(
            instance.get_field("name", None).unwrap(),
            Some(Value::string("Rex"))
        );
    }

    #[test]
    fn test_private_field_requires_declaring_class_caller() {
        let animal = base_class();
        let dog = sub_class(Arc::clone(&animal));
        let instance = InstanceObject::new(dog);
        instance.set_field_raw("secret", Value::Int(1));

        // a method of the declaring class may read it, even on a subclass
        // instance
        let read = instance.get_field("secret", Some("Animal.speak")).unwrap();
        assert_eq!(read, Some(Value::Int(1)));

        // a subclass method that is not the declaring class may not
        let err = instance.get_field("secret", Some("Dog.fetch")).unwrap_err();
        assert!(err.message.contains("secret"));

        // nor may top-level code
        assert!(instance.get_field("secret", None).is_err());
    }

    #[test]
    fn test_private_field_write_enforced() {
        let animal = base_class();
        let instance = InstanceObject::new(animal);
        instance.set_field_raw("secret", Value::Int(1));
        assert!(instance
            .set_field("secret", Value::Int(2), Some("Animal.speak"))
            .is_ok());
        assert!(instance
            .set_field("secret", Value::Int(3), Some("Other.method"))
            .is_err());
    }

    #[test]
    fn test_missing_field_is_none() {
        let animal = base_class();
        let instance = InstanceObject::new(animal);
        assert_eq!(instance.get_field("nope", None).unwrap(), None);
    }
}
