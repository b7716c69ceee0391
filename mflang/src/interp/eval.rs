//! The evaluator: walks the AST against an environment and a call stack.

use super::builtins;
use super::env::{child_env, EnvRef, Environment};
use super::error::{EvalResult, ExecResult, Frame, Raised, RuntimeError, Unwind};
use super::object::{ClassObject, InstanceObject};
use super::task::{AsyncTask, TaskFailure};
use super::value::{BoundMethod, Closure, ListObject, MapObject, Value};
use crate::ast::{
    Assign, BinOp, ClassDecl, DatasetOp, Expr, ImportDecl, Literal, Member, ModelOp,
    Program, Span, Spanned, Stmt, ThrowStmt, TryStmt, UnOp, VarDecl,
};
use crate::types::matching::value_matches;
use crate::util;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum call depth before the interpreter gives up
const MAX_RECURSION_DEPTH: usize = 10_000;

/// Stack growth parameters for deep recursion
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 2 * 1024 * 1024;

/// Builtin generic containers and their default type arguments, used by the
/// constructor sugar when no explicit type arguments are supplied.
fn default_generics(class: &str) -> Option<&'static [&'static str]> {
    match class {
        "List" | "EmbedList" | "Set" | "Matrix" => Some(&["any"]),
        "Map" => Some(&["any", "any"]),
        _ => None,
    }
}

fn resolve_container_alias(name: &str) -> &str {
    if name == "HashMap" {
        "Map"
    } else {
        name
    }
}

/// One call-stack entry. The span/file/source triple lets traceback capture
/// resolve line, column and the source excerpt lazily.
#[derive(Debug, Clone)]
pub(crate) struct CallFrame {
    pub name: String,
    pub span: Span,
    pub file: Option<PathBuf>,
    pub source: Option<Arc<String>>,
}

/// The tree-walking interpreter
#[derive(Debug)]
pub struct Interpreter {
    /// Global environment
    pub globals: EnvRef,
    /// Current environment (innermost scope)
    env: EnvRef,
    /// Call stack for traceback capture and private-access checks
    call_stack: Vec<CallFrame>,
    /// Process-wide exception traces, keyed by raised-value identity
    exception_traces: Arc<Mutex<HashMap<usize, Vec<Frame>>>>,
    /// Stack of active exceptions for bare `throw;` rethrow
    active_exceptions: Vec<Raised>,
    /// Dataset simulation state
    datasets: Arc<Mutex<HashMap<String, Value>>>,
    /// Model simulation state
    models: Arc<Mutex<HashMap<String, Value>>>,
    /// File currently being interpreted, for tracebacks and imports
    current_file: Option<PathBuf>,
    current_dir: PathBuf,
    current_source: Option<Arc<String>>,
    /// Current recursion depth
    recursion_depth: usize,
    /// Report runtime type errors at top level instead of aborting
    pub permissive: bool,
}

impl Interpreter {
    /// Create a new interpreter with builtins registered in globals
    pub fn new() -> Self {
        let globals = Environment::new().into_ref();
        builtins::register(&mut globals.lock());
        let env = Arc::clone(&globals);
        Interpreter {
            globals,
            env,
            call_stack: Vec::new(),
            exception_traces: Arc::new(Mutex::new(HashMap::new())),
            active_exceptions: Vec::new(),
            datasets: Arc::new(Mutex::new(HashMap::new())),
            models: Arc::new(Mutex::new(HashMap::new())),
            current_file: None,
            current_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            current_source: None,
            recursion_depth: 0,
            permissive: false,
        }
    }

    /// A worker interpreter for an async task: shares the global scope, the
    /// trace side-table and the simulation state, but owns a fresh call
    /// stack.
    fn fork(&self) -> Interpreter {
        Interpreter {
            globals: Arc::clone(&self.globals),
            env: Arc::clone(&self.globals),
            call_stack: Vec::new(),
            exception_traces: Arc::clone(&self.exception_traces),
            active_exceptions: Vec::new(),
            datasets: Arc::clone(&self.datasets),
            models: Arc::clone(&self.models),
            current_file: self.current_file.clone(),
            current_dir: self.current_dir.clone(),
            current_source: self.current_source.clone(),
            recursion_depth: 0,
            permissive: self.permissive,
        }
    }

    /// Point the interpreter at the file it is executing; imports resolve
    /// relative to it and tracebacks quote it.
    pub fn set_file(&mut self, path: &Path, source: &str) {
        self.current_file = Some(path.to_path_buf());
        self.current_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));
        self.current_source = Some(Arc::new(source.to_string()));
    }

    pub fn set_source(&mut self, source: &str) {
        self.current_source = Some(Arc::new(source.to_string()));
    }

    /// Execute a parsed unit at top level. Every top-level declaration is
    /// visible as a global binding afterwards. Tasks returned by top-level
    /// statements are collected and awaited after the whole body has run;
    /// their failures are reported without undoing completed work.
    pub fn interpret(&mut self, program: &Program) -> Result<(), RuntimeError> {
        let mut pending: Vec<Arc<AsyncTask>> = Vec::new();

        for statement in &program.statements {
            match self.execute(statement) {
                Ok(Some(Value::Task(task))) => pending.push(task),
                Ok(_) => {}
                Err(Unwind::Fail(err)) => {
                    self.print_error_traceback(&err, stmt_span(statement));
                    if self.permissive && err.is_type_error() {
                        warn!(error = %err.message, "continuing after type error");
                        continue;
                    }
                    return Err(err);
                }
                Err(Unwind::Raise(raised)) => {
                    self.print_raised_traceback(&raised);
                    return Err(RuntimeError::type_error(format!(
                        "uncaught exception: {}: {}",
                        raised.type_name, raised.message
                    )));
                }
                Err(Unwind::Return(_)) => {
                    warn!("'return' outside of an intent at top level; ignored");
                }
            }
        }

        for task in pending {
            match task.wait() {
                Ok(_) => {}
                Err(TaskFailure::Raised(raised)) => {
                    self.print_raised_traceback(&raised);
                    eprintln!("error in async task: {}: {}", raised.type_name, raised.message);
                }
                Err(TaskFailure::Error(err)) => {
                    eprintln!("error in async task: {err}");
                }
            }
        }

        Ok(())
    }

    /// Execute statements one by one, printing non-null expression results
    /// and reporting errors without aborting. Drives the REPL.
    pub fn interpret_interactive(&mut self, program: &Program) {
        for statement in &program.statements {
            match self.execute(statement) {
                Ok(Some(value)) if !matches!(value, Value::Null) => println!("{value}"),
                Ok(_) => {}
                Err(Unwind::Raise(raised)) => self.print_raised_traceback(&raised),
                Err(Unwind::Fail(err)) => self.print_error_traceback(&err, stmt_span(statement)),
                Err(Unwind::Return(_)) => eprintln!("'return' outside of an intent"),
            }
        }
    }

    /// Execute a unit without top-level error reporting, for imports and
    /// core modules. Pending tasks are still awaited; a stored failure
    /// propagates.
    fn run_unit(&mut self, program: &Program) -> ExecResult {
        let mut pending: Vec<Arc<AsyncTask>> = Vec::new();
        for statement in &program.statements {
            if let Some(Value::Task(task)) = self.execute(statement)? {
                pending.push(task);
            }
        }
        for task in pending {
            match task.wait() {
                Ok(_) => {}
                Err(TaskFailure::Raised(raised)) => return Err(Unwind::Raise(Box::new(raised))),
                Err(TaskFailure::Error(err)) => return Err(Unwind::Fail(err)),
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Execute one statement. Expression statements yield their value so
    /// the top level can collect returned tasks.
    fn execute(&mut self, stmt: &Stmt) -> Result<Option<Value>, Unwind> {
        match stmt {
            Stmt::Var(decl) => {
                self.execute_var_decl(decl)?;
                Ok(None)
            }
            Stmt::Intent(decl) => {
                let closure = Closure {
                    decl: Arc::new(decl.clone()),
                    env: Arc::clone(&self.env),
                    bound_this: None,
                    bound_name: None,
                };
                self.env
                    .lock()
                    .define_untyped(decl.name.clone(), Value::Closure(Arc::new(closure)));
                Ok(None)
            }
            Stmt::Class(decl) => {
                self.execute_class_decl(decl)?;
                Ok(None)
            }
            Stmt::Interface(decl) => {
                self.env
                    .lock()
                    .define_untyped(decl.name.clone(), Value::Interface(Arc::new(decl.clone())));
                Ok(None)
            }
            Stmt::Assign(assign) => {
                self.execute_assign(assign)?;
                Ok(None)
            }
            Stmt::If(node) => {
                let condition = self.eval(&node.condition)?;
                if condition.is_truthy() {
                    self.execute_block(&node.then_branch, Some(child_env(&self.env)))?;
                } else if let Some(else_branch) = &node.else_branch {
                    self.execute_block(else_branch, Some(child_env(&self.env)))?;
                }
                Ok(None)
            }
            Stmt::While(node) => {
                // a fresh scope per iteration, discarded when it ends
                while self.eval(&node.condition)?.is_truthy() {
                    self.execute_block(&node.body, Some(child_env(&self.env)))?;
                }
                Ok(None)
            }
            Stmt::For(node) => {
                let loop_env = child_env(&self.env);
                let previous = std::mem::replace(&mut self.env, loop_env);
                let result = (|| -> ExecResult {
                    if let Some(init) = &node.init {
                        self.execute(init)?;
                    }
                    loop {
                        if let Some(condition) = &node.condition {
                            if !self.eval(condition)?.is_truthy() {
                                break;
                            }
                        }
                        self.execute_block(&node.body, Some(child_env(&self.env)))?;
                        if let Some(update) = &node.update {
                            self.execute(update)?;
                        }
                    }
                    Ok(())
                })();
                self.env = previous;
                result?;
                Ok(None)
            }
            Stmt::ForIn(node) => {
                let iterable = self.eval(&node.iterable)?;
                let keys = self.iteration_items(&iterable, true)?;
                self.run_loop_body(&node.variable, &node.type_annotation, keys, &node.body)?;
                Ok(None)
            }
            Stmt::ForOf(node) => {
                let iterable = self.eval(&node.iterable)?;
                let values = self.iteration_items(&iterable, false)?;
                self.run_loop_body(&node.variable, &node.type_annotation, values, &node.body)?;
                Ok(None)
            }
            Stmt::Try(node) => {
                self.execute_try(node)?;
                Ok(None)
            }
            Stmt::Throw(node) => {
                self.execute_throw(node)?;
                Ok(None)
            }
            Stmt::Return(node) => {
                let value = match &node.value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                Err(Unwind::Return(value))
            }
            Stmt::Import(decl) => {
                self.execute_import(decl)?;
                Ok(None)
            }
            Stmt::Dataset(op) => {
                self.execute_dataset_op(op);
                Ok(None)
            }
            Stmt::Model(op) => {
                self.execute_model_op(op);
                Ok(None)
            }
            Stmt::Expr(expr) => {
                let value = self.eval(expr)?;
                Ok(Some(value))
            }
        }
    }

    /// Execute a block of statements, optionally in a provided environment.
    /// The previous environment is restored even when the block unwinds.
    fn execute_block(&mut self, statements: &[Stmt], environment: Option<EnvRef>) -> ExecResult {
        let previous = environment.map(|env| std::mem::replace(&mut self.env, env));

        let mut result = Ok(());
        for statement in statements {
            if let Err(unwind) = self.execute(statement) {
                result = Err(unwind);
                break;
            }
        }

        if let Some(previous) = previous {
            self.env = previous;
        }
        result
    }

    fn execute_var_decl(&mut self, decl: &VarDecl) -> ExecResult {
        let value = self.eval_with_annotation(&decl.value, decl.type_annotation.as_deref())?;
        self.env
            .lock()
            .define(decl.name.clone(), value, decl.type_annotation.clone())
            .map_err(Unwind::Fail)
    }

    fn execute_class_decl(&mut self, decl: &ClassDecl) -> ExecResult {
        // Declaration order is enforced: the parent must already be a class
        // in scope.
        let parent = match &decl.extends {
            Some(parent_name) => match self.env.lock().get(parent_name) {
                Some(Value::Class(parent)) => Some(parent),
                Some(other) => {
                    return Err(RuntimeError::type_error(format!(
                        "'{parent_name}' is not a class (found {}), cannot extend it in '{}'",
                        other.type_name(),
                        decl.name
                    ))
                    .into())
                }
                None => {
                    return Err(RuntimeError {
                        kind: super::error::ErrorKind::UndefinedVariable,
                        message: format!(
                            "unknown parent class '{parent_name}' for class '{}' (declare it first)",
                            decl.name
                        ),
                    }
                    .into())
                }
            },
            None => None,
        };

        let class = Arc::new(ClassObject::from_decl(decl, parent));

        // Evaluate static field defaults now and store their values
        for member in &decl.members {
            if let Member::Field(field) = member {
                if field.is_static {
                    let value = match &field.value {
                        Some(expr) => self.eval(expr)?,
                        None => Value::Null,
                    };
                    class
                        .static_field_values
                        .lock()
                        .insert(field.name.clone(), value);
                }
            }
        }

        self.env
            .lock()
            .define_untyped(decl.name.clone(), Value::Class(class));
        Ok(())
    }

    fn execute_assign(&mut self, assign: &Assign) -> ExecResult {
        let value = self.eval(&assign.value)?;
        match &assign.target.node {
            Expr::Identifier(name) => {
                self.env.lock().set(name, value).map_err(Unwind::Fail)
            }
            Expr::Property { object, name } => {
                let target = self.eval(object)?;
                match target {
                    Value::Instance(instance) => {
                        let caller = self.top_frame_name();
                        instance
                            .set_field(name, value, caller.as_deref())
                            .map_err(Unwind::Fail)
                    }
                    Value::Map(map) => {
                        map.insert(Value::string(name.clone()), value);
                        Ok(())
                    }
                    other => Err(RuntimeError::type_error(format!(
                        "cannot assign property '{name}' on value of type {}",
                        other.type_name()
                    ))
                    .into()),
                }
            }
            _ => Err(RuntimeError::invalid_assign_target().into()),
        }
    }

    /// Collect the items a `for-in`/`for-of` loop walks. Four shapes are
    /// tried in order: key/value-bearing container, native iterable, an
    /// instance with `length()`/`get(i)` accessors, a `.data`-bearing
    /// wrapper.
    fn iteration_items(&mut self, iterable: &Value, keys: bool) -> Result<Vec<Value>, Unwind> {
        match iterable {
            Value::Map(map) => {
                let entries = map.entries.lock();
                Ok(entries
                    .iter()
                    .map(|(k, v)| if keys { k.clone() } else { v.clone() })
                    .collect())
            }
            Value::List(list) => Ok(list.items.lock().clone()),
            Value::Set(set) => Ok(set.items.lock().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::string(c.to_string())).collect()),
            Value::Instance(instance) => {
                // instance with a public sequence API
                if instance.class.get_instance_method("length").is_some()
                    && instance.class.get_instance_method("get").is_some()
                {
                    let length = {
                        let method = self.instance_method_closure(instance, "length")?;
                        self.call_closure(&method, vec![])?
                    };
                    let length = length.as_int().ok_or_else(|| {
                        RuntimeError::not_iterable(&iterable.type_name())
                    })?;
                    let mut items = Vec::new();
                    for i in 0..length {
                        let getter = self.instance_method_closure(instance, "get")?;
                        items.push(self.call_closure(&getter, vec![Value::Int(i)])?);
                    }
                    return Ok(items);
                }
                // wrapper exposing its backing store as a `data` field
                if let Some(data) = instance.fields.lock().get("data").cloned() {
                    if let Value::List(list) = data {
                        return Ok(list.items.lock().clone());
                    }
                }
                Err(RuntimeError::not_iterable(&iterable.type_name()).into())
            }
            other => Err(RuntimeError::not_iterable(&other.type_name()).into()),
        }
    }

    fn run_loop_body(
        &mut self,
        variable: &str,
        annotation: &Option<String>,
        items: Vec<Value>,
        body: &[Stmt],
    ) -> ExecResult {
        let loop_env = child_env(&self.env);
        let previous = std::mem::replace(&mut self.env, loop_env);
        let mut result = Ok(());
        for item in items {
            if let Err(err) = self
                .env
                .lock()
                .define(variable.to_string(), item, annotation.clone())
            {
                result = Err(Unwind::Fail(err));
                break;
            }
            if let Err(unwind) = self.execute_block(body, Some(child_env(&self.env))) {
                result = Err(unwind);
                break;
            }
        }
        self.env = previous;
        result
    }

    fn execute_try(&mut self, node: &TryStmt) -> ExecResult {
        let outcome = match self.execute_block(&node.try_block, Some(child_env(&self.env))) {
            Err(Unwind::Raise(boxed)) => {
                let raised = *boxed;
                let matched = node
                    .catch_clauses
                    .iter()
                    .find(|clause| {
                        self.exception_matches(&raised, clause.exception_type.as_deref())
                    });
                match matched {
                    Some(clause) => {
                        self.active_exceptions.push(raised.clone());
                        let catch_env = child_env(&self.env);
                        if let Some(var) = &clause.exception_var {
                            catch_env
                                .lock()
                                .define_untyped(var.clone(), raised.value.clone());
                        }
                        let catch_result = self.execute_block(&clause.body, Some(catch_env));
                        self.active_exceptions.pop();
                        catch_result
                    }
                    None => Err(Unwind::Raise(Box::new(raised))),
                }
            }
            other => other,
        };

        // finally always runs: after any catch, before an unhandled
        // exception (or a return, or a fatal error) continues outward
        if let Some(finally_block) = &node.finally_block {
            self.execute_block(finally_block, Some(child_env(&self.env)))?;
        }

        outcome
    }

    /// Does a raised value match a catch clause's declared type? Absent
    /// types match anything; otherwise the resolved type name must match
    /// exactly or appear in the value's class-inheritance chain.
    fn exception_matches(&self, raised: &Raised, declared: Option<&str>) -> bool {
        let declared = match declared {
            Some(d) => d,
            None => return true,
        };
        let normalized = declared.rsplit('.').next().unwrap_or(declared);
        if raised.type_name == normalized {
            return true;
        }
        if let Value::Instance(instance) = &raised.value {
            return instance.class.is_or_extends(normalized);
        }
        false
    }

    fn execute_throw(&mut self, node: &ThrowStmt) -> ExecResult {
        match &node.expression {
            None => match self.active_exceptions.last() {
                Some(active) => Err(Unwind::Raise(Box::new(active.clone()))),
                None => Err(RuntimeError::rethrow_without_active().into()),
            },
            Some(expr) => {
                let value = self.eval(expr)?;
                Err(self.raise_value(value, Some(node.span)))
            }
        }
    }

    /// An undefined-variable error carrying the closest visible name, when
    /// one is close enough to be worth suggesting.
    fn undefined_with_suggestion(&self, name: &str) -> RuntimeError {
        let mut err = RuntimeError::undefined_variable(name);
        let names = self.env.lock().visible_names();
        let candidates: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
        if let Some(suggestion) = util::find_similar_name(name, &candidates, 2) {
            err.message.push_str(&format!(" (did you mean '{suggestion}'?)"));
        }
        err
    }

    /// Build a `Raised` for a value: resolve its message and type name,
    /// capture the stack, attach the trace to the side table (and, for
    /// instances, as a `stackTrace` field).
    pub(crate) fn raise_value(&mut self, value: Value, span: Option<Span>) -> Unwind {
        let message = self.format_exception_message(&value);
        let type_name = value.type_name();
        let frames = self.capture_traceback(span);

        if let Some(identity) = value.identity() {
            self.exception_traces.lock().insert(identity, frames.clone());
        }
        if let Value::Instance(instance) = &value {
            instance.set_field_raw("stackTrace", builtins::frames_to_value(&frames));
        }

        Unwind::Raise(Box::new(Raised {
            value,
            message,
            type_name,
            frames,
        }))
    }

    /// Display message for a raised value: an instance's `message` field,
    /// else its `toString()`, else its class name; plain values stringify.
    pub(crate) fn format_exception_message(&mut self, value: &Value) -> String {
        if let Value::Instance(instance) = value {
            if let Some(message) = instance.fields.lock().get("message") {
                if !matches!(message, Value::Null) {
                    return message.to_string();
                }
            }
            if instance.class.get_instance_method("toString").is_some() {
                if let Ok(closure) = self.instance_method_closure(instance, "toString") {
                    if let Ok(result) = self.call_closure(&closure, vec![]) {
                        if !matches!(result, Value::Null) {
                            return result.to_string();
                        }
                    }
                }
            }
            return instance.class.name.clone();
        }
        value.to_string()
    }

    /// Frames recorded for a value raised earlier, for builtin
    /// introspection.
    pub(crate) fn trace_for_value(&self, value: &Value) -> Vec<Frame> {
        value
            .identity()
            .and_then(|id| self.exception_traces.lock().get(&id).cloned())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Imports and stubs
    // ------------------------------------------------------------------

    fn resolve_import_path(&self, dotted: &str) -> Option<PathBuf> {
        let rel: PathBuf = dotted.split('.').collect::<Vec<_>>().join("/").into();
        let rel = rel.with_extension("mp");

        // walk the current directory and its ancestors
        let mut dir = Some(self.current_dir.clone());
        let mut levels = 0;
        while let Some(current) = dir {
            if levels >= 10 {
                break;
            }
            let candidate = current.join(&rel);
            if candidate.exists() {
                return Some(candidate);
            }
            dir = current.parent().map(|p| p.to_path_buf());
            levels += 1;
        }

        // fall back to the working directory
        if rel.exists() {
            return Some(rel);
        }
        None
    }

    fn execute_import(&mut self, decl: &ImportDecl) -> ExecResult {
        let rel: PathBuf = decl.name.split('.').collect::<Vec<_>>().join("/").into();
        let rel = rel.with_extension("mp");

        let path = match self.resolve_import_path(&decl.name) {
            Some(path) => path,
            None => {
                let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                let suggestions = util::suggest_import_candidates(&root, &rel);
                return Err(
                    RuntimeError::import_error(&decl.name, "module not found", &suggestions).into(),
                );
            }
        };

        debug!(module = %decl.name, path = %path.display(), "importing module");
        let source = std::fs::read_to_string(&path).map_err(|err| {
            Unwind::Fail(RuntimeError::import_error(
                &decl.name,
                &format!("cannot read '{}': {err}", path.display()),
                &[],
            ))
        })?;

        let program = parse_unit(&source).map_err(|detail| {
            Unwind::Fail(RuntimeError::import_error(&decl.name, &detail, &[]))
        })?;

        let prev_file = self.current_file.clone();
        let prev_dir = self.current_dir.clone();
        let prev_source = self.current_source.clone();
        self.set_file(&path, &source);

        let result = self.run_unit(&program);

        self.current_file = prev_file;
        self.current_dir = prev_dir;
        self.current_source = prev_source;

        result.map_err(|unwind| match unwind {
            Unwind::Fail(err) => {
                Unwind::Fail(RuntimeError::import_error(&decl.name, &err.message, &[]))
            }
            Unwind::Raise(raised) => Unwind::Fail(RuntimeError::import_error(
                &decl.name,
                &format!("{}: {}", raised.type_name, raised.message),
                &[],
            )),
            other => other,
        })
    }

    /// Load every `core/*.mp` module into the global scope before user
    /// code runs, registering each module's exports under `core.<name>`.
    pub fn load_core_modules(&mut self, core_dir: &Path) {
        if !core_dir.is_dir() {
            debug!(dir = %core_dir.display(), "no core directory, skipping");
            return;
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(core_dir)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| p.extension().map(|e| e == "mp").unwrap_or(false))
                    .collect()
            })
            .unwrap_or_default();
        files.sort();

        let mut loaded = Vec::new();
        for path in files {
            let module = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("module")
                .to_string();

            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(err) => {
                    warn!(module, error = %err, "failed to read core module");
                    continue;
                }
            };
            let program = match parse_unit(&source) {
                Ok(program) => program,
                Err(detail) => {
                    warn!(module, error = %detail, "failed to parse core module");
                    continue;
                }
            };

            let before: std::collections::HashSet<String> =
                self.globals.lock().local_names().into_iter().collect();

            let prev_file = self.current_file.clone();
            let prev_dir = self.current_dir.clone();
            let prev_source = self.current_source.clone();
            self.set_file(&path, &source);
            let result = self.run_unit(&program);
            self.current_file = prev_file;
            self.current_dir = prev_dir;
            self.current_source = prev_source;

            if let Err(unwind) = result {
                let detail = match unwind {
                    Unwind::Fail(err) => err.message,
                    Unwind::Raise(raised) => format!("{}: {}", raised.type_name, raised.message),
                    Unwind::Return(_) => "return at module top level".to_string(),
                };
                warn!(module, error = %detail, "core module failed, continuing");
                continue;
            }

            // exports are the global names the module introduced
            let exports = MapObject::new("string", "any");
            let after = self.globals.lock().local_names();
            for name in after {
                if !before.contains(&name) {
                    let value = self.globals.lock().get(&name);
                    if let Some(value) = value {
                        exports.insert(Value::string(name), value);
                    }
                }
            }
            self.globals
                .lock()
                .define_untyped(format!("core.{module}"), Value::Map(Arc::new(exports)));
            loaded.push(module);
        }

        if !loaded.is_empty() {
            debug!(count = loaded.len(), modules = ?loaded, "core modules loaded");
        }
    }

    fn execute_dataset_op(&mut self, op: &DatasetOp) {
        match op.operation.as_str() {
            "load" => {
                let source = op
                    .params
                    .iter()
                    .find(|(k, _)| k == "source")
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default();
                let rows = if source.ends_with(".csv") {
                    builtins::sample_dataset()
                } else {
                    Value::List(Arc::new(ListObject::new("any")))
                };
                let count = match &rows {
                    Value::List(list) => list.items.lock().len(),
                    _ => 0,
                };
                self.datasets.lock().insert(op.target.clone(), rows);
                println!("dataset '{}' loaded with {} records", op.target, count);
            }
            "save" => {
                if self.datasets.lock().contains_key(&op.target) {
                    println!("dataset '{}' saved", op.target);
                } else {
                    println!("dataset '{}' not found", op.target);
                }
            }
            "filter" => {
                if self.datasets.lock().contains_key(&op.target) {
                    println!("filter applied to dataset '{}'", op.target);
                } else {
                    println!("dataset '{}' not found", op.target);
                }
            }
            "analyze" => match self.datasets.lock().get(&op.target) {
                Some(Value::List(list)) => {
                    println!("analysis of dataset '{}':", op.target);
                    println!("- records: {}", list.items.lock().len());
                }
                _ => println!("dataset '{}' not found", op.target),
            },
            other => println!("unknown dataset operation '{other}'"),
        }
    }

    fn execute_model_op(&mut self, op: &ModelOp) {
        match op.operation.as_str() {
            "create" => {
                let model_type = op
                    .params
                    .iter()
                    .find(|(k, _)| k == "type")
                    .map(|(_, v)| v.clone())
                    .unwrap_or_else(|| "linear_regression".to_string());
                let state = MapObject::new("string", "any");
                state.insert(Value::string("type"), Value::string(model_type.clone()));
                state.insert(Value::string("trained"), Value::Bool(false));
                state.insert(Value::string("accuracy"), Value::Float(0.0));
                self.models
                    .lock()
                    .insert(op.model_name.clone(), Value::Map(Arc::new(state)));
                println!("model '{}' created (type: {model_type})", op.model_name);
            }
            "train" => {
                let dataset = op
                    .params
                    .iter()
                    .find(|(k, _)| k == "dataset")
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default();
                let known = self.datasets.lock().contains_key(&dataset);
                match self.models.lock().get(&op.model_name) {
                    Some(Value::Map(state)) if known => {
                        state.insert(Value::string("trained"), Value::Bool(true));
                        state.insert(Value::string("accuracy"), Value::Float(0.85));
                        println!("model '{}' trained with dataset '{dataset}'", op.model_name);
                    }
                    Some(_) => println!("dataset '{dataset}' not found"),
                    None => println!("model '{}' not found", op.model_name),
                }
            }
            "predict" => match self.models.lock().get(&op.model_name) {
                Some(Value::Map(state)) => {
                    let trained = state
                        .get(&Value::string("trained"))
                        .map(|v| v.is_truthy())
                        .unwrap_or(false);
                    if trained {
                        println!("prediction from model '{}': high_value (0.78)", op.model_name);
                    } else {
                        println!("model '{}' has not been trained", op.model_name);
                    }
                }
                _ => println!("model '{}' not found", op.model_name),
            },
            other => println!("unknown model operation '{other}'"),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub(crate) fn eval(&mut self, expr: &Spanned<Expr>) -> EvalResult {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_inner(expr))
    }

    fn eval_inner(&mut self, expr: &Spanned<Expr>) -> EvalResult {
        match &expr.node {
            Expr::Literal(literal) => match literal {
                Literal::Int(n) => Ok(Value::Int(*n)),
                Literal::Float(f) => Ok(Value::Float(*f)),
                Literal::Bool(b) => Ok(Value::Bool(*b)),
                Literal::Str(s) => Ok(Value::string(self.interpolate(s))),
            },
            Expr::Null => Ok(Value::Null),
            Expr::Identifier(name) => {
                // the guard must drop before building the suggestion, which
                // walks the same chain
                let found = self.env.lock().get(name);
                match found {
                    Some(value) => Ok(value),
                    None => Err(self.undefined_with_suggestion(name).into()),
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.eval_binary(*op, left, right)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match op {
                    UnOp::Neg => match operand {
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        other => Err(RuntimeError::invalid_operands(
                            "-",
                            &other.type_name(),
                            "",
                        )
                        .into()),
                    },
                    UnOp::Not => Ok(Value::Bool(!operand.is_truthy())),
                }
            }
            Expr::Call { callee, args } => self.eval_call(callee, args),
            Expr::Property { object, name } => self.eval_property(object, name),
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                self.eval_index(object, index)
            }
            Expr::Object(entries) => {
                let map = MapObject::new("string", "any");
                for (key, value_expr) in entries {
                    let value = self.eval(value_expr)?;
                    map.insert(Value::string(key.clone()), value);
                }
                Ok(Value::Map(Arc::new(map)))
            }
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::List(Arc::new(ListObject::with_items("any", values))))
            }
            Expr::New { class_name, args } => self.eval_new(class_name, args, None),
            Expr::This => Ok(self.env.lock().get("this").unwrap_or(Value::Null)),
            Expr::Super => Err(RuntimeError::invalid_super(
                "'super' must be called or accessed as super.method",
            )
            .into()),
            Expr::Await(inner) => {
                let value = self.eval(inner)?;
                match value {
                    Value::Task(task) => match task.wait() {
                        Ok(result) => Ok(result),
                        Err(TaskFailure::Raised(raised)) => Err(Unwind::Raise(Box::new(raised))),
                        Err(TaskFailure::Error(err)) => Err(Unwind::Fail(err)),
                    },
                    // awaiting a non-task is the identity
                    other => Ok(other),
                }
            }
            Expr::Lambda(decl) => {
                let closure = Closure {
                    decl: Arc::new((**decl).clone()),
                    env: Arc::clone(&self.env),
                    bound_this: None,
                    bound_name: None,
                };
                Ok(Value::Closure(Arc::new(closure)))
            }
        }
    }

    /// Evaluate a declaration initializer with knowledge of the declared
    /// type, so generic-constructor sugar can pick up type arguments.
    pub(crate) fn eval_with_annotation(
        &mut self,
        expr: &Spanned<Expr>,
        annotation: Option<&str>,
    ) -> EvalResult {
        if let Expr::New { class_name, args } = &expr.node {
            return self.eval_new(class_name, args, annotation);
        }
        self.eval(expr)
    }

    fn eval_binary(&mut self, op: BinOp, left: Value, right: Value) -> EvalResult {
        use Value::*;
        match op {
            BinOp::Add => match (&left, &right) {
                (Int(a), Int(b)) => Ok(Int(a + b)),
                (Str(a), b) => Ok(Value::string(format!("{a}{b}"))),
                (a, Str(b)) => Ok(Value::string(format!("{a}{b}"))),
                (List(a), List(b)) => {
                    let mut items = a.items.lock().clone();
                    items.extend(b.items.lock().iter().cloned());
                    Ok(List(Arc::new(ListObject::with_items(
                        a.elem_type.clone(),
                        items,
                    ))))
                }
                _ => self.numeric_op(op, &left, &right),
            },
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                if let (Int(a), Int(b)) = (&left, &right) {
                    return match op {
                        BinOp::Sub => Ok(Int(a - b)),
                        BinOp::Mul => Ok(Int(a * b)),
                        BinOp::Div if *b == 0 => Err(RuntimeError::division_by_zero().into()),
                        BinOp::Div => Ok(Int(a / b)),
                        BinOp::Mod if *b == 0 => Err(RuntimeError::division_by_zero().into()),
                        BinOp::Mod => Ok(Int(a.rem_euclid(*b))),
                        _ => unreachable!(),
                    };
                }
                self.numeric_op(op, &left, &right)
            }
            BinOp::Eq => Ok(Bool(left == right)),
            BinOp::Ne => Ok(Bool(left != right)),
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let ordering = match (&left, &right) {
                    (Str(a), Str(b)) => a.partial_cmp(b),
                    _ => match (left.as_float(), right.as_float()) {
                        (Some(a), Some(b)) => a.partial_cmp(&b),
                        _ => None,
                    },
                };
                let ordering = ordering.ok_or_else(|| {
                    RuntimeError::invalid_operands(
                        op.symbol(),
                        &left.type_name(),
                        &right.type_name(),
                    )
                })?;
                let result = match op {
                    BinOp::Lt => ordering.is_lt(),
                    BinOp::Gt => ordering.is_gt(),
                    BinOp::Le => ordering.is_le(),
                    BinOp::Ge => ordering.is_ge(),
                    _ => unreachable!(),
                };
                Ok(Bool(result))
            }
            BinOp::And => Ok(Bool(left.is_truthy() && right.is_truthy())),
            BinOp::Or => Ok(Bool(left.is_truthy() || right.is_truthy())),
        }
    }

    fn numeric_op(&self, op: BinOp, left: &Value, right: &Value) -> EvalResult {
        let (a, b) = match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(RuntimeError::invalid_operands(
                    op.symbol(),
                    &left.type_name(),
                    &right.type_name(),
                )
                .into())
            }
        };
        match op {
            BinOp::Add => Ok(Value::Float(a + b)),
            BinOp::Sub => Ok(Value::Float(a - b)),
            BinOp::Mul => Ok(Value::Float(a * b)),
            BinOp::Div => {
                if b == 0.0 {
                    Err(RuntimeError::division_by_zero().into())
                } else {
                    Ok(Value::Float(a / b))
                }
            }
            BinOp::Mod => {
                if b == 0.0 {
                    Err(RuntimeError::division_by_zero().into())
                } else {
                    Ok(Value::Float(a.rem_euclid(b)))
                }
            }
            _ => unreachable!("numeric_op only handles arithmetic"),
        }
    }

    fn eval_call(&mut self, callee: &Spanned<Expr>, args: &[Spanned<Expr>]) -> EvalResult {
        // super(...) chains to the parent constructor with the current this
        if matches!(callee.node, Expr::Super) {
            let this = self
                .env
                .lock()
                .get("this")
                .ok_or_else(|| RuntimeError::invalid_super("'super' used outside of a method"))?;
            let instance = match this {
                Value::Instance(instance) => instance,
                _ => {
                    return Err(RuntimeError::invalid_super(
                        "'super' used outside of an instance context",
                    )
                    .into())
                }
            };
            let parent = instance
                .class
                .parent
                .clone()
                .ok_or_else(|| RuntimeError::invalid_super("no parent class for 'super'"))?;
            let ctor = match parent.get_instance_method("constructor") {
                Some((method, owner)) => {
                    let owner_name = owner.name.clone();
                    (method, owner_name)
                }
                None => return Ok(Value::Null),
            };
            let closure = Closure {
                decl: Arc::new(ctor.0.intent.clone()),
                env: Arc::clone(&self.globals),
                bound_this: Some(Value::Instance(Arc::clone(&instance))),
                bound_name: Some(format!("{}.constructor", ctor.1)),
            };
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(self.eval(arg)?);
            }
            return self.call_closure(&closure, evaluated);
        }

        let callee_value = self.eval(callee)?;
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push(self.eval(arg)?);
        }
        self.call_value(callee_value, evaluated)
    }

    /// Invoke any callable value with already-evaluated arguments.
    pub(crate) fn call_value(&mut self, callee: Value, args: Vec<Value>) -> EvalResult {
        match callee {
            Value::Closure(closure) => self.call_closure(&closure, args),
            Value::Native(native) => (native.handler)(self, &args),
            Value::Bound(bound) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(bound.receiver.clone());
                full.extend(args);
                (bound.method.handler)(self, &full)
            }
            other => Err(RuntimeError::not_callable(&other.type_name()).into()),
        }
    }

    /// The callable invocation protocol: bind positionals, evaluate default
    /// expressions in the new frame, validate declared parameter types,
    /// expose `this`, then run the body synchronously or hand it to an
    /// async worker.
    pub(crate) fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> EvalResult {
        if self.recursion_depth >= MAX_RECURSION_DEPTH {
            return Err(RuntimeError::stack_overflow().into());
        }

        let decl = &closure.decl;
        let call_env = child_env(&closure.env);

        for (i, param) in decl.params.iter().enumerate() {
            let value = if i < args.len() {
                args[i].clone()
            } else if let Some(default) = &param.default {
                // default expressions are evaluated inside the new frame;
                // a failing default degrades to null
                let previous = std::mem::replace(&mut self.env, Arc::clone(&call_env));
                let value = self.eval(default).unwrap_or(Value::Null);
                self.env = previous;
                value
            } else {
                Value::Null
            };

            if let Some(annotation) = &param.type_annotation {
                if !value_matches(&value, Some(annotation)) {
                    return Err(RuntimeError::parameter_mismatch(
                        &param.name,
                        annotation,
                        &value.type_name(),
                    )
                    .into());
                }
            }
            call_env
                .lock()
                .define(param.name.clone(), value, param.type_annotation.clone())
                .map_err(Unwind::Fail)?;
        }

        if let Some(this) = &closure.bound_this {
            call_env.lock().define_untyped("this", this.clone());
        }

        let frame = CallFrame {
            name: closure.frame_name(),
            span: decl.span,
            file: self.current_file.clone(),
            source: self.current_source.clone(),
        };

        if decl.is_async {
            return self.spawn_async(closure, call_env, frame);
        }

        self.call_stack.push(frame);
        self.recursion_depth += 1;
        let result = self.execute_block(&decl.body, Some(call_env));
        self.recursion_depth -= 1;
        self.call_stack.pop();

        match result {
            Ok(()) => Ok(Value::Null),
            Err(Unwind::Return(value)) => Ok(value),
            Err(other) => Err(other),
        }
    }

    /// Run an async intent body on its own worker thread, reporting through
    /// a fresh task. The worker shares globals and the trace table but owns
    /// its call stack.
    fn spawn_async(&self, closure: &Closure, call_env: EnvRef, frame: CallFrame) -> EvalResult {
        let task = Arc::new(AsyncTask::new());
        let completion = Arc::clone(&task);
        let decl = Arc::clone(&closure.decl);
        let mut worker = self.fork();

        debug!(intent = %frame.name, "spawning async intent");
        let handle = std::thread::Builder::new()
            .name(frame.name.clone())
            .spawn(move || {
                worker.call_stack.push(frame);
                worker.recursion_depth += 1;
                let result = worker.execute_block(&decl.body, Some(call_env));
                worker.recursion_depth -= 1;
                worker.call_stack.pop();

                let outcome = match result {
                    Ok(()) => Ok(Value::Null),
                    Err(Unwind::Return(value)) => Ok(value),
                    Err(Unwind::Raise(raised)) => Err(TaskFailure::Raised(*raised)),
                    Err(Unwind::Fail(err)) => Err(TaskFailure::Error(err)),
                };
                completion.complete(outcome);
            })
            .map_err(|err| RuntimeError::io_error(format!("cannot spawn worker: {err}")))?;

        task.attach(handle);
        Ok(Value::Task(task))
    }

    /// A closure for an instance method found on the receiver's class
    /// chain, bound to the instance and display-named after the class that
    /// declares the method.
    fn instance_method_closure(
        &self,
        instance: &Arc<InstanceObject>,
        name: &str,
    ) -> Result<Closure, Unwind> {
        let (method, owner) = instance
            .class
            .get_instance_method(name)
            .ok_or_else(|| RuntimeError::undefined_attribute(&instance.class.name, name))?;
        let owner_name = owner.name.clone();
        Ok(Closure {
            decl: Arc::new(method.intent.clone()),
            env: Arc::clone(&self.globals),
            bound_this: Some(Value::Instance(Arc::clone(instance))),
            bound_name: Some(format!("{owner_name}.{name}")),
        })
    }

    fn eval_property(&mut self, object: &Spanned<Expr>, name: &str) -> EvalResult {
        // super.method resolves on the parent of the receiver's class but
        // stays bound to the current this
        if matches!(object.node, Expr::Super) {
            let this = self
                .env
                .lock()
                .get("this")
                .ok_or_else(|| RuntimeError::invalid_super("'super' used outside of a method"))?;
            let instance = match this {
                Value::Instance(instance) => instance,
                _ => {
                    return Err(RuntimeError::invalid_super(
                        "'super' used outside of an instance context",
                    )
                    .into())
                }
            };
            let parent = instance
                .class
                .parent
                .clone()
                .ok_or_else(|| RuntimeError::invalid_super("no parent class for 'super'"))?;
            let (method, owner) = parent
                .get_instance_method(name)
                .ok_or_else(|| RuntimeError::undefined_attribute(&parent.name, name))?;
            let owner_name = owner.name.clone();
            return Ok(Value::Closure(Arc::new(Closure {
                decl: Arc::new(method.intent.clone()),
                env: Arc::clone(&self.globals),
                bound_this: Some(Value::Instance(Arc::clone(&instance))),
                bound_name: Some(format!("{owner_name}.{name}")),
            })));
        }

        let object = self.eval(object)?;
        match &object {
            Value::Class(class) => {
                // static field values win over static methods
                if let Some(value) = class.get_static_field_value(name) {
                    return Ok(value);
                }
                if let Some((method, owner)) = class.get_static_method(name) {
                    let owner_name = owner.name.clone();
                    return Ok(Value::Closure(Arc::new(Closure {
                        decl: Arc::new(method.intent.clone()),
                        env: Arc::clone(&self.globals),
                        bound_this: None,
                        bound_name: Some(format!("{owner_name}.{name}")),
                    })));
                }
                Err(RuntimeError::undefined_attribute(&class.name, name).into())
            }
            Value::Instance(instance) => {
                let caller = self.top_frame_name();
                if let Some(value) = instance
                    .get_field(name, caller.as_deref())
                    .map_err(Unwind::Fail)?
                {
                    return Ok(value);
                }
                if instance.class.get_instance_method(name).is_some() {
                    let closure = self.instance_method_closure(instance, name)?;
                    return Ok(Value::Closure(Arc::new(closure)));
                }
                // permissive fallback: a static method reached through the
                // instance, without a receiver
                if let Some((method, owner)) = instance.class.get_static_method(name) {
                    let owner_name = owner.name.clone();
                    return Ok(Value::Closure(Arc::new(Closure {
                        decl: Arc::new(method.intent.clone()),
                        env: Arc::clone(&self.globals),
                        bound_this: None,
                        bound_name: Some(format!("{owner_name}.{name}")),
                    })));
                }
                Err(RuntimeError::undefined_attribute(&instance.class.name, name).into())
            }
            Value::Map(map) => {
                // entry lookup first, container methods second
                if let Some(value) = map.get(&Value::string(name.to_string())) {
                    return Ok(value);
                }
                if let Some(native) = builtins::container_method("Map", name) {
                    return Ok(Value::Bound(Arc::new(BoundMethod {
                        receiver: object.clone(),
                        method: native,
                    })));
                }
                Ok(Value::Null)
            }
            Value::List(_) => match builtins::container_method("List", name) {
                Some(native) => Ok(Value::Bound(Arc::new(BoundMethod {
                    receiver: object.clone(),
                    method: native,
                }))),
                None => Err(RuntimeError::undefined_attribute("List", name).into()),
            },
            Value::Set(_) => match builtins::container_method("Set", name) {
                Some(native) => Ok(Value::Bound(Arc::new(BoundMethod {
                    receiver: object.clone(),
                    method: native,
                }))),
                None => Err(RuntimeError::undefined_attribute("Set", name).into()),
            },
            Value::Str(s) => {
                // `length` is property-style on strings
                if name == "length" {
                    return Ok(Value::Int(s.chars().count() as i64));
                }
                match builtins::prototype_method("string", name) {
                    Some(native) => Ok(Value::Bound(Arc::new(BoundMethod {
                        receiver: object.clone(),
                        method: native,
                    }))),
                    None => Err(RuntimeError::undefined_attribute("string", name).into()),
                }
            }
            Value::Int(_) | Value::Float(_) => {
                match builtins::prototype_method(&object.type_name(), name) {
                    Some(native) => Ok(Value::Bound(Arc::new(BoundMethod {
                        receiver: object.clone(),
                        method: native,
                    }))),
                    None => {
                        Err(RuntimeError::undefined_attribute(&object.type_name(), name).into())
                    }
                }
            }
            other => Err(RuntimeError::undefined_attribute(&other.type_name(), name).into()),
        }
    }

    fn eval_index(&mut self, object: Value, index: Value) -> EvalResult {
        match (&object, &index) {
            (Value::List(list), Value::Int(i)) => {
                let items = list.items.lock();
                let idx = if *i < 0 { items.len() as i64 + i } else { *i };
                if idx >= 0 && (idx as usize) < items.len() {
                    Ok(items[idx as usize].clone())
                } else {
                    Ok(Value::Null)
                }
            }
            (Value::Map(map), key) => Ok(map.get(key).unwrap_or(Value::Null)),
            (Value::Str(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                let idx = if *i < 0 { chars.len() as i64 + i } else { *i };
                if idx >= 0 && (idx as usize) < chars.len() {
                    Ok(Value::string(chars[idx as usize].to_string()))
                } else {
                    Ok(Value::Null)
                }
            }
            _ => Err(RuntimeError::index_error(format!(
                "value of type {} is not indexable with {}",
                object.type_name(),
                index.type_name()
            ))
            .into()),
        }
    }

    /// Instantiate a class. Builtin generic containers get their type
    /// arguments synthesized from the declared annotation or per-type
    /// defaults when the call does not supply them as leading string
    /// literals.
    fn eval_new(
        &mut self,
        class_name: &str,
        args: &[Spanned<Expr>],
        annotation: Option<&str>,
    ) -> EvalResult {
        let resolved = resolve_container_alias(class_name);

        // constructor sugar for builtin generic containers
        if let Some(defaults) = default_generics(resolved) {
            let explicit = args.len() >= defaults.len()
                && args[..defaults.len()]
                    .iter()
                    .all(|arg| matches!(&arg.node, Expr::Literal(Literal::Str(_))));

            if !explicit {
                let mut type_args: Vec<String> = Vec::new();
                if let Some(annotation) = annotation {
                    let parsed = crate::types::matching::parse_annotation(annotation);
                    if resolve_container_alias(&parsed.base) == resolved {
                        type_args = parsed
                            .args
                            .iter()
                            .take(defaults.len())
                            .map(|a| a.to_string())
                            .collect();
                    }
                }
                while type_args.len() < defaults.len() {
                    type_args.push(defaults[type_args.len()].to_string());
                }

                let mut full_args: Vec<Value> =
                    type_args.into_iter().map(Value::string).collect();
                for arg in args {
                    full_args.push(self.eval(arg)?);
                }
                return self.construct(class_name, full_args);
            }
        }

        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push(self.eval(arg)?);
        }
        self.construct(class_name, evaluated)
    }

    fn construct(&mut self, class_name: &str, args: Vec<Value>) -> EvalResult {
        let target = self
            .env
            .lock()
            .get(class_name)
            .ok_or_else(|| RuntimeError::undefined_variable(class_name))?;

        match target {
            Value::Class(class) => {
                if class.is_abstract {
                    return Err(RuntimeError::abstract_instantiation(&class.name).into());
                }
                let instance = Arc::new(InstanceObject::new(Arc::clone(&class)));

                // initialize declared fields root-first so parent defaults
                // apply before subclass shadows
                for class_level in class.chain().iter().rev() {
                    for (name, field) in &class_level.instance_fields {
                        let value = match &field.value {
                            Some(expr) => self.eval(expr)?,
                            None => Value::Null,
                        };
                        instance.set_field_raw(name, value);
                    }
                }

                if instance.class.get_instance_method("constructor").is_some() {
                    let ctor = self.instance_method_closure(&instance, "constructor")?;
                    self.call_closure(&ctor, args)?;
                }
                Ok(Value::Instance(instance))
            }
            // native constructors (List, Map, Set, ...) are plain callables
            Value::Native(native) => (native.handler)(self, &args),
            other => {
                Err(RuntimeError::type_error(format!(
                    "'{class_name}' is not a class (found {})",
                    other.type_name()
                ))
                .into())
            }
        }
    }

    // ------------------------------------------------------------------
    // String interpolation
    // ------------------------------------------------------------------

    /// Replace `{expr}` placeholders by lexing, parsing and evaluating the
    /// enclosed text in the current environment. Placeholders that fail to
    /// parse or evaluate are left verbatim.
    fn interpolate(&mut self, text: &str) -> String {
        if !text.contains('{') {
            return text.to_string();
        }
        let mut result = String::with_capacity(text.len());
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '{' {
                if let Some(close) = chars[i + 1..].iter().position(|&c| c == '}') {
                    let inner: String = chars[i + 1..i + 1 + close].iter().collect();
                    if !inner.trim().is_empty() && !inner.contains('{') {
                        match self.eval_fragment(&inner) {
                            Some(value) => {
                                result.push_str(&value.to_string());
                                i += close + 2;
                                continue;
                            }
                            None => {
                                // keep the placeholder verbatim
                            }
                        }
                    }
                }
            }
            result.push(chars[i]);
            i += 1;
        }
        result
    }

    fn eval_fragment(&mut self, fragment: &str) -> Option<Value> {
        let tokens = crate::lexer::tokenize(fragment).ok()?;
        let expr = crate::parser::parse_expression(tokens).ok()?;
        self.eval(&expr).ok()
    }

    // ------------------------------------------------------------------
    // Tracebacks
    // ------------------------------------------------------------------

    pub(crate) fn top_frame_name(&self) -> Option<String> {
        self.call_stack.last().map(|frame| frame.name.clone())
    }

    fn frame_entry(
        name: &str,
        span: Span,
        file: &Option<PathBuf>,
        source: &Option<Arc<String>>,
    ) -> Frame {
        let (line, column, text) = match source {
            Some(source) => {
                let (line, column) = span.line_col(source);
                let text = source
                    .lines()
                    .nth(line - 1)
                    .map(|l| l.trim_end().to_string());
                (Some(line), Some(column), text)
            }
            None => (None, None, None),
        };
        Frame {
            function: name.to_string(),
            file: file.clone(),
            line,
            column,
            source: text,
        }
    }

    /// Capture the current stack, innermost first. The raise site (if any)
    /// leads, followed by the call stack outward.
    pub(crate) fn capture_traceback(&self, span: Option<Span>) -> Vec<Frame> {
        let mut frames = Vec::new();
        if let Some(span) = span {
            frames.push(Self::frame_entry(
                "<throw>",
                span,
                &self.current_file,
                &self.current_source,
            ));
        }
        for frame in self.call_stack.iter().rev() {
            frames.push(Self::frame_entry(
                &frame.name,
                frame.span,
                &frame.file,
                &frame.source,
            ));
        }
        frames
    }

    fn print_frames(frames: &[Frame]) {
        eprintln!("Traceback (most recent call last):");
        for entry in frames {
            let file = entry
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            match (entry.line, entry.column) {
                (Some(line), Some(column)) => eprintln!(
                    "  File \"{file}\", line {line}, column {column}, in {}",
                    entry.function
                ),
                (Some(line), None) => {
                    eprintln!("  File \"{file}\", line {line}, in {}", entry.function)
                }
                _ => eprintln!("  File \"{file}\", in {}", entry.function),
            }
            if let Some(source) = &entry.source {
                eprintln!("    {source}");
                if let Some(column) = entry.column {
                    if column > 0 {
                        eprintln!("    {}^", " ".repeat(column - 1));
                    }
                }
            }
        }
    }

    pub(crate) fn print_raised_traceback(&self, raised: &Raised) {
        Self::print_frames(&raised.frames);
        eprintln!("{}: {}", raised.type_name, raised.message);
    }

    pub(crate) fn print_error_traceback(&self, err: &RuntimeError, span: Option<Span>) {
        let frames = self.capture_traceback(span);
        Self::print_frames(&frames);
        eprintln!("{}: {}", err.type_label(), err.message);
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// The span a top-level statement is best blamed on, for error reporting.
fn stmt_span(stmt: &Stmt) -> Option<Span> {
    match stmt {
        Stmt::Var(decl) => Some(decl.span),
        Stmt::Intent(decl) => Some(decl.span),
        Stmt::Class(decl) => Some(decl.span),
        Stmt::Interface(decl) => Some(decl.span),
        Stmt::Assign(assign) => Some(assign.span),
        Stmt::If(node) => Some(node.condition.span),
        Stmt::While(node) => Some(node.condition.span),
        Stmt::For(node) => node.condition.as_ref().map(|c| c.span),
        Stmt::ForIn(node) => Some(node.iterable.span),
        Stmt::ForOf(node) => Some(node.iterable.span),
        Stmt::Try(node) => Some(node.span),
        Stmt::Throw(node) => Some(node.span),
        Stmt::Return(node) => Some(node.span),
        Stmt::Import(decl) => Some(decl.span),
        Stmt::Dataset(op) => Some(op.span),
        Stmt::Model(op) => Some(op.span),
        Stmt::Expr(expr) => Some(expr.span),
    }
}

/// Lex and parse a unit, folding failures into a plain message for import
/// error reporting.
fn parse_unit(source: &str) -> Result<Program, String> {
    let tokens = crate::lexer::tokenize(source).map_err(|err| err.to_string())?;
    crate::parser::parse(tokens).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Interpreter {
        let mut interp = Interpreter::new();
        interp.set_source(source);
        let tokens = crate::lexer::tokenize(source).unwrap();
        let program = crate::parser::parse(tokens).unwrap();
        interp.interpret(&program).unwrap();
        interp
    }

    fn global(interp: &Interpreter, name: &str) -> Value {
        interp.globals.lock().get(name).unwrap()
    }

    #[test]
    fn test_arithmetic_and_globals() {
        let interp = run("var x = 2 + 3 * 4");
        assert_eq!(global(&interp, "x"), Value::Int(14));
    }

    #[test]
    fn test_int_division_truncates() {
        let interp = run("var x = 7 / 2");
        assert_eq!(global(&interp, "x"), Value::Int(3));
    }

    #[test]
    fn test_mixed_arithmetic_promotes() {
        let interp = run("var x = 1 + 2.5");
        assert_eq!(global(&interp, "x"), Value::Float(3.5));
    }

    #[test]
    fn test_string_concat() {
        let interp = run(r#"var s = "a" + 1"#);
        assert_eq!(global(&interp, "s"), Value::string("a1"));
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        let mut interp = Interpreter::new();
        let tokens = crate::lexer::tokenize("var x = 1 / 0").unwrap();
        let program = crate::parser::parse(tokens).unwrap();
        assert!(interp.interpret(&program).is_err());
    }

    #[test]
    fn test_interpolation() {
        let interp = run(r#"var name = "world" var s = "hello {name}, {1 + 1}""#);
        assert_eq!(global(&interp, "s"), Value::string("hello world, 2"));
    }

    #[test]
    fn test_interpolation_failure_keeps_placeholder() {
        let interp = run(r#"var s = "value: {missing_var}""#);
        assert_eq!(global(&interp, "s"), Value::string("value: {missing_var}"));
    }

    #[test]
    fn test_intent_call_and_return() {
        let interp = run("intent double(x: int): int { return x * 2 } var y = double(21)");
        assert_eq!(global(&interp, "y"), Value::Int(42));
    }

    #[test]
    fn test_default_parameter_value() {
        let interp = run("intent greet(name = \"friend\") { return \"hi \" + name } var a = greet() var b = greet(\"ana\")");
        assert_eq!(global(&interp, "a"), Value::string("hi friend"));
        assert_eq!(global(&interp, "b"), Value::string("hi ana"));
    }

    #[test]
    fn test_missing_arg_binds_null() {
        let interp = run("intent f(a, b) { return b } var x = f(1)");
        assert_eq!(global(&interp, "x"), Value::Null);
    }

    #[test]
    fn test_closure_captures_scope() {
        let interp = run(
            "intent counter() { var n = 0 intent bump() { n = n + 1 return n } return bump }\nvar c = counter()\nvar a = c()\nvar b = c()",
        );
        assert_eq!(global(&interp, "a"), Value::Int(1));
        assert_eq!(global(&interp, "b"), Value::Int(2));
    }

    #[test]
    fn test_while_loop() {
        let interp = run("var n = 0 while (n < 5) { n = n + 1 }");
        assert_eq!(global(&interp, "n"), Value::Int(5));
    }

    #[test]
    fn test_for_loop() {
        let interp = run("var total = 0 for (var i = 0; i < 4; i = i + 1) { total = total + i }");
        assert_eq!(global(&interp, "total"), Value::Int(6));
    }

    #[test]
    fn test_for_of_over_array() {
        let interp = run("var total = 0 for (var x of [1, 2, 3]) { total = total + x }");
        assert_eq!(global(&interp, "total"), Value::Int(6));
    }

    #[test]
    fn test_for_in_yields_map_keys() {
        let interp =
            run("var keys = \"\" var m = {a: 1, b: 2} for (var k in m) { keys = keys + k }");
        assert_eq!(global(&interp, "keys"), Value::string("ab"));
    }

    #[test]
    fn test_for_of_yields_map_values() {
        let interp = run("var total = 0 var m = {a: 1, b: 2} for (var v of m) { total = total + v }");
        assert_eq!(global(&interp, "total"), Value::Int(3));
    }

    #[test]
    fn test_index_access() {
        let interp = run("var xs = [10, 20, 30] var a = xs[1] var b = xs[-1] var c = xs[9]");
        assert_eq!(global(&interp, "a"), Value::Int(20));
        assert_eq!(global(&interp, "b"), Value::Int(30));
        assert_eq!(global(&interp, "c"), Value::Null);
    }

    #[test]
    fn test_lambda() {
        let interp = run("var f = fn(x) { return x + 1 } var y = f(41)");
        assert_eq!(global(&interp, "y"), Value::Int(42));
    }

    #[test]
    fn test_await_non_task_is_identity() {
        let interp = run("var x = await 42");
        assert_eq!(global(&interp, "x"), Value::Int(42));
    }

    #[test]
    fn test_async_intent_returns_task_and_await_gets_value() {
        let interp = run("async intent work(): int { return 7 } var t = work() var x = await t");
        assert_eq!(global(&interp, "x"), Value::Int(7));
    }

    #[test]
    fn test_declared_type_enforced_on_assignment() {
        let mut interp = Interpreter::new();
        let tokens = crate::lexer::tokenize("var x: int = 5 x = 5.0").unwrap();
        let program = crate::parser::parse(tokens).unwrap();
        assert!(interp.interpret(&program).is_err());
    }

    #[test]
    fn test_float_declaration_accepts_int_twice() {
        let interp = run("var y: float = 5 y = 6");
        assert_eq!(global(&interp, "y"), Value::Int(6));
    }

    #[test]
    fn test_permissive_mode_continues_after_type_error() {
        let mut interp = Interpreter::new();
        interp.permissive = true;
        let tokens = crate::lexer::tokenize("var x: int = 5.0 var y = 1").unwrap();
        let program = crate::parser::parse(tokens).unwrap();
        interp.interpret(&program).unwrap();
        assert_eq!(interp.globals.lock().get("y"), Some(Value::Int(1)));
    }

    #[test]
    fn test_generic_sugar_from_annotation() {
        let interp = run("var xs: List<int> = new List()");
        match global(&interp, "xs") {
            Value::List(list) => assert_eq!(list.elem_type, "int"),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_generic_sugar_defaults() {
        let interp = run("var xs = new List()");
        match global(&interp, "xs") {
            Value::List(list) => assert_eq!(list.elem_type, "any"),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_type_args_not_overridden() {
        let interp = run("var xs: List<int> = new List(\"string\")");
        match global(&interp, "xs") {
            Value::List(list) => assert_eq!(list.elem_type, "string"),
            other => panic!("expected list, got {other:?}"),
        }
    }
}
