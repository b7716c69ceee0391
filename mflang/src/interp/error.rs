//! Runtime errors, exception records and the control-flow channel

use super::value::Value;
use std::fmt;
use std::path::PathBuf;

/// Fatal runtime error during interpretation. These are not catchable by
/// user `try`/`catch`; only values raised with `throw` are.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Kinds of fatal runtime errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Undefined variable
    UndefinedVariable,
    /// Missing field/method on an object
    UndefinedAttribute,
    /// Declaration/assignment/parameter type mismatch
    TypeError,
    /// Value invoked that is not callable
    NotCallable,
    /// Division by zero
    DivisionByZero,
    /// Operand types invalid for an operator
    InvalidOperands,
    /// Value has no supported iteration shape
    NotIterable,
    /// Private member accessed from outside its declaring class
    PrivateAccess,
    /// `new` on an abstract class
    AbstractInstantiation,
    /// `super` outside an instance method, or no parent class
    InvalidSuper,
    /// Bare `throw;` with no active exception
    RethrowWithoutActive,
    /// Import failed (missing module or parse failure)
    ImportError,
    /// Assignment target is not an identifier or property chain
    InvalidAssignTarget,
    /// Recursion limit exceeded
    StackOverflow,
    /// Index not usable for the indexed value
    IndexError,
    /// IO failure inside a native binding
    IoError,
}

impl RuntimeError {
    pub fn undefined_variable(name: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::UndefinedVariable,
            message: format!("undefined variable: {name}"),
        }
    }

    pub fn undefined_attribute(type_name: &str, attr: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::UndefinedAttribute,
            message: format!("'{type_name}' object has no attribute '{attr}'"),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    pub fn declaration_mismatch(name: &str, annotated: &str, actual: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::TypeError,
            message: format!(
                "type mismatch on declaration of '{name}': annotated '{annotated}' but assigned value of type '{actual}'"
            ),
        }
    }

    pub fn assignment_mismatch(name: &str, annotated: &str, actual: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::TypeError,
            message: format!(
                "type mismatch on assignment to '{name}': annotated '{annotated}' but assigning value of type '{actual}'"
            ),
        }
    }

    pub fn parameter_mismatch(param: &str, annotated: &str, actual: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::TypeError,
            message: format!(
                "type mismatch for parameter '{param}': annotated '{annotated}' but received value of type '{actual}'"
            ),
        }
    }

    pub fn not_callable(what: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::NotCallable,
            message: format!("'{what}' is not callable"),
        }
    }

    pub fn division_by_zero() -> Self {
        RuntimeError {
            kind: ErrorKind::DivisionByZero,
            message: "division by zero".to_string(),
        }
    }

    pub fn invalid_operands(op: &str, left: &str, right: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::InvalidOperands,
            message: format!("unsupported operand types for '{op}': {left} and {right}"),
        }
    }

    pub fn not_iterable(type_name: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::NotIterable,
            message: format!("object is not iterable: {type_name}"),
        }
    }

    pub fn private_access(class: &str, field: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::PrivateAccess,
            message: format!("cannot access private field '{field}' of class '{class}'"),
        }
    }

    pub fn abstract_instantiation(class: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::AbstractInstantiation,
            message: format!("cannot instantiate abstract class '{class}'"),
        }
    }

    pub fn invalid_super(message: impl Into<String>) -> Self {
        RuntimeError {
            kind: ErrorKind::InvalidSuper,
            message: message.into(),
        }
    }

    pub fn rethrow_without_active() -> Self {
        RuntimeError {
            kind: ErrorKind::RethrowWithoutActive,
            message: "cannot rethrow exception: no active exception in scope".to_string(),
        }
    }

    pub fn import_error(module: &str, detail: &str, candidates: &[String]) -> Self {
        let mut message = format!("error importing '{module}': {detail}");
        if !candidates.is_empty() {
            message.push_str("\nsuggestions:");
            for candidate in candidates {
                message.push_str(&format!("\n  - {candidate}"));
            }
        }
        RuntimeError {
            kind: ErrorKind::ImportError,
            message,
        }
    }

    pub fn invalid_assign_target() -> Self {
        RuntimeError {
            kind: ErrorKind::InvalidAssignTarget,
            message: "invalid assignment target".to_string(),
        }
    }

    pub fn stack_overflow() -> Self {
        RuntimeError {
            kind: ErrorKind::StackOverflow,
            message: "stack overflow: too deep recursion".to_string(),
        }
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        RuntimeError {
            kind: ErrorKind::IndexError,
            message: message.into(),
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        RuntimeError {
            kind: ErrorKind::IoError,
            message: format!("IO error: {}", message.into()),
        }
    }

    /// The type name printed at the foot of a traceback.
    pub fn type_label(&self) -> &'static str {
        match self.kind {
            ErrorKind::UndefinedVariable => "NameError",
            ErrorKind::UndefinedAttribute => "AttributeError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::NotCallable => "TypeError",
            ErrorKind::DivisionByZero => "ZeroDivisionError",
            ErrorKind::InvalidOperands => "TypeError",
            ErrorKind::NotIterable => "TypeError",
            ErrorKind::PrivateAccess => "AccessError",
            ErrorKind::AbstractInstantiation => "TypeError",
            ErrorKind::InvalidSuper => "RuntimeError",
            ErrorKind::RethrowWithoutActive => "RuntimeError",
            ErrorKind::ImportError => "ImportError",
            ErrorKind::InvalidAssignTarget => "RuntimeError",
            ErrorKind::StackOverflow => "RecursionError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::IoError => "IOError",
        }
    }

    pub fn is_type_error(&self) -> bool {
        self.kind == ErrorKind::TypeError
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Runtime error: {}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// One captured stack frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub function: String,
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub source: Option<String>,
}

/// A user-raised exception: the raised value together with the message,
/// resolved type name and stack frames captured at the raise site.
#[derive(Debug, Clone)]
pub struct Raised {
    pub value: Value,
    pub message: String,
    pub type_name: String,
    pub frames: Vec<Frame>,
}

/// Non-local control flow. `Return` unwinds to the nearest call boundary and
/// is invisible to `try`/`catch`; `Raise` is the catchable channel; `Fail`
/// carries fatal runtime errors past catch clauses (finally still runs).
#[derive(Debug)]
pub enum Unwind {
    Return(Value),
    Raise(Box<Raised>),
    Fail(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Fail(err)
    }
}

/// Result of executing a statement
pub type ExecResult = Result<(), Unwind>;

/// Result of evaluating an expression
pub type EvalResult = Result<Value, Unwind>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_variable() {
        let err = RuntimeError::undefined_variable("foo");
        assert_eq!(err.kind, ErrorKind::UndefinedVariable);
        assert!(err.message.contains("foo"));
    }

    #[test]
    fn test_declaration_mismatch_message() {
        let err = RuntimeError::declaration_mismatch("x", "int", "float");
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(
            err.message,
            "type mismatch on declaration of 'x': annotated 'int' but assigned value of type 'float'"
        );
    }

    #[test]
    fn test_assignment_mismatch_message() {
        let err = RuntimeError::assignment_mismatch("x", "int", "float");
        assert!(err.message.contains("assignment to 'x'"));
    }

    #[test]
    fn test_import_error_with_candidates() {
        let err = RuntimeError::import_error(
            "app.helpers",
            "module not found",
            &["lib/helpers.mp".to_string(), "src/helpers.mp".to_string()],
        );
        assert_eq!(err.kind, ErrorKind::ImportError);
        assert!(err.message.contains("suggestions:"));
        assert!(err.message.contains("lib/helpers.mp"));
    }

    #[test]
    fn test_import_error_without_candidates() {
        let err = RuntimeError::import_error("app.helpers", "module not found", &[]);
        assert!(!err.message.contains("suggestions:"));
    }

    #[test]
    fn test_rethrow_message() {
        let err = RuntimeError::rethrow_without_active();
        assert_eq!(err.kind, ErrorKind::RethrowWithoutActive);
        assert!(err.message.contains("no active exception"));
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(
            RuntimeError::undefined_variable("x").type_label(),
            "NameError"
        );
        assert_eq!(RuntimeError::division_by_zero().type_label(), "ZeroDivisionError");
        assert_eq!(
            RuntimeError::private_access("A", "f").type_label(),
            "AccessError"
        );
    }

    #[test]
    fn test_display() {
        let err = RuntimeError::division_by_zero();
        assert_eq!(format!("{err}"), "Runtime error: division by zero");
    }

    #[test]
    fn test_unwind_from_runtime_error() {
        let unwind: Unwind = RuntimeError::division_by_zero().into();
        assert!(matches!(unwind, Unwind::Fail(_)));
    }

    #[test]
    fn test_error_is_std_error() {
        let err = RuntimeError::division_by_zero();
        let _: &dyn std::error::Error = &err;
    }
}
