//! Tree-walking interpreter: runtime values, scope chain, object model,
//! async tasks, control flow and the evaluator itself.

mod builtins;
mod env;
mod error;
mod eval;
mod object;
mod task;
mod value;

pub use env::{child_env, EnvRef, Environment};
pub use error::{ErrorKind, EvalResult, ExecResult, Frame, Raised, RuntimeError, Unwind};
pub use eval::Interpreter;
pub use object::{ClassObject, InstanceObject};
pub use task::{AsyncTask, TaskFailure};
pub use value::{
    from_json, to_json, BoundMethod, Closure, ListObject, MapObject, NativeFn, NativeHandler,
    SetObject, Value,
};
