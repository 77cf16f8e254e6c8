use crate::runtime::value::Holder;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Name `{name}` is not defined")]
    NameUnbound { name: String },
    #[error("{target} is not a class instance")]
    NotAnInstance { target: String },
    #[error("Class `{class}` has no method `{method}` taking {arity} argument(s)")]
    NoSuchMethod {
        class: String,
        method: String,
        arity: usize,
    },
    #[error("Cannot compare values for {operation}")]
    Uncomparable { operation: &'static str },
    #[error("Unsupported operand types for `{operator}`")]
    BadOperands { operator: &'static str },
    #[error("Division by zero")]
    DivByZero,
    #[error("Operator `{operator}` received an empty operand")]
    NullOperand { operator: &'static str },
    #[error("`return` outside of a method")]
    ReturnAtTopLevel,
    #[error("Type mismatch: {message}")]
    TypeMismatch { message: String },
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// Non-local control transfer. `Return` is raised by `return` statements and
/// caught only at the `MethodBody` boundary; everything else unwinds to the
/// driver as a plain runtime error.
#[derive(Debug)]
pub enum Unwind {
    Return(Holder),
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Error(error)
    }
}

impl From<std::io::Error> for Unwind {
    fn from(error: std::io::Error) -> Self {
        Unwind::Error(RuntimeError::Output(error))
    }
}

pub type ExecResult<T = Holder> = Result<T, Unwind>;
