use pest::error::Error as PestError;

use crate::parse::Rule;

/// Errors raised while turning a token tree into nodes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadError {
    #[error("Malformed `{form}` form: {reason}")]
    MalformedForm { form: String, reason: String },
    #[error("Invalid string literal {0}")]
    InvalidString(String),
    #[error("Invalid number literal {0}")]
    InvalidNumber(String),
}

impl ReadError {
    pub(crate) fn malformed<F, R>(form: F, reason: R) -> Self
    where
        F: Into<String>,
        R: Into<String>,
    {
        ReadError::MalformedForm {
            form: form.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised during evaluation
///
/// None of these are recovered from inside the evaluator. They propagate
/// up to whoever called [`Node::evaluate`](crate::Node::evaluate).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("{0} is undefined")]
    UnboundName(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("No instance of `{operation}` matches arguments ({args})")]
    DispatchFailure { operation: String, args: String },
    #[error("`{name}` expects {expected} arguments but got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Unknown generic class {0}")]
    UnknownClass(String),
    #[error("Class {class} has no operation `{operation}`")]
    UnknownOperation { class: String, operation: String },
    #[error("Operation `{operation}` of class {class} already belongs to class {owner}")]
    OperationConflict {
        operation: String,
        class: String,
        owner: String,
    },
    #[error("Instance of `{operation}` must match at least one argument")]
    EmptyMatcher { operation: String },
    #[error("Maximum recursion depth exceeded ({depth} nested calls)")]
    RecursionLimit { depth: usize },
}

impl RuntimeError {
    pub(crate) fn mismatch<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        RuntimeError::TypeMismatch(message.into())
    }
}

/// Any error produced while parsing, reading, or running source text
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Parse(Box<PestError<Rule>>),
    #[error("{located}")]
    Read {
        kind: ReadError,
        located: Box<PestError<Rule>>,
    },
    #[error("{0}")]
    Runtime(#[from] RuntimeError),
}

impl From<PestError<Rule>> for Error {
    fn from(error: PestError<Rule>) -> Self {
        Error::Parse(Box::new(error))
    }
}
