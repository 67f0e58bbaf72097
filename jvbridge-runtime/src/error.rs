//! Runtime exceptions
//!
//! Every failure raised while evaluating code is a `RuntimeError`. The
//! variants follow the exception types user code can observe; `kind()`
//! returns that exception type's name.

use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("MethodError: no method matching {function}({})", signature(.arg_types))]
    Method {
        function: String,
        arg_types: Vec<String>,
    },

    #[error("UndefVarError: `{name}` not defined")]
    UndefVar { name: String },

    #[error("BoundsError: attempt to access {container} at index [{index}]")]
    Bounds { container: String, index: String },

    #[error("KeyError: key {key} not found")]
    Key { key: String },

    #[error("{0}")]
    Error(String),

    #[error("InexactError: {func}({target}, {value})")]
    Inexact {
        func: String,
        target: String,
        value: String,
    },

    #[error("DomainError with {value}: {message}")]
    Domain { value: String, message: String },

    #[error("DivideError: integer division error")]
    DivideByZero,

    #[error("DimensionMismatch: {0}")]
    DimensionMismatch(String),

    #[error("ArgumentError: {0}")]
    Argument(String),

    #[error("FieldError: type {type_name} has no field `{field}`")]
    Field { type_name: String, field: String },

    #[error("setfield!: immutable struct of type {type_name} cannot be changed")]
    ImmutableField { type_name: String, field: String },

    #[error("TypeError: in {context}, expected {expected}, got a value of type {got}")]
    TypeMismatch {
        context: String,
        expected: String,
        got: String,
    },

    #[error("ParseError: {message} at line {line}, column {column}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("invalid redefinition of constant {0}")]
    Redefinition(String),
}

fn signature(arg_types: &[String]) -> String {
    arg_types
        .iter()
        .map(|t| format!("::{t}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl RuntimeError {
    /// Name of the exception type as seen from user code.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::Method { .. } => "MethodError",
            RuntimeError::UndefVar { .. } => "UndefVarError",
            RuntimeError::Bounds { .. } => "BoundsError",
            RuntimeError::Key { .. } => "KeyError",
            RuntimeError::Error(_) => "ErrorException",
            RuntimeError::Inexact { .. } => "InexactError",
            RuntimeError::Domain { .. } => "DomainError",
            RuntimeError::DivideByZero => "DivideError",
            RuntimeError::DimensionMismatch(_) => "DimensionMismatch",
            RuntimeError::Argument(_) => "ArgumentError",
            RuntimeError::Field { .. } => "FieldError",
            RuntimeError::ImmutableField { .. } => "ErrorException",
            RuntimeError::TypeMismatch { .. } => "TypeError",
            RuntimeError::Parse { .. } => "ParseError",
            RuntimeError::Redefinition(_) => "ErrorException",
        }
    }

    pub(crate) fn method(function: &str, args: &[crate::objects::Value]) -> Self {
        RuntimeError::Method {
            function: function.to_string(),
            arg_types: args.iter().map(|a| a.type_of().to_string()).collect(),
        }
    }

    pub(crate) fn not_boolean(context: &str, value: &crate::objects::Value) -> Self {
        RuntimeError::TypeMismatch {
            context: context.to_string(),
            expected: "Bool".to_string(),
            got: value.type_of().to_string(),
        }
    }
}
