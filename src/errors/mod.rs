//! Bridge error taxonomy
//!
//! Every failure surfaced to a host caller is a `BridgeError`. Foreign
//! exceptions are classified once, at the dispatch boundary, so callers can
//! match on the kind without parsing messages.

use jvbridge_runtime::RuntimeError;
use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// Evaluator key that is neither a string nor a sequence of strings
    #[error("TypeError: invalid evaluator key {found}; expected a string or a sequence of strings")]
    InvalidKey { found: String },

    /// Compile or runtime failure while filling an evaluator entry
    #[error("EvaluationError: {message}")]
    Evaluation { kind: String, message: String },

    /// No foreign method matches the converted argument types
    #[error("DispatchError: {message}")]
    Dispatch { function: String, message: String },

    #[error("ImmutableFieldError: cannot set field `{field}` of immutable {type_name}")]
    ImmutableField { type_name: String, field: String },

    #[error("ConversionError: {0}")]
    Conversion(String),

    /// Any other foreign exception raised by a call, message verbatim
    #[error("{message}")]
    Foreign { kind: String, message: String },

    #[error("BootstrapError: {0}")]
    Bootstrap(String),

    #[error("ConfigError: {0}")]
    Config(String),
}

impl BridgeError {
    /// Short name of the error kind, as a host exception class would be named
    pub fn kind(&self) -> &str {
        match self {
            BridgeError::InvalidKey { .. } => "InvalidKeyError",
            BridgeError::Evaluation { .. } => "EvaluationError",
            BridgeError::Dispatch { .. } => "DispatchError",
            BridgeError::ImmutableField { .. } => "ImmutableFieldError",
            BridgeError::Conversion(_) => "ConversionError",
            BridgeError::Foreign { kind, .. } => kind,
            BridgeError::Bootstrap(_) => "BootstrapError",
            BridgeError::Config(_) => "ConfigError",
        }
    }

    pub(crate) fn invalid_key(found: impl Into<String>) -> Self {
        BridgeError::InvalidKey {
            found: found.into(),
        }
    }

    /// Foreign failure while compiling or running an evaluator entry
    pub(crate) fn evaluation(err: &RuntimeError) -> Self {
        BridgeError::Evaluation {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn bootstrap(message: impl Into<String>) -> Self {
        BridgeError::Bootstrap(message.into())
    }
}

/// Classification of a foreign exception raised by a dispatched call
impl From<RuntimeError> for BridgeError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Method { ref function, .. } => BridgeError::Dispatch {
                function: function.clone(),
                message: err.to_string(),
            },
            RuntimeError::ImmutableField { type_name, field } => {
                BridgeError::ImmutableField { type_name, field }
            }
            other => BridgeError::Foreign {
                kind: other.kind().to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::bootstrap(err.to_string())
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Config(format!("failed to parse config: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_error_becomes_dispatch() {
        let err: BridgeError = RuntimeError::Method {
            function: "push!".to_string(),
            arg_types: vec!["Int64".to_string()],
        }
        .into();
        assert_eq!(err.kind(), "DispatchError");
        assert!(err.to_string().contains("no method matching push!(::Int64)"));
    }

    #[test]
    fn test_immutable_field_keeps_names() {
        let err: BridgeError = RuntimeError::ImmutableField {
            type_name: "S1".to_string(),
            field: "x".to_string(),
        }
        .into();
        assert_eq!(
            err,
            BridgeError::ImmutableField {
                type_name: "S1".to_string(),
                field: "x".to_string(),
            }
        );
    }

    #[test]
    fn test_other_foreign_errors_keep_kind() {
        let err: BridgeError = RuntimeError::Key {
            key: "1".to_string(),
        }
        .into();
        assert_eq!(err.kind(), "KeyError");
        assert_eq!(err.to_string(), "KeyError: key 1 not found");
    }

    #[test]
    fn test_evaluation_carries_foreign_message() {
        let err = BridgeError::evaluation(&RuntimeError::Error("boom".to_string()));
        assert_eq!(err.kind(), "EvaluationError");
        assert_eq!(err.to_string(), "EvaluationError: boom");
    }
}
