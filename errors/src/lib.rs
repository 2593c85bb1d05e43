//! # Regionward Errors
//!
//! Validation errors shared by the policy, storage and config crates.
//!
//! Link and unlink report failure as `false` rather than through these types;
//! storage I/O failures live next to the storage code that produces them.

use thiserror::Error;

/// Handler registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("Handler name already in use: {name}")]
    NameConflict { name: String },

    #[error("Invalid handler name: {name}")]
    InvalidName { name: String },

    #[error("Handler not found: {name}")]
    NotFound { name: String },

    #[error("The global handler does not support {operation}")]
    GlobalImmutable { operation: String },
}

impl HandlerError {
    pub fn global(operation: &str) -> Self {
        HandlerError::GlobalImmutable {
            operation: operation.to_string(),
        }
    }
}

/// Handler construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("Unknown handler type: {type_}")]
    UnknownType { type_: String },

    #[error("Handler type cannot be created: {type_}")]
    NotCreatable { type_: String },

    #[error("Invalid creation argument {argument}: {reason}")]
    InvalidArgument { argument: String, reason: String },

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {variable}: {reason}")]
    EnvParse { variable: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = HandlerError::NameConflict {
            name: "town".to_string(),
        };
        assert_eq!(err.to_string(), "Handler name already in use: town");

        let err = FactoryError::UnknownType {
            type_: "bogus".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown handler type: bogus");
    }

    #[test]
    fn test_factory_error_wraps_handler_error() {
        let err: FactoryError = HandlerError::global("rename").into();
        assert_eq!(
            err.to_string(),
            "The global handler does not support rename"
        );
    }
}
