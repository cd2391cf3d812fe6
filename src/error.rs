//! Error kinds shared by the resolver, the registry, the generators and the evaluator.
//!
//! Two of these are not failures in the usual sense. `FailedAssumption` is a
//! filtering signal that never reaches the caller, and `MissingStrategy` travels
//! through tuple streams as a sentinel coordinate instead of aborting them.

use thiserror::Error;

/// Type alias for engine operation results
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The type expression is not a recognized type construct.
    #[error("unrecognized type expression `{0}`")]
    UnrecognizedType(String),

    /// No generator is registered for the type, and none can be composed.
    #[error("no strategy available for type `{0}`")]
    MissingStrategy(String),

    #[error("a strategy is already registered for type `{0}`")]
    DuplicateStrategy(String),

    /// Raised by [`assume`](crate::asserts::assume) to discard the current value or tuple.
    #[error("assumption not met")]
    FailedAssumption,

    #[error("{0}")]
    Assertion(String),

    #[error("expected {expected} value, found `{found}`")]
    TypeMismatch { expected: &'static str, found: String },

    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("precondition of `{command}` does not hold at step {index}")]
    InvalidSequence { index: usize, command: String },

    #[error("generation of `{ty}` failed: {message}")]
    Generation { ty: String, message: String },

    #[error("property `{property}` faulted on ({arguments}): {message}")]
    PredicateFault {
        property: String,
        arguments: String,
        message: String,
    },

    #[error("{0}")]
    Fault(String),
}

impl EngineError {
    pub fn fault(message: impl Into<String>) -> Self {
        EngineError::Fault(message.into())
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        EngineError::Assertion(message.into())
    }

    pub fn is_missing_strategy(&self) -> bool {
        matches!(self, EngineError::MissingStrategy(_))
    }

    /// Whether the error rejects a value rather than reporting a fault.
    pub(crate) fn is_rejection(&self) -> bool {
        matches!(self, EngineError::FailedAssumption | EngineError::Assertion(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_type() {
        let err = EngineError::MissingStrategy("List[Widget]".to_string());
        assert_eq!(err.to_string(), "no strategy available for type `List[Widget]`");
        assert!(err.is_missing_strategy());

        let err = EngineError::UnrecognizedType("List[".to_string());
        assert!(err.to_string().contains("List["));
        assert!(!err.is_missing_strategy());
    }

    #[test]
    fn test_rejections() {
        assert!(EngineError::FailedAssumption.is_rejection());
        assert!(EngineError::assertion("1 != 2").is_rejection());
        assert!(!EngineError::fault("boom").is_rejection());
    }
}
