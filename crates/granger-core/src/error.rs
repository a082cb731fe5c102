//! Error types for automaton learning and prediction

use thiserror::Error;

/// Errors raised for invalid inputs.
///
/// Failing to learn a model from data is not an error: builders return
/// `Ok(None)` in that case. Numerically degenerate systems are recovered
/// internally and only logged.
#[derive(Debug, Error)]
pub enum GrangerError {
    #[error("Symbol {symbol} at position {position} exceeds alphabet size {alphabet_size}")]
    SymbolOutOfRange {
        symbol: usize,
        position: usize,
        alphabet_size: usize,
    },

    #[error("Sequence '{0}' is empty")]
    EmptySequence(String),

    #[error("Length mismatch for '{name}': expected {expected}, found {found}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("Unknown stream: {0}")]
    UnknownStream(String),

    #[error("Alphabet mismatch: expected {expected} symbols, found {found}")]
    AlphabetMismatch { expected: usize, found: usize },

    #[error("Malformed predictor: {0}")]
    MalformedPredictor(String),

    #[error("Predictor JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GrangerError {
    pub fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        GrangerError::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        GrangerError::MalformedPredictor(message.into())
    }
}

pub type GrangerResult<T> = Result<T, GrangerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offending_input() {
        let err = GrangerError::SymbolOutOfRange {
            symbol: 7,
            position: 3,
            alphabet_size: 4,
        };
        assert_eq!(err.to_string(), "Symbol 7 at position 3 exceeds alphabet size 4");

        let err = GrangerError::invalid_parameter("epsilon", "must be positive");
        assert_eq!(err.to_string(), "Invalid parameter 'epsilon': must be positive");
    }

    #[test]
    fn test_json_errors_convert() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: GrangerError = parse.unwrap_err().into();
        assert!(matches!(err, GrangerError::Json(_)));
    }
}
