use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    EmbeddingBackend,
    InvariantViolation,
    ResourceExhausted,
    Io,
    Internal,
}

impl ErrorCode {
    /// Whether a batch run may skip the failing item and keep going.
    pub fn is_item_recoverable(&self) -> bool {
        matches!(self, ErrorCode::InvalidInput | ErrorCode::EmbeddingBackend)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::EmbeddingBackend => "EMBEDDING_BACKEND",
            ErrorCode::InvariantViolation => "INVARIANT_VIOLATION",
            ErrorCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorCode::Io => "IO",
            ErrorCode::Internal => "INTERNAL",
        };
        write!(f, "{}", s)
    }
}

pub trait FactgraphError: std::error::Error {
    fn error_code(&self) -> ErrorCode;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_input_and_backend_failures_are_item_recoverable() {
        assert!(ErrorCode::InvalidInput.is_item_recoverable());
        assert!(ErrorCode::EmbeddingBackend.is_item_recoverable());
        assert!(!ErrorCode::InvariantViolation.is_item_recoverable());
        assert!(!ErrorCode::ResourceExhausted.is_item_recoverable());
        assert!(!ErrorCode::Io.is_item_recoverable());
    }

    #[test]
    fn error_code_serializes_in_screaming_case() {
        let json = serde_json::to_string(&ErrorCode::InvariantViolation).unwrap();
        assert_eq!(json, "\"INVARIANT_VIOLATION\"");
        assert_eq!(ErrorCode::EmbeddingBackend.to_string(), "EMBEDDING_BACKEND");
    }
}
