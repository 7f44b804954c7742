use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Payload mismatch: expected {expected}, got {actual}")]
    PayloadMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CoreError::PayloadMismatch {
            expected: "document",
            actual: "text",
        };
        assert_eq!(
            error.to_string(),
            "Payload mismatch: expected document, got text"
        );
    }
}
