use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Chat API error: {message}")]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Chat API rate limited, retry after {retry_after:?}s")]
    RateLimited { retry_after: Option<u64> },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Rate limits, server-side failures and dropped connections are worth
    /// another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api {
                status_code: Some(code),
                ..
            } => *code >= 500,
            _ => false,
        }
    }
}

pub type LlmResult<T> = Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(LlmError::RateLimited { retry_after: None }.is_retryable());
        assert!(LlmError::Api {
            message: "bad gateway".to_string(),
            status_code: Some(502),
        }
        .is_retryable());
        assert!(!LlmError::Api {
            message: "bad request".to_string(),
            status_code: Some(400),
        }
        .is_retryable());
        assert!(!LlmError::InvalidResponse("empty".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        // Nothing listens on the discard port.
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:9/")
            .send()
            .await
            .unwrap_err();
        assert!(LlmError::from(err).is_retryable());
    }
}
