//! Error types for the query controller and its collaborators.

use sentinel_core::error::SentinelError;

/// HTTP status the generation service uses for rate limiting.
const TOO_MANY_REQUESTS: u16 = 429;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The generation service answered with a non-success status.
    #[error("API error {}: {message}", fmt_status(.status))]
    Api {
        status: Option<u16>,
        message: String,
    },
    /// The request could not be sent or the connection failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// A streamed fragment could not be decoded.
    #[error("stream error: {0}")]
    Stream(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Whether this failure is the service throttling us.
    ///
    /// Prefers the structured status code. Falls back to matching the
    /// error text for `"429"` or (case-insensitively) `"quota"`, which is
    /// how providers without a status code report it.
    pub fn is_rate_limited(&self) -> bool {
        if let ChatError::Api {
            status: Some(TOO_MANY_REQUESTS),
            ..
        } = self
        {
            return true;
        }
        let text = self.to_string();
        text.contains("429") || text.to_lowercase().contains("quota")
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "?".to_string(), |s| s.to_string())
}

impl From<SentinelError> for ChatError {
    fn from(err: SentinelError) -> Self {
        match err {
            SentinelError::Validation(msg) => ChatError::Validation(msg),
            SentinelError::Config(msg) => ChatError::Config(msg),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::Api {
            status: Some(503),
            message: "UNAVAILABLE: overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API error 503: UNAVAILABLE: overloaded");

        let err = ChatError::Api {
            status: None,
            message: "no status".to_string(),
        };
        assert_eq!(err.to_string(), "API error ?: no status");

        let err = ChatError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "transport error: connection refused");

        let err = ChatError::Stream("bad json".to_string());
        assert_eq!(err.to_string(), "stream error: bad json");
    }

    #[test]
    fn test_structured_429_is_rate_limited() {
        let err = ChatError::Api {
            status: Some(429),
            message: "RESOURCE_EXHAUSTED: slow down".to_string(),
        };
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_429_in_text_is_rate_limited() {
        let err = ChatError::Transport("Error: 429 Too Many Requests".to_string());
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_quota_is_case_insensitive() {
        let err = ChatError::Stream("Quota Exceeded".to_string());
        assert!(err.is_rate_limited());
        let err = ChatError::Stream("QUOTA exhausted for project".to_string());
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_other_errors_are_not_rate_limited() {
        let err = ChatError::Api {
            status: Some(500),
            message: "INTERNAL: boom".to_string(),
        };
        assert!(!err.is_rate_limited());
        assert!(!ChatError::Transport("timed out".to_string()).is_rate_limited());
    }

    #[test]
    fn test_from_sentinel_error() {
        let err: ChatError = SentinelError::Validation("name is required".to_string()).into();
        assert!(matches!(err, ChatError::Validation(_)));

        let err: ChatError = SentinelError::Storage("disk full".to_string()).into();
        assert!(matches!(err, ChatError::Storage(_)));
        assert!(err.to_string().contains("disk full"));

        let err: ChatError = SentinelError::Config("bad".to_string()).into();
        assert!(matches!(err, ChatError::Config(_)));
    }
}
