use thiserror::Error;

use crate::types::Resolution;

/// Failures at the market-data boundary
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("CoinEx API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Candles count for {market} ({resolution}) below minimum: {count}")]
    InsufficientData {
        market: String,
        resolution: Resolution,
        count: usize,
    },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<FeedError> },
}

/// Failures delivering an outbound notification
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Notification timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Notifier not configured: {0}")]
    NotConfigured(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<NotifyError> },
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;

/// Errors a `RetryPolicy` knows how to build and classify
pub trait Retryable: std::fmt::Display + Sized {
    fn timed_out(secs: u64) -> Self;

    fn exhausted(attempts: u32, last: Self) -> Self;

    fn is_retryable(&self) -> bool {
        true
    }
}

impl Retryable for FeedError {
    fn timed_out(secs: u64) -> Self {
        FeedError::Timeout { secs }
    }

    fn exhausted(attempts: u32, last: Self) -> Self {
        FeedError::Exhausted {
            attempts,
            last: Box::new(last),
        }
    }
}

impl Retryable for NotifyError {
    fn timed_out(secs: u64) -> Self {
        NotifyError::Timeout { secs }
    }

    fn exhausted(attempts: u32, last: Self) -> Self {
        NotifyError::Exhausted {
            attempts,
            last: Box::new(last),
        }
    }

    /// Only failures where the message was certainly not delivered. A timed
    /// out request may still have reached the chat.
    fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Rejected { .. } => true,
            NotifyError::Http(e) => e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_retry_classification() {
        let rejected = NotifyError::Rejected {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert!(rejected.is_retryable());
        assert!(!NotifyError::timed_out(10).is_retryable());
        assert!(!NotifyError::NotConfigured("token".to_string()).is_retryable());
        assert!(FeedError::timed_out(10).is_retryable());
    }
}
