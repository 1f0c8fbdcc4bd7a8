//! Telegram error types

use std::time::Duration;
use thiserror::Error;

/// Failed Bot API call, classified for retry decisions
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct TelegramError {
    pub kind: TelegramErrorKind,
    pub message: String,
    /// Flood-control wait requested by the server
    pub retry_after: Option<Duration>,
}

impl TelegramError {
    pub fn new(kind: TelegramErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Build from a `{"ok": false, ...}` reply
    pub fn from_api(error_code: u16, description: &str, retry_after: Option<u64>) -> Self {
        Self {
            kind: TelegramErrorKind::from_error_code(error_code),
            message: format!("{error_code} {description}"),
            retry_after: retry_after.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramErrorKind {
    /// Timeout, refused connection, unreadable body
    Network,
    /// 429 flood control
    RateLimit,
    ServerError,
    /// Bad token, or the user blocked the bot
    Auth,
    /// Missing chat or message, malformed markup
    BadRequest,
    Unknown,
}

impl TelegramErrorKind {
    pub fn from_error_code(code: u16) -> Self {
        match code {
            401 | 403 => Self::Auth,
            429 => Self::RateLimit,
            400 | 404 => Self::BadRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::ServerError)
    }
}
