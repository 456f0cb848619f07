//! Error types for the sync layer.
//!
//! Library code returns [`SyncError`]; the bot binary wraps it in
//! `anyhow::Error` at the edge.

use thiserror::Error;

/// Why a nickname was rejected.  The `Display` text is shown to the player
/// as-is, so keep it short.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NicknameError {
    #[error("Nickname cannot be empty")]
    Empty,
    #[error("Nickname must be at most {max} characters")]
    TooLong { max: usize },
    #[error("Nickname cannot contain spaces")]
    ContainsWhitespace,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Nickname(#[from] NicknameError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
