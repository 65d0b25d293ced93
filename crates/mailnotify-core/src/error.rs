//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Mailbox not found.
    #[error("Mailbox not found: {0}")]
    MailboxNotFound(String),

    /// Invalid configuration, such as a zero debounce window.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The notification presenter rejected a request.
    #[error("Notification error: {0}")]
    Notification(String),

    /// The background worker is no longer accepting jobs.
    #[error("Refresh worker has stopped")]
    WorkerStopped,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
