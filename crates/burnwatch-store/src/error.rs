//! Error types for the usage store.

/// Errors that can occur while pricing, persisting or reading usage data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Model identifier not present in the pricing table.
    ///
    /// Recoverable: the write path substitutes the default model's rate
    /// instead of surfacing this.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// Underlying SQLite I/O failure
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    /// Negative or non-finite budget limit
    #[error("invalid budget: {0}")]
    InvalidBudget(String),

    /// A persisted row could not be decoded
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl Error {
    /// Whether the caller can keep going (retry on the next tick, or
    /// continue with a fallback) rather than abort.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownModel(_) | Self::StoreUnavailable(_))
    }
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
