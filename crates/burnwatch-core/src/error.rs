//! Error types for the monitoring core.

/// Errors raised while configuring or evaluating the monitor.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failure in the usage store
    #[error(transparent)]
    Store(#[from] burnwatch_store::Error),

    /// Negative or non-finite budget limit
    #[error("invalid budget: {0}")]
    InvalidBudget(String),

    /// Configuration that cannot be used as-is
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether the monitor loop should log and retry on the next tick.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_recoverable(),
            Self::InvalidBudget(_) | Self::InvalidConfig(_) => false,
        }
    }
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
