//! Harness error types. Each aborts the current scenario only.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("harness io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {seconds}s waiting for {what}")]
    ChannelTimeout { what: String, seconds: u64 },

    #[error("client exited before {what} appeared")]
    ClientExited { what: String },

    #[error("expected exactly one call to {method}, saw {count}")]
    UnexpectedCallCount { method: String, count: usize },

    #[error("notification mismatch:\n{0}")]
    Mismatch(String),
}
