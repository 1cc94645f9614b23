//! GuardChat error types
//!
//! Supervisor failures abort the current command; per-turn chat failures
//! (guardrail rejections, transport errors) are carried in the driver's
//! `SendOutcome` instead, so callers handle every outcome explicitly.

use thiserror::Error;

/// GuardChat error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (detected before any process is spawned)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Proxy process could not be started
    #[error("Launch failure: {0}")]
    Launch(String),

    /// Proxy never confirmed readiness on its health endpoint
    #[error("Proxy did not become ready within {waited_secs}s")]
    StartupTimeout {
        /// Seconds spent polling before giving up
        waited_secs: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for GuardChat operations
pub type Result<T> = std::result::Result<T, Error>;
