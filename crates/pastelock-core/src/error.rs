#![forbid(unsafe_code)]

//! Error types.
//!
//! None of these reach the user. Runtime paths log them and fall back to a
//! no-op; only configuration loading returns them to the caller.

use thiserror::Error;

/// Failure reported by a [`DomHost`](crate::DomHost) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The element is no longer attached to the document.
    #[error("element is detached from the document")]
    Detached,
    /// The page rejected an inline style write.
    #[error("style write rejected: {0}")]
    StyleWrite(String),
    /// A browser global the host needs is missing.
    #[error("host unavailable: {0}")]
    Unavailable(&'static str),
    /// Registering a listener, observer, or timer failed.
    #[error("host registration failed: {0}")]
    Registration(String),
}

/// Failure while loading a [`PasteLockConfig`](crate::PasteLockConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document was not valid JSON for the config schema.
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    /// The document parsed but a value is out of range.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
