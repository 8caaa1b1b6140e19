//! Error types for action primitives

use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;

/// Failures surfaced by a browser primitive
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Navigation could not complete
    #[error("Navigation failed: {0}")]
    NavFailed(String),

    /// No element matched the locator within the implicit wait
    #[error("Element not found: {0}")]
    AnchorNotFound(String),

    /// CDP communication or protocol error
    #[error("CDP I/O error: {0}")]
    CdpIo(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Map an adapter failure for the element identified by `locator`.
    pub fn from_adapter(err: AdapterError, locator: &str) -> Self {
        let hint = err.hint.clone();
        let message = err.to_string();
        match err.kind {
            AdapterErrorKind::TargetNotFound => ActionError::AnchorNotFound(
                hint.unwrap_or_else(|| format!("no element matches {}", locator)),
            ),
            AdapterErrorKind::Navigation => ActionError::NavFailed(message),
            AdapterErrorKind::CdpIo => ActionError::CdpIo(message),
            AdapterErrorKind::Launch | AdapterErrorKind::Internal => ActionError::Internal(message),
        }
    }

    /// Whether the failure means the locator matched nothing
    pub fn is_not_found(&self) -> bool {
        matches!(self, ActionError::AnchorNotFound(_))
    }
}
