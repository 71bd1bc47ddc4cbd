//! A fake provider error type and its not-found classifier.

use std::error::Error;
use tabsync_engine::BoxError;
use thiserror::Error;

/// Errors a fake provider API returns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The resource disappeared.
    #[error("resource not found: {0}")]
    NotFound(String),
    /// The request was rate limited.
    #[error("rate exceeded")]
    Throttled,
    /// The caller lacks permission.
    #[error("access denied: {0}")]
    AccessDenied(String),
}

impl ProviderError {
    /// Boxes the error for collaborator return types.
    pub fn boxed(self) -> BoxError {
        Box::new(self)
    }
}

/// Classifies [`ProviderError::NotFound`] as a not-found race.
pub fn provider_not_found(err: &(dyn Error + Send + Sync + 'static)) -> bool {
    matches!(err.downcast_ref::<ProviderError>(), Some(ProviderError::NotFound(_)))
}
