//! Error types for playback

use cadence_core::{CoreError, ItemId};
use std::time::Duration;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Error from the library model (out of range, cycles, ...)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// No registered backend accepts the locator
    #[error("No backend can handle {locator}")]
    Unsupported { locator: String },

    /// A backend failed to construct or drive a handle
    #[error("Backend failed for item {item}: {message}")]
    BackendFailure { item: ItemId, message: String },

    /// Handle construction did not finish in time
    #[error("Decoder for item {item} not ready after {timeout:?}")]
    AcquireTimeout { item: ItemId, timeout: Duration },

    /// Operation needs a current item
    #[error("No active item")]
    NoActiveItem,

    /// The player service thread is gone
    #[error("Player service stopped")]
    ServiceStopped,

    /// Item id not known to the resolver
    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    /// Create a backend failure error
    pub fn backend_failure(item: &ItemId, message: impl Into<String>) -> Self {
        Self::BackendFailure {
            item: item.clone(),
            message: message.into(),
        }
    }

    /// Whether the engine can keep going after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Core(CoreError::Corrupted(_)))
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
