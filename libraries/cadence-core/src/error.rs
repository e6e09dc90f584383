/// Core error types for Cadence
use crate::types::EntryId;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the library model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Index outside the valid bounds of a playlist
    #[error("Index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    /// A playlist would end up containing itself
    #[error("Adding playlist '{child}' to '{parent}' would create a cycle")]
    CycleDetected { parent: String, child: String },

    /// Entry is not a member of the playlist
    #[error("Entry {0} is not in this playlist")]
    UnknownEntry(EntryId),

    /// Locator could not be parsed
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    /// A playlist with the same name is already registered
    #[error("Duplicate playlist: {0}")]
    DuplicatePlaylist(String),

    /// Internal bookkeeping no longer matches the stored entries
    #[error("Playlist structure corrupted: {0}")]
    Corrupted(String),
}

impl CoreError {
    /// Create an out of range error
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::OutOfRange { index, len }
    }

    /// Create an invalid locator error
    pub fn invalid_locator(msg: impl Into<String>) -> Self {
        Self::InvalidLocator(msg.into())
    }
}
