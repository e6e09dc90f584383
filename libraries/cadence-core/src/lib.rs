//! Cadence Core
//!
//! Platform-agnostic library model for the Cadence player.
//!
//! This crate provides:
//! - **Audio items**: `AudioItem` with a stable id, a `Locator` and metadata that
//!   backends may refine later
//! - **Playlists**: `PlaylistRef`, an ordered and nestable collection of songs and
//!   shared sub-playlists with cycle rejection
//! - **Media library**: `MediaLibrary`, the registry that owns items and playlists
//! - **Error handling**: `CoreError` and the `Result` alias
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{AddMode, ItemBuilder, Locator, PlaylistRef};
//!
//! let song = ItemBuilder::new(Locator::parse("file:///music/intro.flac").unwrap())
//!     .artist("Someone")
//!     .build_shared();
//!
//! let album = PlaylistRef::new("Album");
//! album.push_song(song.clone());
//!
//! let queue = PlaylistRef::new("Queue");
//! queue.push_playlist(&album, AddMode::Reference).unwrap();
//!
//! assert_eq!(queue.size(), 1);
//! assert_eq!(queue.get_song(0).unwrap().title(), "intro");
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod library;
pub mod types;

pub use error::{CoreError, Result};
pub use library::{ItemResolver, MediaLibrary};
pub use types::{
    AddMode, AudioItem, Entry, EntryId, EntryKind, ItemBuilder, ItemId, ItemMetadata, Locator,
    MetadataUpdate, PlaylistId, PlaylistRef, SharedItem,
};
