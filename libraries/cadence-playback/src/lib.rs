//! Cadence - Playback
//!
//! Queue navigation and decoder management for the Cadence player.
//!
//! This crate provides:
//! - Stack-based queue engine over nested playlists (play, pause, stop, next,
//!   previous, jump)
//! - Loop modes (Off, Single, All) and shuffle
//! - Priority-ordered decoder backend registry with a no-op backend
//! - Bounded pool of live decoder handles with eviction
//! - A player service thread that owns the engine and publishes events
//!
//! # Architecture
//!
//! `cadence-playback` decodes nothing itself. Backends implement
//! [`Backend`] and hand out [`DecoderHandle`]s; they report progress, end of
//! media and refined metadata through a [`DecoderEventSink`]. The engine applies
//! those notifications on its own thread, so backends never touch shared state.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{ItemBuilder, Locator};
//! use cadence_playback::{BackendRegistry, PlaybackConfig, PlaybackState, QueueEngine};
//!
//! let mut engine = QueueEngine::new(BackendRegistry::headless(), PlaybackConfig::default())?;
//! for name in ["one", "two"] {
//!     let locator = Locator::parse(&format!("file:///music/{name}.flac")).unwrap();
//!     engine.enqueue_item(ItemBuilder::new(locator).build_shared());
//! }
//!
//! engine.play()?;
//! engine.next()?;
//! assert_eq!(engine.state(), PlaybackState::Playing);
//! assert_eq!(engine.current_item().unwrap().title(), "two");
//! # Ok::<(), cadence_playback::PlaybackError>(())
//! ```

pub mod backend;
mod config;
mod engine;
mod error;
mod events;
mod pool;
mod service;
pub mod types;

// Public exports
pub use backend::{
    Backend, BackendRegistry, DecoderEvent, DecoderEventKind, DecoderEventSink, DecoderHandle,
    DecoderStatus, FnBackend, NopBackend, NopHandle,
};
pub use config::PlaybackConfig;
pub use engine::QueueEngine;
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use pool::DecoderPool;
pub use service::{PlayerCommand, PlayerHandle, PlayerService};
pub use types::{FramePosition, LoopMode, NowPlaying, PlaybackState, QueueSnapshot, SnapshotEntry};
