//! Playback Events
//!
//! The engine queues events as it changes state; the owner drains them with
//! `QueueEngine::drain_events` and forwards them to observers.

use crate::types::{NowPlaying, PlaybackState};
use cadence_core::ItemId;
use serde::{Deserialize, Serialize};

/// Events emitted by the queue engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Playback state changed
    StateChanged { state: PlaybackState },

    /// The currently playing slot changed (`None` when nothing plays)
    NowPlayingChanged { now_playing: Option<NowPlaying> },

    /// Queue position moved without necessarily starting playback
    PositionChanged {
        /// Flattened index of the song at the position, if any
        index: Option<usize>,
    },

    /// Elapsed time reported by the live handle
    Progress { item: ItemId, elapsed_ms: u64 },

    /// A backend refined an item's metadata
    MetadataRefined { item: ItemId },

    /// A live handle failed; treated like end of media
    ItemFailed { item: ItemId, message: String },

    /// Volume changed (0.0 - 1.0)
    VolumeChanged { volume: f32 },

    /// Queue contents changed
    QueueChanged { size: usize },

    /// `next()` ran past the last song
    QueueExhausted,

    /// A command failed
    Error { message: String },
}
