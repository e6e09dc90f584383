//! Core types for playback

use cadence_core::{EntryId, ItemId, PlaylistId, SharedItem};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing is playing
    #[default]
    Stopped,

    /// Current item is playing
    Playing,

    /// Current item is paused (position retained)
    Paused,
}

/// What happens when an item or the whole queue ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Stop at the end of the queue
    #[default]
    Off,

    /// Repeat the current item
    Single,

    /// Start over from the top of the queue
    All,
}

/// The currently playing slot, as observed by the library side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub item: ItemId,
    pub entry: EntryId,
    pub title: String,
    pub artist: String,
    pub duration: Option<Duration>,
    pub state: PlaybackState,
}

impl NowPlaying {
    pub(crate) fn new(item: &SharedItem, entry: EntryId, state: PlaybackState) -> Self {
        let metadata = item.metadata();
        Self {
            item: item.id().clone(),
            entry,
            title: metadata.title,
            artist: metadata.artist,
            duration: metadata.duration,
            state,
        }
    }
}

/// One level of the traversal stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePosition {
    pub playlist: PlaylistId,
    pub index: usize,
}

/// Serializable view of the queue's direct entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub name: String,
    pub size: usize,
    pub state: PlaybackState,
    pub current: Option<EntryId>,
    pub position_index: Option<usize>,
    pub entries: Vec<SnapshotEntry>,
}

/// Direct queue entry in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SnapshotEntry {
    Song {
        entry: EntryId,
        item: ItemId,
        title: String,
        duration_ms: Option<u64>,
    },
    Playlist {
        entry: EntryId,
        playlist: PlaylistId,
        name: String,
        size: usize,
    },
}
