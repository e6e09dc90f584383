//! Nestable playlists
//!
//! A playlist is an ordered sequence of entries. Each entry is either a song
//! (a shared `AudioItem`) or a reference to another playlist. Playlists are
//! shared by reference, so the overall structure is a DAG; an insertion that
//! would make a playlist contain itself is rejected.
//!
//! ```text
//! Queue
//! ├── song A
//! ├── Album X ──┐  (shared, edits to X are visible here)
//! │   ├── song B
//! │   └── Y (empty)
//! └── song C
//! ```
//!
//! Entries are addressed by position or by their stable `EntryId`; neighbours
//! are derived from position so there are no links to keep in sync.

use super::{EntryId, ItemId, PlaylistId, SharedItem};
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// How a playlist is inserted into another playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddMode {
    /// Store a shared entry; later edits of the added playlist show through
    #[default]
    Reference,

    /// Copy the direct entries (nested playlists stay shared references)
    Contents,

    /// Copy only the songs reachable from the added playlist
    Flattened,
}

/// Payload of a playlist entry
#[derive(Clone)]
pub enum EntryKind {
    Song(SharedItem),
    Playlist(PlaylistRef),
}

impl fmt::Debug for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Song(item) => f.debug_tuple("Song").field(item.id()).finish(),
            EntryKind::Playlist(playlist) => f.debug_tuple("Playlist").field(playlist.id()).finish(),
        }
    }
}

/// A node in exactly one playlist's sequence
#[derive(Debug, Clone)]
pub struct Entry {
    id: EntryId,
    kind: EntryKind,
}

impl Entry {
    fn new(kind: EntryKind) -> Self {
        Self {
            id: EntryId::next(),
            kind,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    pub fn is_song(&self) -> bool {
        matches!(self.kind, EntryKind::Song(_))
    }

    pub fn as_song(&self) -> Option<&SharedItem> {
        match &self.kind {
            EntryKind::Song(item) => Some(item),
            EntryKind::Playlist(_) => None,
        }
    }

    pub fn as_playlist(&self) -> Option<&PlaylistRef> {
        match &self.kind {
            EntryKind::Song(_) => None,
            EntryKind::Playlist(playlist) => Some(playlist),
        }
    }
}

struct Playlist {
    name: String,
    entries: Vec<Entry>,
    direct_songs: usize,
    dirty: bool,
}

impl Playlist {
    fn nested(&self) -> impl Iterator<Item = &PlaylistRef> {
        self.entries.iter().filter_map(Entry::as_playlist)
    }

    fn touch(&mut self) {
        self.dirty = true;
    }
}

/// Shared handle to a playlist
///
/// Cloning the handle does not copy the playlist. The id lives outside the lock
/// so identity checks never contend with writers.
#[derive(Clone)]
pub struct PlaylistRef {
    id: PlaylistId,
    inner: Arc<RwLock<Playlist>>,
}

impl PartialEq for PlaylistRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PlaylistRef {}

impl fmt::Debug for PlaylistRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaylistRef").field("id", &self.id).finish()
    }
}

impl PlaylistRef {
    /// Create a new, empty playlist
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PlaylistId::generate(),
            inner: Arc::new(RwLock::new(Playlist {
                name: name.into(),
                entries: Vec::new(),
                direct_songs: 0,
                dirty: true,
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Playlist> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Playlist> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Identity =====

    pub fn id(&self) -> &PlaylistId {
        &self.id
    }

    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let mut playlist = self.write();
        playlist.name = name.into();
        playlist.touch();
    }

    /// Whether the playlist changed since the last `mark_clean`
    pub fn is_dirty(&self) -> bool {
        self.read().dirty
    }

    pub fn mark_clean(&self) {
        self.write().dirty = false;
    }

    // ===== Size queries =====

    /// Number of songs reachable from this playlist
    ///
    /// A playlist referenced twice is counted twice, matching the flattened order.
    pub fn size(&self) -> usize {
        let mut total = 0;
        let mut pending = vec![self.clone()];
        while let Some(playlist) = pending.pop() {
            let guard = playlist.read();
            total += guard.direct_songs;
            pending.extend(guard.nested().cloned());
        }
        total
    }

    /// Number of direct entries (songs and playlists)
    pub fn entry_count(&self) -> usize {
        self.read().entries.len()
    }

    /// True if there are no direct entries at all
    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    /// True iff every direct entry is itself a recursively empty playlist
    pub fn is_recursively_empty(&self) -> bool {
        let mut pending = vec![self.clone()];
        while let Some(playlist) = pending.pop() {
            let guard = playlist.read();
            if guard.direct_songs > 0 {
                return false;
            }
            pending.extend(guard.nested().cloned());
        }
        true
    }

    /// Sum of all reachable song durations; unknown durations count as zero
    pub fn total_duration(&self) -> Duration {
        let mut total = Duration::ZERO;
        let mut pending = vec![self.clone()];
        while let Some(playlist) = pending.pop() {
            let guard = playlist.read();
            for entry in &guard.entries {
                match &entry.kind {
                    EntryKind::Song(item) => total += item.duration().unwrap_or_default(),
                    EntryKind::Playlist(nested) => pending.push(nested.clone()),
                }
            }
        }
        total
    }

    // ===== Access =====

    /// The `index`-th direct entry
    pub fn get_entry(&self, index: usize) -> Result<Entry> {
        let playlist = self.read();
        playlist
            .entries
            .get(index)
            .cloned()
            .ok_or_else(|| CoreError::out_of_range(index, playlist.entries.len()))
    }

    /// Snapshot of the direct entries
    pub fn entries(&self) -> Vec<Entry> {
        self.read().entries.clone()
    }

    /// Position of an entry among the direct entries
    pub fn index_of(&self, entry: EntryId) -> Option<usize> {
        self.read().entries.iter().position(|e| e.id == entry)
    }

    /// Previous and next sibling of a member entry
    pub fn neighbors(&self, entry: EntryId) -> Option<(Option<Entry>, Option<Entry>)> {
        let playlist = self.read();
        let index = playlist.entries.iter().position(|e| e.id == entry)?;
        let prev = index
            .checked_sub(1)
            .and_then(|i| playlist.entries.get(i))
            .cloned();
        let next = playlist.entries.get(index + 1).cloned();
        Some((prev, next))
    }

    /// The `index`-th song in flattened (depth-first) order
    pub fn get_song(&self, index: usize) -> Result<SharedItem> {
        let size = self.size();
        if index >= size {
            return Err(CoreError::out_of_range(index, size));
        }

        let mut current = self.clone();
        let mut remaining = index;
        loop {
            let descend = {
                let guard = current.read();
                let mut descend = None;
                for entry in &guard.entries {
                    match &entry.kind {
                        EntryKind::Song(item) => {
                            if remaining == 0 {
                                return Ok(Arc::clone(item));
                            }
                            remaining -= 1;
                        }
                        EntryKind::Playlist(nested) => {
                            let nested_size = nested.size();
                            if remaining < nested_size {
                                descend = Some(nested.clone());
                                break;
                            }
                            remaining -= nested_size;
                        }
                    }
                }
                descend
            };

            match descend {
                Some(nested) => current = nested,
                None => {
                    tracing::error!(
                        playlist = %self.id,
                        index,
                        "song count does not match playlist contents"
                    );
                    return Err(CoreError::Corrupted(format!(
                        "song {index} of {size} not found in playlist {}",
                        self.id
                    )));
                }
            }
        }
    }

    /// All reachable songs in flattened order
    pub fn songs(&self) -> Vec<SharedItem> {
        let mut songs = Vec::new();
        let mut stack = vec![(self.entries(), 0usize)];
        while let Some((entries, pos)) = stack.last_mut() {
            let Some(entry) = entries.get(*pos).cloned() else {
                stack.pop();
                continue;
            };
            *pos += 1;
            match entry.kind {
                EntryKind::Song(item) => songs.push(item),
                EntryKind::Playlist(nested) => stack.push((nested.entries(), 0)),
            }
        }
        songs
    }

    /// Whether `item` is reachable from this playlist
    pub fn contains_item(&self, item: &ItemId) -> bool {
        let mut pending = vec![self.clone()];
        while let Some(playlist) = pending.pop() {
            let guard = playlist.read();
            for entry in &guard.entries {
                match &entry.kind {
                    EntryKind::Song(song) if song.id() == item => return true,
                    EntryKind::Song(_) => {}
                    EntryKind::Playlist(nested) => pending.push(nested.clone()),
                }
            }
        }
        false
    }

    /// Whether the playlist `target` is reachable from this playlist
    ///
    /// `target` itself is never locked, which keeps the check safe to run while
    /// the caller is about to write to it.
    pub fn contains_playlist(&self, target: &PlaylistId) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![self.clone()];
        while let Some(playlist) = pending.pop() {
            if !visited.insert(playlist.id.clone()) {
                continue;
            }
            let guard = playlist.read();
            for nested in guard.nested() {
                if &nested.id == target {
                    return true;
                }
                pending.push(nested.clone());
            }
        }
        false
    }

    fn would_cycle(&self, child: &PlaylistRef) -> bool {
        child.id == self.id || child.contains_playlist(&self.id)
    }

    // ===== Mutation =====

    /// Insert a song at a direct index
    pub fn add_song(&self, index: usize, item: SharedItem) -> Result<EntryId> {
        let mut playlist = self.write();
        if index > playlist.entries.len() {
            return Err(CoreError::out_of_range(index, playlist.entries.len()));
        }
        let entry = Entry::new(EntryKind::Song(item));
        let id = entry.id;
        playlist.entries.insert(index, entry);
        playlist.direct_songs += 1;
        playlist.touch();
        Ok(id)
    }

    /// Append a song
    pub fn push_song(&self, item: SharedItem) -> EntryId {
        let mut playlist = self.write();
        let entry = Entry::new(EntryKind::Song(item));
        let id = entry.id;
        playlist.entries.push(entry);
        playlist.direct_songs += 1;
        playlist.touch();
        id
    }

    /// Insert another playlist at a direct index
    ///
    /// Returns the ids of the entries created (one for `Reference`, one per copied
    /// entry otherwise). On error nothing is modified.
    pub fn add_playlist(&self, index: usize, child: &PlaylistRef, mode: AddMode) -> Result<Vec<EntryId>> {
        let len = self.entry_count();
        if index > len {
            return Err(CoreError::out_of_range(index, len));
        }

        let new_entries: Vec<Entry> = match mode {
            AddMode::Reference => {
                self.check_cycle(child)?;
                vec![Entry::new(EntryKind::Playlist(child.clone()))]
            }
            AddMode::Contents => {
                let snapshot = child.entries();
                for nested in snapshot.iter().filter_map(Entry::as_playlist) {
                    self.check_cycle(nested)?;
                }
                snapshot
                    .into_iter()
                    .map(|entry| Entry::new(entry.kind))
                    .collect()
            }
            AddMode::Flattened => child
                .songs()
                .into_iter()
                .map(|item| Entry::new(EntryKind::Song(item)))
                .collect(),
        };

        let ids: Vec<EntryId> = new_entries.iter().map(Entry::id).collect();
        let songs = new_entries.iter().filter(|e| e.is_song()).count();

        let mut playlist = self.write();
        if index > playlist.entries.len() {
            return Err(CoreError::out_of_range(index, playlist.entries.len()));
        }
        playlist.entries.splice(index..index, new_entries);
        playlist.direct_songs += songs;
        playlist.touch();
        Ok(ids)
    }

    /// Append another playlist
    pub fn push_playlist(&self, child: &PlaylistRef, mode: AddMode) -> Result<Vec<EntryId>> {
        self.add_playlist(self.entry_count(), child, mode)
    }

    fn check_cycle(&self, child: &PlaylistRef) -> Result<()> {
        if self.would_cycle(child) {
            return Err(CoreError::CycleDetected {
                parent: self.name(),
                child: child.name(),
            });
        }
        Ok(())
    }

    /// Remove a direct entry; `None` if it is not a member
    pub fn remove_entry(&self, entry: EntryId) -> Option<Entry> {
        let mut playlist = self.write();
        let index = playlist.entries.iter().position(|e| e.id == entry)?;
        let removed = playlist.entries.remove(index);
        if removed.is_song() {
            playlist.direct_songs -= 1;
        }
        playlist.touch();
        Some(removed)
    }

    /// Remove every direct song entry of `item`, returning how many were removed
    pub fn remove_item(&self, item: &ItemId) -> usize {
        let mut playlist = self.write();
        let before = playlist.entries.len();
        playlist
            .entries
            .retain(|e| !e.as_song().is_some_and(|song| song.id() == item));
        let removed = before - playlist.entries.len();
        if removed > 0 {
            playlist.direct_songs -= removed;
            playlist.touch();
        }
        removed
    }

    /// Remove every direct reference to the playlist `target`
    pub fn remove_playlist_refs(&self, target: &PlaylistId) -> usize {
        let mut playlist = self.write();
        let before = playlist.entries.len();
        playlist
            .entries
            .retain(|e| !e.as_playlist().is_some_and(|p| &p.id == target));
        let removed = before - playlist.entries.len();
        if removed > 0 {
            playlist.touch();
        }
        removed
    }

    /// Move `entries` (in the given order) so they start at `index`
    ///
    /// `index` is interpreted against the playlist before the move. Returns the
    /// position of the first moved entry afterwards.
    pub fn move_entries(&self, index: usize, entries: &[EntryId]) -> Result<usize> {
        let mut playlist = self.write();
        if index > playlist.entries.len() {
            return Err(CoreError::out_of_range(index, playlist.entries.len()));
        }

        let mut unique: Vec<EntryId> = Vec::with_capacity(entries.len());
        for id in entries {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        if unique.is_empty() {
            return Ok(index);
        }

        let mut moved = Vec::with_capacity(unique.len());
        let mut before_index = 0;
        for id in &unique {
            let pos = playlist
                .entries
                .iter()
                .position(|e| e.id == *id)
                .ok_or(CoreError::UnknownEntry(*id))?;
            if pos < index {
                before_index += 1;
            }
            moved.push(playlist.entries[pos].clone());
        }

        playlist.entries.retain(|e| !unique.contains(&e.id));
        let target = index - before_index;
        playlist.entries.splice(target..target, moved);
        playlist.touch();
        Ok(target)
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut playlist = self.write();
        playlist.entries.clear();
        playlist.direct_songs = 0;
        playlist.touch();
    }
}
