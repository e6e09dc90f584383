//! Media library
//!
//! Registry of every known item and named playlist. Removing an item or a
//! playlist from the library also strips it from all registered playlists.

use crate::error::{CoreError, Result};
use crate::types::{ItemId, PlaylistRef, SharedItem};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Looks up items by id
///
/// The playback service uses this to turn `EnqueueById` commands into items.
pub trait ItemResolver: Send + Sync {
    fn resolve(&self, id: &ItemId) -> Option<SharedItem>;
}

#[derive(Default)]
struct Items {
    by_id: HashMap<ItemId, SharedItem>,
    order: Vec<ItemId>,
}

/// In-memory library of items and playlists
#[derive(Default)]
pub struct MediaLibrary {
    items: RwLock<Items>,
    playlists: RwLock<Vec<PlaylistRef>>,
}

impl MediaLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item; an item with the same id is replaced
    pub fn add_item(&self, item: SharedItem) {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let id = item.id().clone();
        if items.by_id.insert(id.clone(), item).is_none() {
            items.order.push(id);
        }
    }

    pub fn item(&self, id: &ItemId) -> Option<SharedItem> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        items.by_id.get(id).cloned()
    }

    /// All items in insertion order
    pub fn items(&self) -> Vec<SharedItem> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        items
            .order
            .iter()
            .filter_map(|id| items.by_id.get(id).cloned())
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .len()
    }

    /// Remove an item from the library and from every registered playlist
    pub fn remove_item(&self, id: &ItemId) -> Option<SharedItem> {
        let removed = {
            let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
            let removed = items.by_id.remove(id)?;
            items.order.retain(|other| other != id);
            removed
        };

        let stripped: usize = self.playlists().iter().map(|p| p.remove_item(id)).sum();
        tracing::debug!(item = %id, entries = stripped, "removed item from library");
        Some(removed)
    }

    /// Register a playlist; names are unique ignoring case
    pub fn add_playlist(&self, playlist: PlaylistRef) -> Result<()> {
        let name = playlist.name();
        let mut playlists = self.playlists.write().unwrap_or_else(PoisonError::into_inner);
        if playlists
            .iter()
            .any(|p| p == &playlist || p.name().eq_ignore_ascii_case(&name))
        {
            return Err(CoreError::DuplicatePlaylist(name));
        }
        playlists.push(playlist);
        Ok(())
    }

    /// Look up a playlist by name, ignoring case
    pub fn playlist(&self, name: &str) -> Option<PlaylistRef> {
        self.playlists
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn playlists(&self) -> Vec<PlaylistRef> {
        self.playlists
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Unregister a playlist and strip references to it from the others
    pub fn remove_playlist(&self, playlist: &PlaylistRef) -> bool {
        let remaining = {
            let mut playlists = self.playlists.write().unwrap_or_else(PoisonError::into_inner);
            let before = playlists.len();
            playlists.retain(|p| p != playlist);
            if playlists.len() == before {
                return false;
            }
            playlists.clone()
        };

        for other in &remaining {
            other.remove_playlist_refs(playlist.id());
        }
        true
    }

    /// Wrap in an `Arc` for use as a resolver
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl ItemResolver for MediaLibrary {
    fn resolve(&self, id: &ItemId) -> Option<SharedItem> {
        self.item(id)
    }
}
