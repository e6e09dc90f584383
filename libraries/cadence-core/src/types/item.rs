//! Audio items and their metadata
//!
//! An `AudioItem` is shared (`Arc`) between the library, every playlist that
//! contains it and the playback queue. Metadata lives behind a lock so a backend
//! refining the duration or title is seen everywhere at once.

use super::{ItemId, Locator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Shared handle to an audio item
pub type SharedItem = Arc<AudioItem>;

/// Descriptive, mutable fields of an audio item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub album_artist: String,
    pub track_number: Option<u32>,
    pub track_count: Option<u32>,
    pub year: Option<String>,

    /// Unknown until a backend or the importer reports it
    pub duration: Option<Duration>,
}

/// Partial metadata refinement
///
/// Only fields set to `Some` are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub album_artist: Option<String>,
    pub track_number: Option<u32>,
    pub track_count: Option<u32>,
    pub year: Option<String>,
    pub duration: Option<Duration>,
}

impl MetadataUpdate {
    /// Update carrying only a duration
    pub fn duration(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }

    /// Update carrying only a title
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// True if no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to `metadata`, returning whether anything changed
    pub fn apply_to(&self, metadata: &mut ItemMetadata) -> bool {
        let mut changed = false;
        changed |= set_if_changed(&mut metadata.title, &self.title);
        changed |= set_if_changed(&mut metadata.artist, &self.artist);
        changed |= set_if_changed(&mut metadata.album, &self.album);
        changed |= set_if_changed(&mut metadata.genre, &self.genre);
        changed |= set_if_changed(&mut metadata.album_artist, &self.album_artist);
        changed |= set_option_if_changed(&mut metadata.track_number, &self.track_number);
        changed |= set_option_if_changed(&mut metadata.track_count, &self.track_count);
        changed |= set_option_if_changed(&mut metadata.year, &self.year);
        changed |= set_option_if_changed(&mut metadata.duration, &self.duration);
        changed
    }
}

fn set_if_changed<T: PartialEq + Clone>(field: &mut T, value: &Option<T>) -> bool {
    match value {
        Some(v) if field != v => {
            *field = v.clone();
            true
        }
        _ => false,
    }
}

fn set_option_if_changed<T: PartialEq + Clone>(field: &mut Option<T>, value: &Option<T>) -> bool {
    match value {
        Some(v) if field.as_ref() != Some(v) => {
            *field = Some(v.clone());
            true
        }
        _ => false,
    }
}

/// A playable unit: identity, locator and metadata
#[derive(Debug)]
pub struct AudioItem {
    id: ItemId,
    locator: Locator,
    date_added: DateTime<Utc>,
    metadata: RwLock<ItemMetadata>,
}

impl AudioItem {
    /// Unique identifier
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    /// Resource reference handed to backends
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// When the item entered the library
    pub fn date_added(&self) -> DateTime<Utc> {
        self.date_added
    }

    /// Snapshot of the current metadata
    pub fn metadata(&self) -> ItemMetadata {
        self.metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current title
    pub fn title(&self) -> String {
        self.metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .title
            .clone()
    }

    /// Duration if already known
    pub fn duration(&self) -> Option<Duration> {
        self.metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .duration
    }

    /// Apply a refinement, returning whether anything changed
    pub fn refine(&self, update: &MetadataUpdate) -> bool {
        let mut metadata = self.metadata.write().unwrap_or_else(PoisonError::into_inner);
        update.apply_to(&mut metadata)
    }
}

/// Builder for `AudioItem`
///
/// Defaults: the title is the file stem of the locator (or "Unknown"), artist
/// and album are "Unknown", everything else is empty.
#[derive(Debug, Clone)]
pub struct ItemBuilder {
    id: Option<ItemId>,
    locator: Locator,
    date_added: Option<DateTime<Utc>>,
    metadata: ItemMetadata,
}

impl ItemBuilder {
    pub fn new(locator: Locator) -> Self {
        let title = locator
            .file_stem()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        Self {
            id: None,
            locator,
            date_added: None,
            metadata: ItemMetadata {
                title,
                artist: "Unknown".to_string(),
                album: "Unknown".to_string(),
                genre: String::new(),
                album_artist: String::new(),
                track_number: None,
                track_count: None,
                year: None,
                duration: None,
            },
        }
    }

    /// Reuse a known id (e.g. when restoring a library)
    pub fn id(mut self, id: ItemId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn date_added(mut self, date_added: DateTime<Utc>) -> Self {
        self.date_added = Some(date_added);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = title.into();
        self
    }

    pub fn artist(mut self, artist: impl Into<String>) -> Self {
        self.metadata.artist = artist.into();
        self
    }

    pub fn album(mut self, album: impl Into<String>) -> Self {
        self.metadata.album = album.into();
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.metadata.genre = genre.into();
        self
    }

    pub fn album_artist(mut self, album_artist: impl Into<String>) -> Self {
        self.metadata.album_artist = album_artist.into();
        self
    }

    pub fn track_number(mut self, track_number: u32) -> Self {
        self.metadata.track_number = Some(track_number);
        self
    }

    pub fn track_count(mut self, track_count: u32) -> Self {
        self.metadata.track_count = Some(track_count);
        self
    }

    pub fn year(mut self, year: impl Into<String>) -> Self {
        self.metadata.year = Some(year.into());
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.metadata.duration = Some(duration);
        self
    }

    pub fn build(self) -> AudioItem {
        AudioItem {
            id: self.id.unwrap_or_else(ItemId::generate),
            locator: self.locator,
            date_added: self.date_added.unwrap_or_else(Utc::now),
            metadata: RwLock::new(self.metadata),
        }
    }

    pub fn build_shared(self) -> SharedItem {
        Arc::new(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(s: &str) -> Locator {
        Locator::parse(s).unwrap()
    }

    #[test]
    fn builder_defaults_follow_locator() {
        let item = ItemBuilder::new(locator("file:///music/Track%2001.mp3")).build();
        let metadata = item.metadata();
        assert_eq!(metadata.title, "Track 01");
        assert_eq!(metadata.artist, "Unknown");
        assert_eq!(metadata.album, "Unknown");
        assert_eq!(metadata.duration, None);
        assert_eq!(metadata.track_number, None);
    }

    #[test]
    fn builder_overrides() {
        let id = ItemId::new("fixed");
        let item = ItemBuilder::new(locator("https://example.com/"))
            .id(id.clone())
            .title("Live")
            .artist("Band")
            .track_number(3)
            .duration(Duration::from_secs(90))
            .build();
        assert_eq!(item.id(), &id);
        assert_eq!(item.title(), "Live");
        assert_eq!(item.duration(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn stream_without_path_is_unknown() {
        let item = ItemBuilder::new(locator("https://example.com/")).build();
        assert_eq!(item.title(), "Unknown");
    }

    #[test]
    fn refinement_is_visible_through_every_clone() {
        let item = ItemBuilder::new(locator("file:///a.ogg")).build_shared();
        let other = Arc::clone(&item);

        assert!(item.refine(&MetadataUpdate::duration(Duration::from_secs(200))));
        assert_eq!(other.duration(), Some(Duration::from_secs(200)));

        // Same value again is not a change
        assert!(!item.refine(&MetadataUpdate::duration(Duration::from_secs(200))));
        assert!(!item.refine(&MetadataUpdate::default()));
    }

    #[test]
    fn update_only_touches_set_fields() {
        let item = ItemBuilder::new(locator("file:///a.ogg")).artist("X").build();
        item.refine(&MetadataUpdate::title("New"));
        let metadata = item.metadata();
        assert_eq!(metadata.title, "New");
        assert_eq!(metadata.artist, "X");
    }
}
