//! Decoder backend contract
//!
//! A `Backend` turns an audio item into a `DecoderHandle`. Handles are driven
//! only by the thread that owns the queue engine; anything a backend wants to
//! report (status, progress, end of media, refined metadata, failures) goes
//! through its `DecoderEventSink` and is applied by that same thread.

mod nop;
mod registry;

pub use nop::{NopBackend, NopHandle};
pub use registry::{BackendRegistry, FnBackend, FALLBACK_PRIORITY};

use crate::error::Result;
use cadence_core::{ItemId, Locator, MetadataUpdate, SharedItem};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle status reported by a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecoderStatus {
    #[default]
    Unknown,
    Ready,
    Playing,
    Paused,
    Stopped,
    Halted,
    Disposed,
}

/// A live, item-specific decoder resource
pub trait DecoderHandle: Send {
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Elapsed playback time
    fn position(&self) -> Duration;

    /// Volume in `0.0..=1.0`
    fn set_volume(&mut self, volume: f32);

    fn status(&self) -> DecoderStatus;

    /// Release backend resources; the handle is not used afterwards
    fn dispose(&mut self) {}
}

/// Decoder implementation for some set of locators
pub trait Backend: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Whether this backend can decode the locator
    fn can_handle(&self, locator: &Locator) -> bool;

    /// Construct a handle for the item
    ///
    /// May be slow; the pool runs it on a helper thread when an acquire
    /// timeout is configured.
    fn construct(&self, item: &SharedItem, events: DecoderEventSink)
        -> Result<Box<dyn DecoderHandle>>;
}

/// Notification published by a backend
///
/// `generation` is the activation count of the handle when the event was
/// sent; the engine ignores events left over from an earlier activation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderEvent {
    pub item: ItemId,
    pub generation: u64,
    pub kind: DecoderEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecoderEventKind {
    StatusChanged(DecoderStatus),
    TimeUpdate(Duration),
    EndOfMedia,
    Metadata(MetadataUpdate),
    Failure(String),
}

/// Per-item sender handed to a backend at construction
#[derive(Debug, Clone)]
pub struct DecoderEventSink {
    item: ItemId,
    generation: Arc<AtomicU64>,
    tx: Sender<DecoderEvent>,
}

impl DecoderEventSink {
    pub fn new(item: ItemId, tx: Sender<DecoderEvent>) -> Self {
        Self::with_generation(item, Arc::new(AtomicU64::new(0)), tx)
    }

    /// Sink whose events carry the current value of `generation`
    pub(crate) fn with_generation(
        item: ItemId,
        generation: Arc<AtomicU64>,
        tx: Sender<DecoderEvent>,
    ) -> Self {
        Self {
            item,
            generation,
            tx,
        }
    }

    pub fn item(&self) -> &ItemId {
        &self.item
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Publish an event; dropped silently once the engine is gone
    pub fn send(&self, kind: DecoderEventKind) {
        let event = DecoderEvent {
            item: self.item.clone(),
            generation: self.generation(),
            kind,
        };
        if self.tx.send(event).is_err() {
            tracing::trace!(item = %self.item, "decoder event dropped, engine gone");
        }
    }

    pub fn status_changed(&self, status: DecoderStatus) {
        self.send(DecoderEventKind::StatusChanged(status));
    }

    pub fn time_update(&self, elapsed: Duration) {
        self.send(DecoderEventKind::TimeUpdate(elapsed));
    }

    pub fn end_of_media(&self) {
        self.send(DecoderEventKind::EndOfMedia);
    }

    pub fn metadata(&self, update: MetadataUpdate) {
        self.send(DecoderEventKind::Metadata(update));
    }

    pub fn failure(&self, message: impl Into<String>) {
        self.send(DecoderEventKind::Failure(message.into()));
    }
}
