//! Bounded pool of live decoder handles
//!
//! Handles are kept in recency order of activation. Whenever the live count
//! exceeds `max_live`, a handle that is neither playing nor the one just
//! acquired is stopped and disposed: released handles go first, then the least
//! recently activated.

use crate::backend::{BackendRegistry, DecoderEvent, DecoderEventSink, DecoderHandle};
use crate::error::{PlaybackError, Result};
use cadence_core::{ItemId, SharedItem};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use lru::LruCache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Construction = Receiver<Result<Box<dyn DecoderHandle>>>;

struct PoolEntry {
    item: SharedItem,
    handle: Box<dyn DecoderHandle>,
    last_active: Instant,
    active: bool,
    // Bumped on every activation and stamped on the handle's events
    generation: Arc<AtomicU64>,
}

/// Owner of every live decoder handle
pub struct DecoderPool {
    registry: BackendRegistry,
    entries: LruCache<ItemId, PoolEntry>,
    max_live: usize,
    acquire_timeout: Option<Duration>,
    playing: Option<ItemId>,
    events: Sender<DecoderEvent>,
    abandoned: Vec<(ItemId, Construction)>,
}

impl DecoderPool {
    /// Create a pool; handles publish their events on `events`
    pub fn new(
        registry: BackendRegistry,
        max_live: usize,
        acquire_timeout: Option<Duration>,
        events: Sender<DecoderEvent>,
    ) -> Self {
        Self {
            registry,
            entries: LruCache::unbounded(),
            max_live: max_live.max(1),
            acquire_timeout,
            playing: None,
            events,
            abandoned: Vec::new(),
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BackendRegistry {
        &mut self.registry
    }

    pub fn max_live(&self) -> usize {
        self.max_live
    }

    /// Change the bound, evicting immediately if needed
    pub fn set_max_live(&mut self, max_live: usize) {
        self.max_live = max_live.max(1);
        self.evict_excess(None);
    }

    // ===== Acquire / release =====

    /// Live handle for `item`, constructing one if needed
    ///
    /// The handle is marked active, becomes the most recently activated and
    /// starts a new generation.
    pub fn acquire(&mut self, item: &SharedItem) -> Result<&mut dyn DecoderHandle> {
        self.reap_abandoned();
        let id = item.id().clone();

        if let Some(entry) = self.entries.get_mut(&id) {
            entry.active = true;
            entry.last_active = Instant::now();
            entry.generation.fetch_add(1, Ordering::AcqRel);
        } else {
            let generation = Arc::new(AtomicU64::new(1));
            let handle = self.construct(item, Arc::clone(&generation))?;
            self.entries.put(
                id.clone(),
                PoolEntry {
                    item: Arc::clone(item),
                    handle,
                    last_active: Instant::now(),
                    active: true,
                    generation,
                },
            );
            tracing::debug!(item = %id, live = self.entries.len(), "decoder handle constructed");
            self.evict_excess(Some(&id));
        }

        match self.entries.peek_mut(&id) {
            Some(entry) => Ok(entry.handle.as_mut()),
            None => Err(PlaybackError::backend_failure(&id, "handle missing after acquire")),
        }
    }

    /// Mark inactive; the handle stays live but is first in line for eviction
    pub fn release(&mut self, item: &ItemId) {
        if let Some(entry) = self.entries.peek_mut(item) {
            entry.active = false;
        }
        if self.playing.as_ref() == Some(item) {
            self.playing = None;
        }
    }

    /// Construct handles ahead of time without activating them
    ///
    /// Returns how many items have a live handle afterwards. Failures are logged.
    pub fn prefetch(&mut self, items: &[SharedItem]) -> usize {
        let mut loaded = 0;
        for item in items {
            if self.entries.contains(item.id()) {
                loaded += 1;
                continue;
            }
            match self.acquire(item) {
                Ok(_) => {
                    self.release(item.id());
                    loaded += 1;
                }
                Err(e) => tracing::warn!(item = %item.id(), "prefetch failed: {}", e),
            }
        }
        loaded
    }

    /// Record which handle is playing; it is never evicted
    pub fn mark_playing(&mut self, item: &ItemId) {
        self.playing = Some(item.clone());
    }

    pub fn playing(&self) -> Option<&ItemId> {
        self.playing.as_ref()
    }

    // ===== Disposal =====

    /// Stop and destroy the handle for `item` now
    pub fn dispose(&mut self, item: &ItemId) -> bool {
        if self.playing.as_ref() == Some(item) {
            self.playing = None;
        }
        match self.entries.pop(item) {
            Some(entry) => {
                Self::destroy(item, entry.handle);
                true
            }
            None => false,
        }
    }

    pub fn dispose_all(&mut self) {
        self.playing = None;
        while let Some((id, entry)) = self.entries.pop_lru() {
            Self::destroy(&id, entry.handle);
        }
        self.reap_abandoned();
    }

    /// Dispose handles whose construction finished after the acquire gave up
    pub fn reap_abandoned(&mut self) -> usize {
        let mut reaped = 0;
        self.abandoned.retain(|(id, construction)| match construction.try_recv() {
            Ok(Ok(handle)) => {
                tracing::debug!(item = %id, "disposing late decoder handle");
                Self::destroy(id, handle);
                reaped += 1;
                false
            }
            Ok(Err(e)) => {
                tracing::debug!(item = %id, "abandoned construction failed: {}", e);
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => false,
        });
        reaped
    }

    fn destroy(item: &ItemId, mut handle: Box<dyn DecoderHandle>) {
        if let Err(e) = handle.stop() {
            tracing::warn!(item = %item, "stopping decoder before dispose failed: {}", e);
        }
        handle.dispose();
    }

    fn evict_excess(&mut self, keep: Option<&ItemId>) {
        while self.entries.len() > self.max_live {
            // Inactive before active, then least recently activated
            let victim = self
                .entries
                .iter()
                .rev()
                .filter(|(id, _)| Some(*id) != keep && Some(*id) != self.playing.as_ref())
                .min_by_key(|(_, entry)| (entry.active, entry.last_active))
                .map(|(id, _)| id.clone());

            let Some(victim) = victim else {
                tracing::debug!(live = self.entries.len(), "nothing evictable, pool over limit");
                break;
            };
            if let Some(entry) = self.entries.pop(&victim) {
                tracing::debug!(
                    item = %victim,
                    idle_ms = entry.last_active.elapsed().as_millis() as u64,
                    "evicting decoder handle"
                );
                Self::destroy(&victim, entry.handle);
            }
        }
    }

    fn construct(
        &mut self,
        item: &SharedItem,
        generation: Arc<AtomicU64>,
    ) -> Result<Box<dyn DecoderHandle>> {
        let backend = self.registry.resolve(item.locator())?;
        let id = item.id().clone();
        let sink = DecoderEventSink::with_generation(id.clone(), generation, self.events.clone());

        let Some(timeout) = self.acquire_timeout else {
            return backend.construct(item, sink);
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        let item = Arc::clone(item);
        thread::Builder::new()
            .name("cadence-decoder-init".to_string())
            .spawn(move || {
                // Receiver may be gone if the pool was dropped
                let _ = tx.send(backend.construct(&item, sink));
            })
            .map_err(|e| PlaybackError::backend_failure(&id, e.to_string()))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(item = %id, ?timeout, "decoder construction timed out");
                self.abandoned.push((id.clone(), rx));
                Err(PlaybackError::AcquireTimeout { item: id, timeout })
            }
            Err(RecvTimeoutError::Disconnected) => Err(PlaybackError::backend_failure(
                &id,
                "decoder construction thread exited",
            )),
        }
    }

    // ===== Queries =====

    pub fn contains(&self, item: &ItemId) -> bool {
        self.entries.contains(item)
    }

    pub fn is_active(&self, item: &ItemId) -> bool {
        self.entries.peek(item).is_some_and(|e| e.active)
    }

    /// Activation count of the live handle for `item`
    pub fn generation(&self, item: &ItemId) -> Option<u64> {
        self.entries
            .peek(item)
            .map(|e| e.generation.load(Ordering::Acquire))
    }

    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    /// Live items, most recently activated first
    pub fn live_items(&self) -> Vec<ItemId> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    /// The item a live handle was built for
    pub fn item(&self, id: &ItemId) -> Option<SharedItem> {
        self.entries.peek(id).map(|e| Arc::clone(&e.item))
    }

    /// Live handle without touching recency
    pub fn handle(&self, item: &ItemId) -> Option<&dyn DecoderHandle> {
        self.entries.peek(item).map(|e| e.handle.as_ref())
    }

    pub fn handle_mut(&mut self, item: &ItemId) -> Option<&mut dyn DecoderHandle> {
        match self.entries.peek_mut(item) {
            Some(entry) => Some(entry.handle.as_mut()),
            None => None,
        }
    }
}

impl Drop for DecoderPool {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
