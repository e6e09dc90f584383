//! Queue engine - navigation and playback control
//!
//! The position in the (possibly nested) queue is a stack of frames. The
//! bottom frame always points into the root playlist; each further frame
//! points into the playlist referenced by the entry of the frame below it.
//! The top frame's entry is the song at the position once the engine has
//! settled.
//!
//! ```text
//! root [songA, X, songC]        frames: (root, 1) -> (X, 0)
//!        X [songB, Y]           position: songB
//!                Y []
//! ```
//!
//! Every frame remembers the `EntryId` at its index. Before an operation the
//! frames are re-located by those ids, so inserting or removing entries around
//! the position does not make the engine skip or repeat songs.

use crate::backend::{BackendRegistry, DecoderEvent, DecoderEventKind};
use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::pool::DecoderPool;
use crate::types::{
    FramePosition, LoopMode, NowPlaying, PlaybackState, QueueSnapshot, SnapshotEntry,
};
use cadence_core::{
    AddMode, CoreError, EntryId, EntryKind, ItemId, MetadataUpdate, PlaylistRef, SharedItem,
};
use crossbeam_channel::{unbounded, Receiver};
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Frame {
    playlist: PlaylistRef,
    index: usize,
    anchor: Option<EntryId>,
}

impl Frame {
    fn new(playlist: PlaylistRef, index: usize) -> Self {
        let anchor = playlist.get_entry(index).ok().map(|e| e.id());
        Self {
            playlist,
            index,
            anchor,
        }
    }

    /// Frame positioned past the last entry, used when walking backwards
    fn past_end(playlist: PlaylistRef) -> Self {
        let index = playlist.entry_count();
        Self {
            playlist,
            index,
            anchor: None,
        }
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
        self.anchor = self.playlist.get_entry(index).ok().map(|e| e.id());
    }
}

#[derive(Debug, Clone)]
struct Current {
    item: SharedItem,
    entry: EntryId,
    generation: u64,
}

/// Stack-based queue engine
///
/// Owns the root playlist (the queue), the traversal position and the decoder
/// pool. All methods must be called from a single thread; `PlayerService`
/// provides that thread.
pub struct QueueEngine {
    root: PlaylistRef,
    frames: Vec<Frame>,
    state: PlaybackState,
    current: Option<Current>,

    // `next()` ran off the end; the position was reset to the top
    at_end: bool,

    // The current entry was removed; the position already sits on its successor
    detached: bool,

    volume: f32,
    loop_mode: LoopMode,
    shuffle: bool,
    restart_threshold: Duration,
    default_add_mode: AddMode,

    pool: DecoderPool,
    decoder_rx: Receiver<DecoderEvent>,

    // Set from other threads when a stop is on its way; a handle that finishes
    // loading while it is set is disposed instead of started
    stop_requested: Arc<AtomicBool>,

    // Event queue for observers
    pending_events: Vec<PlaybackEvent>,
}

impl QueueEngine {
    /// Create an engine with a new, empty queue
    pub fn new(registry: BackendRegistry, config: PlaybackConfig) -> Result<Self> {
        Self::with_queue(PlaylistRef::new("Queue"), registry, config)
    }

    /// Create an engine that plays `root`
    pub fn with_queue(
        root: PlaylistRef,
        registry: BackendRegistry,
        config: PlaybackConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (decoder_tx, decoder_rx) = unbounded();
        let pool = DecoderPool::new(
            registry,
            config.max_live_decoders,
            config.acquire_timeout(),
            decoder_tx,
        );

        Ok(Self {
            frames: vec![Frame::new(root.clone(), 0)],
            root,
            state: PlaybackState::Stopped,
            current: None,
            at_end: false,
            detached: false,
            volume: config.volume,
            loop_mode: config.loop_mode,
            shuffle: config.shuffle,
            restart_threshold: config.restart_threshold(),
            default_add_mode: config.default_add_mode,
            pool,
            decoder_rx,
            stop_requested: Arc::new(AtomicBool::new(false)),
            pending_events: Vec::new(),
        })
    }

    // ===== Playback Control =====

    /// Start or resume playback
    ///
    /// Descends into nested playlists and skips empty ones until a song is
    /// found. If the queue holds no song the engine stays stopped.
    pub fn play(&mut self) -> Result<()> {
        self.resync();
        match self.state {
            PlaybackState::Paused if !self.detached => self.resume(),
            PlaybackState::Playing if !self.detached => Ok(()),
            _ => self.start_at_position(),
        }
    }

    /// Pause playback; no-op unless playing
    pub fn pause(&mut self) -> Result<()> {
        if self.state != PlaybackState::Playing {
            return Ok(());
        }
        if let Some(id) = self.current_item_id() {
            if let Some(handle) = self.pool.handle_mut(&id) {
                handle.pause()?;
            }
        }
        self.set_state(PlaybackState::Paused);
        self.emit_now_playing();
        Ok(())
    }

    /// Stop playback and release the active handle
    ///
    /// With `clear_position` the position returns to the top of the queue.
    /// Acknowledges a pending stop request.
    pub fn stop(&mut self, clear_position: bool) {
        self.stop_requested.store(false, Ordering::Release);
        self.halt(clear_position);
    }

    fn halt(&mut self, clear_position: bool) {
        if self.halt_current() {
            self.emit_now_playing();
        }
        self.set_state(PlaybackState::Stopped);

        if clear_position {
            self.frames = vec![Frame::new(self.root.clone(), 0)];
            self.at_end = false;
            self.detached = false;
            self.emit_position();
        }
    }

    /// Move to the next song
    ///
    /// Playback restarts at the new position only if something was current,
    /// paused included. Running past the last song stops and resets the position.
    pub fn next(&mut self) -> Result<()> {
        self.resync();
        let was_playing = self.current.is_some();

        if self.shuffle {
            let size = self.root.size();
            if size == 0 {
                self.halt(true);
                return Ok(());
            }
            let index = rand::thread_rng().gen_range(0..size);
            tracing::debug!(index, "shuffle jump");
            return self.jump_to(index);
        }

        let moved = if self.detached || self.at_end {
            self.settle_forward()
        } else {
            self.step_forward()
        };
        self.detached = false;
        self.at_end = false;

        if moved.is_none() {
            return self.run_off_end(was_playing);
        }
        if was_playing {
            self.start_at_position()
        } else {
            self.emit_position();
            Ok(())
        }
    }

    /// Restart the current song or move to the previous one
    ///
    /// Restarts when more than the restart threshold has elapsed or the song is
    /// the first of the queue. Otherwise walks backwards and resumes playback
    /// only if the engine was playing.
    pub fn previous(&mut self) -> Result<()> {
        self.resync();

        if self.current.is_some()
            && !self.detached
            && (self.elapsed() > self.restart_threshold || self.position_index() == Some(0))
        {
            tracing::debug!("restarting current item");
            return self.seek(Duration::ZERO);
        }

        // Unlike next(), a paused song is not resumed: stepping back from a
        // paused song only moves the position
        let should_resume = self.state == PlaybackState::Playing;
        if self.at_end {
            self.frames = vec![Frame::past_end(self.root.clone())];
        }
        self.at_end = false;
        self.detached = false;

        self.halt(false);
        if self.retreat().is_none() {
            self.settle_forward();
        }
        self.emit_position();

        if should_resume {
            self.start_at_position()?;
        }
        Ok(())
    }

    /// Move to the `index`-th song in flattened order
    ///
    /// Leaves the same position as resetting and calling `next()` `index` times.
    /// Playback restarts there only if something was current.
    pub fn jump_to(&mut self, index: usize) -> Result<()> {
        self.resync();
        let size = self.root.size();
        if index >= size {
            return Err(CoreError::out_of_range(index, size).into());
        }

        let was_playing = self.current.is_some();
        self.frames = if index == 0 {
            // The reset position; settled when playback starts
            vec![Frame::new(self.root.clone(), 0)]
        } else {
            self.descend_to(index)?
        };
        self.at_end = false;
        self.detached = false;

        if was_playing {
            self.start_at_position()
        } else {
            self.emit_position();
            Ok(())
        }
    }

    /// Seek within the current item
    pub fn seek(&mut self, position: Duration) -> Result<()> {
        let id = self.current_item_id().ok_or(PlaybackError::NoActiveItem)?;
        let handle = self
            .pool
            .handle_mut(&id)
            .ok_or(PlaybackError::NoActiveItem)?;
        handle.seek(position)?;
        self.pending_events.push(PlaybackEvent::Progress {
            item: id,
            elapsed_ms: position.as_millis() as u64,
        });
        Ok(())
    }

    /// Set the target volume (clamped to 0.0 - 1.0) and apply it to the live handle
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.volume = volume;
        if let Some(id) = self.current_item_id() {
            if let Some(handle) = self.pool.handle_mut(&id) {
                handle.set_volume(volume);
            }
        }
        self.pending_events
            .push(PlaybackEvent::VolumeChanged { volume });
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    // ===== Queue Management =====

    /// Append a song to the queue
    pub fn enqueue_item(&mut self, item: SharedItem) -> EntryId {
        let entry = self.root.push_song(item);
        self.emit_queue_changed();
        entry
    }

    /// Append a playlist to the queue
    pub fn enqueue_playlist(
        &mut self,
        playlist: &PlaylistRef,
        mode: AddMode,
    ) -> Result<Vec<EntryId>> {
        let entries = self.root.push_playlist(playlist, mode)?;
        self.emit_queue_changed();
        Ok(entries)
    }

    /// Append a playlist using the configured default mode
    pub fn enqueue_playlist_default(&mut self, playlist: &PlaylistRef) -> Result<Vec<EntryId>> {
        self.enqueue_playlist(playlist, self.default_add_mode)
    }

    /// Stop and empty the queue
    pub fn clear_queue(&mut self) {
        self.root.clear();
        self.stop(true);
        self.emit_queue_changed();
    }

    /// Remove an item everywhere in the queue and dispose its handle
    ///
    /// Stops playback first if the item is current. Returns the number of
    /// entries removed.
    pub fn forget_item(&mut self, item: &ItemId) -> usize {
        if self.current_item_id().as_ref() == Some(item) {
            self.halt(false);
        }

        let mut visited = HashSet::new();
        let mut pending = vec![self.root.clone()];
        let mut removed = 0;
        while let Some(playlist) = pending.pop() {
            if !visited.insert(playlist.id().clone()) {
                continue;
            }
            removed += playlist.remove_item(item);
            pending.extend(
                playlist
                    .entries()
                    .iter()
                    .filter_map(|e| e.as_playlist().cloned()),
            );
        }

        self.pool.dispose(item);
        self.resync();
        tracing::debug!(item = %item, removed, "forgot item");
        self.emit_queue_changed();
        removed
    }

    /// Construct handles for `items` ahead of playback
    pub fn prefetch(&mut self, items: &[SharedItem]) -> usize {
        self.pool.prefetch(items)
    }

    // ===== Decoder Events =====

    /// Receiver for decoder notifications, for owners that select on it
    pub fn decoder_events(&self) -> Receiver<DecoderEvent> {
        self.decoder_rx.clone()
    }

    /// Flag another thread sets before queueing a stop for this engine
    ///
    /// While it is set, a handle that finishes loading is disposed instead of
    /// started. `stop()` and `clear_queue()` reset it.
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_requested)
    }

    /// Apply every queued decoder notification
    pub fn pump_decoder_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.decoder_rx.try_recv() {
            if let Err(e) = self.handle_decoder_event(event) {
                self.report_error(&e);
            }
            handled += 1;
        }
        handled
    }

    /// Apply one decoder notification
    pub fn handle_decoder_event(&mut self, event: DecoderEvent) -> Result<()> {
        let (is_current, superseded) = match &self.current {
            Some(c) if c.item.id() == &event.item => {
                let current_run = c.generation == event.generation;
                (current_run, !current_run)
            }
            _ => (false, false),
        };
        if superseded
            && !matches!(
                event.kind,
                DecoderEventKind::Metadata(_) | DecoderEventKind::StatusChanged(_)
            )
        {
            tracing::trace!(item = %event.item, generation = event.generation, "stale decoder event");
            return Ok(());
        }

        match event.kind {
            DecoderEventKind::StatusChanged(status) => {
                tracing::trace!(item = %event.item, ?status, "decoder status");
                Ok(())
            }
            DecoderEventKind::TimeUpdate(elapsed) => {
                if is_current {
                    self.pending_events.push(PlaybackEvent::Progress {
                        item: event.item,
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }
                Ok(())
            }
            DecoderEventKind::EndOfMedia => {
                if is_current {
                    self.on_end_of_media(true)
                } else {
                    Ok(())
                }
            }
            DecoderEventKind::Metadata(update) => {
                self.refine(&event.item, &update);
                Ok(())
            }
            DecoderEventKind::Failure(message) => {
                tracing::warn!(item = %event.item, "decoder failure: {}", message);
                self.pending_events.push(PlaybackEvent::ItemFailed {
                    item: event.item.clone(),
                    message,
                });
                let result = if is_current {
                    self.on_end_of_media(false)
                } else {
                    Ok(())
                };
                if self.current_item_id().as_ref() != Some(&event.item) {
                    self.pool.dispose(&event.item);
                }
                result
            }
        }
    }

    /// Record a failed command as an event
    pub fn report_error(&mut self, error: &PlaybackError) {
        if error.is_recoverable() {
            tracing::warn!("playback command failed: {}", error);
        } else {
            tracing::error!("playback invariant violated: {}", error);
        }
        self.pending_events.push(PlaybackEvent::Error {
            message: error.to_string(),
        });
    }

    // ===== Queries =====

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_item(&self) -> Option<SharedItem> {
        self.current.as_ref().map(|c| Arc::clone(&c.item))
    }

    pub fn current_entry(&self) -> Option<EntryId> {
        self.current.as_ref().map(|c| c.entry)
    }

    /// The traversal stack, root first
    pub fn position(&self) -> Vec<FramePosition> {
        self.frames
            .iter()
            .map(|f| FramePosition {
                playlist: f.playlist.id().clone(),
                index: f.index,
            })
            .collect()
    }

    /// Flattened index of the song at the position
    ///
    /// Before the position is settled (for example right after a reset onto a
    /// nested playlist) this is the song playback would start with.
    pub fn position_index(&self) -> Option<usize> {
        let mut index = 0;
        for frame in &self.frames {
            for entry in frame.playlist.entries().iter().take(Self::frame_index(frame)) {
                index += match entry.kind() {
                    EntryKind::Song(_) => 1,
                    EntryKind::Playlist(nested) => nested.size(),
                };
            }
        }
        (index < self.root.size()).then_some(index)
    }

    /// Elapsed time of the current item
    pub fn elapsed(&self) -> Duration {
        self.current
            .as_ref()
            .and_then(|c| self.pool.handle(c.item.id()))
            .map(|handle| handle.position())
            .unwrap_or_default()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// The root playlist
    pub fn queue(&self) -> &PlaylistRef {
        &self.root
    }

    pub fn pool(&self) -> &DecoderPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut DecoderPool {
        &mut self.pool
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        self.current
            .as_ref()
            .map(|c| NowPlaying::new(&c.item, c.entry, self.state))
    }

    /// Serializable view of the queue
    pub fn snapshot(&self) -> QueueSnapshot {
        let entries = self
            .root
            .entries()
            .into_iter()
            .map(|entry| match entry.kind() {
                EntryKind::Song(item) => SnapshotEntry::Song {
                    entry: entry.id(),
                    item: item.id().clone(),
                    title: item.title(),
                    duration_ms: item.duration().map(|d| d.as_millis() as u64),
                },
                EntryKind::Playlist(playlist) => SnapshotEntry::Playlist {
                    entry: entry.id(),
                    playlist: playlist.id().clone(),
                    name: playlist.name(),
                    size: playlist.size(),
                },
            })
            .collect();

        QueueSnapshot {
            name: self.root.name(),
            size: self.root.size(),
            state: self.state,
            current: self.current_entry(),
            position_index: self.position_index(),
            entries,
        }
    }

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }

    // ===== Traversal =====

    /// Index of a frame's entry, following it if the playlist was edited
    fn frame_index(frame: &Frame) -> usize {
        frame
            .anchor
            .and_then(|anchor| frame.playlist.index_of(anchor))
            .unwrap_or(frame.index)
    }

    /// Re-locate frames after edits of the playlists
    fn resync(&mut self) {
        let mut cut = None;
        for (depth, frame) in self.frames.iter_mut().enumerate() {
            match frame.anchor {
                Some(anchor) => {
                    if let Some(index) = frame.playlist.index_of(anchor) {
                        frame.index = index;
                    } else {
                        let count = frame.playlist.entry_count();
                        frame.set_index(frame.index.min(count));
                        cut = Some(depth + 1);
                        break;
                    }
                }
                None => {
                    let count = frame.playlist.entry_count();
                    frame.set_index(frame.index.min(count));
                }
            }
        }

        if let Some(depth) = cut {
            self.frames.truncate(depth);
            if self.current.is_some() {
                self.detached = true;
            }
            tracing::debug!(depth, "position lost its entry");
        }
    }

    /// Descend or skip until the position is on a song
    fn settle_forward(&mut self) -> Option<(SharedItem, EntryId)> {
        loop {
            let frame = self.frames.last()?;
            let Ok(entry) = frame.playlist.get_entry(frame.index) else {
                if !self.advance_index() {
                    return None;
                }
                continue;
            };

            match entry.kind() {
                EntryKind::Song(item) => return Some((Arc::clone(item), entry.id())),
                EntryKind::Playlist(nested) if !nested.is_recursively_empty() => {
                    self.frames.push(Frame::new(nested.clone(), 0));
                }
                EntryKind::Playlist(_) => {
                    if !self.advance_index() {
                        return None;
                    }
                }
            }
        }
    }

    /// Move one entry forward, popping finished frames
    fn advance_index(&mut self) -> bool {
        loop {
            let depth = self.frames.len();
            let Some(frame) = self.frames.last_mut() else {
                return false;
            };
            let next = frame.index + 1;
            if next < frame.playlist.entry_count() {
                frame.set_index(next);
                return true;
            }
            if depth == 1 {
                return false;
            }
            self.frames.pop();
        }
    }

    fn step_forward(&mut self) -> Option<(SharedItem, EntryId)> {
        self.settle_forward()?;
        if !self.advance_index() {
            return None;
        }
        self.settle_forward()
    }

    /// Walk backwards to the previous song, entering playlists from their end
    fn retreat(&mut self) -> Option<(SharedItem, EntryId)> {
        loop {
            while self.frames.len() > 1 && self.frames.last().is_some_and(|f| f.index == 0) {
                self.frames.pop();
            }

            let frame = self.frames.last_mut()?;
            let index = frame.index.min(frame.playlist.entry_count());
            if index == 0 {
                frame.set_index(0);
                if self.frames.len() == 1 {
                    return None;
                }
                continue;
            }

            frame.set_index(index - 1);
            let entry = frame.playlist.get_entry(index - 1).ok()?;
            match entry.kind() {
                EntryKind::Song(item) => return Some((Arc::clone(item), entry.id())),
                EntryKind::Playlist(nested) if !nested.is_recursively_empty() => {
                    self.frames.push(Frame::past_end(nested.clone()));
                }
                EntryKind::Playlist(_) => {}
            }
        }
    }

    /// Frames for the `index`-th song, computed by descending through sizes
    fn descend_to(&self, index: usize) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        let mut playlist = self.root.clone();
        let mut remaining = index;

        loop {
            let mut nested_target = None;
            for (i, entry) in playlist.entries().iter().enumerate() {
                match entry.kind() {
                    EntryKind::Song(_) => {
                        if remaining == 0 {
                            frames.push(Frame::new(playlist.clone(), i));
                            return Ok(frames);
                        }
                        remaining -= 1;
                    }
                    EntryKind::Playlist(nested) => {
                        let size = nested.size();
                        if remaining < size {
                            frames.push(Frame::new(playlist.clone(), i));
                            nested_target = Some(nested.clone());
                            break;
                        }
                        remaining -= size;
                    }
                }
            }

            match nested_target {
                Some(nested) => playlist = nested,
                None => {
                    tracing::error!(index, "queue size does not match its contents");
                    return Err(CoreError::Corrupted(format!(
                        "song {index} not reachable in queue {}",
                        self.root.id()
                    ))
                    .into());
                }
            }
        }
    }

    // ===== Internal =====

    fn resume(&mut self) -> Result<()> {
        let Some(id) = self.current_item_id() else {
            return self.start_at_position();
        };
        match self.pool.handle_mut(&id) {
            Some(handle) => handle.play()?,
            None => return self.start_at_position(),
        }
        self.pool.mark_playing(&id);
        self.set_state(PlaybackState::Playing);
        self.emit_now_playing();
        Ok(())
    }

    /// Settle on a song and start it, replacing the current handle
    fn start_at_position(&mut self) -> Result<()> {
        self.at_end = false;
        self.detached = false;

        let Some((item, entry)) = self.settle_forward() else {
            tracing::debug!("nothing to play");
            self.halt(true);
            return Ok(());
        };

        if self.halt_current() {
            self.emit_now_playing();
        }

        if let Err(e) = self.pool.acquire(&item) {
            self.set_state(PlaybackState::Stopped);
            self.emit_position();
            return Err(e);
        }
        if self.stop_requested.load(Ordering::Acquire) {
            tracing::debug!(item = %item.id(), "stop requested while loading, disposing handle");
            self.pool.dispose(item.id());
            self.set_state(PlaybackState::Stopped);
            self.emit_position();
            return Ok(());
        }

        let volume = self.volume;
        let Some(handle) = self.pool.handle_mut(item.id()) else {
            self.set_state(PlaybackState::Stopped);
            return Err(PlaybackError::backend_failure(item.id(), "handle evicted before start"));
        };
        handle.set_volume(volume);
        if let Err(e) = handle.play() {
            self.pool.release(item.id());
            self.set_state(PlaybackState::Stopped);
            return Err(e);
        }
        self.pool.mark_playing(item.id());
        let generation = self.pool.generation(item.id()).unwrap_or_default();

        tracing::debug!(item = %item.id(), entry = %entry, generation, "playing");
        self.current = Some(Current {
            item,
            entry,
            generation,
        });
        self.set_state(PlaybackState::Playing);
        self.emit_now_playing();
        self.emit_position();
        Ok(())
    }

    /// Stop and release the current handle without touching the position
    fn halt_current(&mut self) -> bool {
        let Some(current) = self.current.take() else {
            return false;
        };
        let id = current.item.id();
        if let Some(handle) = self.pool.handle_mut(id) {
            if let Err(e) = handle.stop() {
                tracing::warn!(item = %id, "stopping decoder failed: {}", e);
            }
        }
        self.pool.release(id);
        true
    }

    fn run_off_end(&mut self, was_playing: bool) -> Result<()> {
        tracing::debug!("reached end of queue");
        self.halt(true);
        self.pending_events.push(PlaybackEvent::QueueExhausted);

        if was_playing && self.loop_mode == LoopMode::All {
            return self.start_at_position();
        }
        self.at_end = true;
        Ok(())
    }

    fn on_end_of_media(&mut self, allow_repeat: bool) -> Result<()> {
        self.resync();

        if allow_repeat && self.loop_mode == LoopMode::Single && !self.detached {
            if let Some(id) = self.current_item_id() {
                if let Some(handle) = self.pool.handle_mut(&id) {
                    handle.seek(Duration::ZERO)?;
                    return handle.play();
                }
            }
        }

        if self.detached {
            return self.start_at_position();
        }
        self.next()
    }

    fn refine(&mut self, id: &ItemId, update: &MetadataUpdate) {
        let item = self
            .current
            .as_ref()
            .filter(|c| c.item.id() == id)
            .map(|c| Arc::clone(&c.item))
            .or_else(|| self.pool.item(id));

        let Some(item) = item else {
            return;
        };
        if item.refine(update) {
            self.pending_events
                .push(PlaybackEvent::MetadataRefined { item: id.clone() });
            if self.current_item_id().as_ref() == Some(id) {
                self.emit_now_playing();
            }
        }
    }

    fn current_item_id(&self) -> Option<ItemId> {
        self.current.as_ref().map(|c| c.item.id().clone())
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            self.pending_events
                .push(PlaybackEvent::StateChanged { state });
        }
    }

    fn emit_now_playing(&mut self) {
        let now_playing = self.now_playing();
        self.pending_events
            .push(PlaybackEvent::NowPlayingChanged { now_playing });
    }

    fn emit_position(&mut self) {
        let index = self.position_index();
        self.pending_events
            .push(PlaybackEvent::PositionChanged { index });
    }

    fn emit_queue_changed(&mut self) {
        let size = self.root.size();
        self.pending_events.push(PlaybackEvent::QueueChanged { size });
    }
}
