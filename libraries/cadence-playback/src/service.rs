//! Player service - the thread that owns the queue engine
//!
//! Commands arrive on a bounded channel, decoder notifications on the
//! engine's own channel; the service thread selects over both and is the only
//! code that touches the engine. Playback events go out on an unbounded
//! channel and the currently playing slot is published on a watch channel.

use crate::engine::QueueEngine;
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::types::{LoopMode, NowPlaying, QueueSnapshot};
use cadence_core::{AddMode, ItemId, ItemResolver, PlaylistRef, SharedItem};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::watch;

/// Commands sent to the player thread
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    /// Start or resume playback
    Play,

    /// Pause playback
    Pause,

    /// Stop playback
    Stop { clear_position: bool },

    /// Skip to next song
    Next,

    /// Restart or go to previous song
    Previous,

    /// Jump to a flattened song index
    JumpTo(usize),

    /// Seek within the current song
    Seek(Duration),

    /// Set volume (0.0 - 1.0)
    SetVolume(f32),

    SetLoopMode(LoopMode),

    SetShuffle(bool),

    /// Append an item to the queue
    EnqueueItem(SharedItem),

    /// Append an item looked up through the resolver
    EnqueueById(ItemId),

    /// Append a playlist to the queue
    EnqueuePlaylist(PlaylistRef, AddMode),

    /// Stop and empty the queue
    ClearQueue,

    /// Remove an item from the queue and dispose its handle
    ForgetItem(ItemId),

    /// Construct handles ahead of playback
    Prefetch(Vec<SharedItem>),

    /// Reply with a snapshot of the queue
    Snapshot(Sender<QueueSnapshot>),

    /// Stop the player thread
    Shutdown,
}

const COMMAND_CAPACITY: usize = 64;

/// Spawns the player thread
pub struct PlayerService;

impl PlayerService {
    /// Move `engine` onto a new thread and return the handle that drives it
    ///
    /// `resolver` is used for `EnqueueById`; without one those commands fail.
    pub fn spawn(
        engine: QueueEngine,
        resolver: Option<Arc<dyn ItemResolver>>,
    ) -> Result<PlayerHandle> {
        let (command_tx, command_rx) = bounded(COMMAND_CAPACITY);
        let (event_tx, event_rx) = unbounded();
        let (now_playing_tx, now_playing_rx) = watch::channel(engine.now_playing());
        let stop_signal = engine.stop_signal();

        let thread = thread::Builder::new()
            .name("cadence-player".to_string())
            .spawn(move || run(engine, resolver, &command_rx, &event_tx, &now_playing_tx))?;

        Ok(PlayerHandle {
            command_tx,
            event_rx,
            now_playing: now_playing_rx,
            stop_signal,
            thread: Some(thread),
        })
    }
}

fn run(
    mut engine: QueueEngine,
    resolver: Option<Arc<dyn ItemResolver>>,
    commands: &Receiver<PlayerCommand>,
    events: &Sender<PlaybackEvent>,
    now_playing: &watch::Sender<Option<NowPlaying>>,
) {
    tracing::info!("player service started");
    let decoder_events = engine.decoder_events();

    loop {
        select! {
            recv(commands) -> command => match command {
                Ok(PlayerCommand::Shutdown) | Err(_) => break,
                Ok(command) => {
                    if let Err(e) = apply(&mut engine, resolver.as_deref(), command) {
                        engine.report_error(&e);
                    }
                }
            },
            recv(decoder_events) -> event => {
                if let Ok(event) = event {
                    if let Err(e) = engine.handle_decoder_event(event) {
                        engine.report_error(&e);
                    }
                }
            },
        }
        publish(&mut engine, events, now_playing);
    }

    engine.stop(true);
    engine.pool_mut().dispose_all();
    publish(&mut engine, events, now_playing);
    tracing::info!("player service stopped");
}

fn apply(
    engine: &mut QueueEngine,
    resolver: Option<&dyn ItemResolver>,
    command: PlayerCommand,
) -> Result<()> {
    tracing::debug!(?command, "player command");
    match command {
        PlayerCommand::Play => engine.play(),
        PlayerCommand::Pause => engine.pause(),
        PlayerCommand::Stop { clear_position } => {
            engine.stop(clear_position);
            Ok(())
        }
        PlayerCommand::Next => engine.next(),
        PlayerCommand::Previous => engine.previous(),
        PlayerCommand::JumpTo(index) => engine.jump_to(index),
        PlayerCommand::Seek(position) => engine.seek(position),
        PlayerCommand::SetVolume(volume) => {
            engine.set_volume(volume);
            Ok(())
        }
        PlayerCommand::SetLoopMode(mode) => {
            engine.set_loop_mode(mode);
            Ok(())
        }
        PlayerCommand::SetShuffle(shuffle) => {
            engine.set_shuffle(shuffle);
            Ok(())
        }
        PlayerCommand::EnqueueItem(item) => {
            engine.enqueue_item(item);
            Ok(())
        }
        PlayerCommand::EnqueueById(id) => {
            let item = resolver
                .and_then(|r| r.resolve(&id))
                .ok_or(PlaybackError::UnknownItem(id))?;
            engine.enqueue_item(item);
            Ok(())
        }
        PlayerCommand::EnqueuePlaylist(playlist, mode) => {
            engine.enqueue_playlist(&playlist, mode).map(|_| ())
        }
        PlayerCommand::ClearQueue => {
            engine.clear_queue();
            Ok(())
        }
        PlayerCommand::ForgetItem(id) => {
            engine.forget_item(&id);
            Ok(())
        }
        PlayerCommand::Prefetch(items) => {
            engine.prefetch(&items);
            Ok(())
        }
        PlayerCommand::Snapshot(reply) => {
            // Requester may have given up waiting
            let _ = reply.send(engine.snapshot());
            Ok(())
        }
        PlayerCommand::Shutdown => Ok(()),
    }
}

fn publish(
    engine: &mut QueueEngine,
    events: &Sender<PlaybackEvent>,
    now_playing: &watch::Sender<Option<NowPlaying>>,
) {
    for event in engine.drain_events() {
        // Observers are optional
        let _ = events.send(event);
    }

    let current = engine.now_playing();
    now_playing.send_if_modified(|slot| {
        if *slot == current {
            false
        } else {
            *slot = current;
            true
        }
    });
}

/// Handle to a running player service
///
/// Dropping the handle shuts the service down and joins its thread.
pub struct PlayerHandle {
    command_tx: Sender<PlayerCommand>,
    event_rx: Receiver<PlaybackEvent>,
    now_playing: watch::Receiver<Option<NowPlaying>>,
    stop_signal: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    /// Send a command to the player thread
    ///
    /// Commands that stop playback also raise the engine's stop signal, so an
    /// item still loading on the player thread is never started.
    pub fn send(&self, command: PlayerCommand) -> Result<()> {
        if matches!(
            command,
            PlayerCommand::Stop { .. } | PlayerCommand::ClearQueue | PlayerCommand::Shutdown
        ) {
            self.stop_signal.store(true, Ordering::Release);
        }
        self.command_tx
            .send(command)
            .map_err(|_| PlaybackError::ServiceStopped)
    }

    pub fn play(&self) -> Result<()> {
        self.send(PlayerCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(PlayerCommand::Pause)
    }

    pub fn stop(&self, clear_position: bool) -> Result<()> {
        self.send(PlayerCommand::Stop { clear_position })
    }

    pub fn next(&self) -> Result<()> {
        self.send(PlayerCommand::Next)
    }

    pub fn previous(&self) -> Result<()> {
        self.send(PlayerCommand::Previous)
    }

    pub fn jump_to(&self, index: usize) -> Result<()> {
        self.send(PlayerCommand::JumpTo(index))
    }

    pub fn seek(&self, position: Duration) -> Result<()> {
        self.send(PlayerCommand::Seek(position))
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(PlayerCommand::SetVolume(volume))
    }

    pub fn enqueue_item(&self, item: SharedItem) -> Result<()> {
        self.send(PlayerCommand::EnqueueItem(item))
    }

    pub fn enqueue_by_id(&self, id: ItemId) -> Result<()> {
        self.send(PlayerCommand::EnqueueById(id))
    }

    pub fn enqueue_playlist(&self, playlist: PlaylistRef, mode: AddMode) -> Result<()> {
        self.send(PlayerCommand::EnqueuePlaylist(playlist, mode))
    }

    pub fn clear_queue(&self) -> Result<()> {
        self.send(PlayerCommand::ClearQueue)
    }

    /// Snapshot of the queue, taken on the player thread
    pub fn snapshot(&self) -> Result<QueueSnapshot> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(PlayerCommand::Snapshot(reply_tx))?;
        reply_rx.recv().map_err(|_| PlaybackError::ServiceStopped)
    }

    /// Playback events in emission order
    pub fn events(&self) -> &Receiver<PlaybackEvent> {
        &self.event_rx
    }

    /// Subscribe to the currently playing slot
    pub fn now_playing(&self) -> watch::Receiver<Option<NowPlaying>> {
        self.now_playing.clone()
    }

    pub fn current(&self) -> Option<NowPlaying> {
        self.now_playing.borrow().clone()
    }

    /// Stop the service and wait for its thread
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        // Already stopped if the thread is gone
        let _ = self.send(PlayerCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("player thread panicked");
            }
        }
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}
