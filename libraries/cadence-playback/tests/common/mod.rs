//! Shared helpers for playback integration tests

#![allow(dead_code)]

use cadence_core::{ItemBuilder, ItemId, Locator, MetadataUpdate, PlaylistRef, SharedItem};
use cadence_playback::{
    Backend, BackendRegistry, DecoderEventSink, DecoderHandle, DecoderStatus, PlaybackConfig,
    QueueEngine, Result,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ===== Scripted backend =====

/// Call made on a scripted handle, tagged with the item id
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Construct(String),
    Play(String),
    Pause(String),
    Stop(String),
    Seek(String, Duration),
    Dispose(String),
}

#[derive(Default)]
struct ScriptState {
    calls: Vec<Call>,
    elapsed: HashMap<String, Duration>,
    sinks: HashMap<String, DecoderEventSink>,
    construct_delay: Duration,
}

/// Shared control over every handle the scripted backend creates
#[derive(Clone, Default)]
pub struct Script {
    state: Arc<Mutex<ScriptState>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(&self) -> ScriptedBackend {
        ScriptedBackend {
            script: self.clone(),
        }
    }

    pub fn registry(&self) -> BackendRegistry {
        let mut registry = BackendRegistry::new();
        registry.register(0, self.backend());
        registry
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Items that received `play`, in order
    pub fn played(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Play(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Make every construction block for `delay`
    pub fn set_construct_delay(&self, delay: Duration) {
        self.state.lock().unwrap().construct_delay = delay;
    }

    pub fn set_elapsed(&self, item: &str, elapsed: Duration) {
        self.state
            .lock()
            .unwrap()
            .elapsed
            .insert(item.to_string(), elapsed);
    }

    fn elapsed(&self, item: &str) -> Duration {
        self.state
            .lock()
            .unwrap()
            .elapsed
            .get(item)
            .copied()
            .unwrap_or_default()
    }

    fn sink(&self, item: &str) -> DecoderEventSink {
        self.state
            .lock()
            .unwrap()
            .sinks
            .get(item)
            .cloned()
            .unwrap_or_else(|| panic!("no handle constructed for {item}"))
    }

    /// Report end of media for `item`
    pub fn finish(&self, item: &str) {
        self.sink(item).end_of_media();
    }

    pub fn fail(&self, item: &str, message: &str) {
        self.sink(item).failure(message);
    }

    pub fn refine(&self, item: &str, update: MetadataUpdate) {
        self.sink(item).metadata(update);
    }
}

/// Backend that accepts everything except `.bad` files
pub struct ScriptedBackend {
    script: Script,
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn can_handle(&self, locator: &Locator) -> bool {
        locator.extension().as_deref() != Some("bad")
    }

    fn construct(
        &self,
        item: &SharedItem,
        events: DecoderEventSink,
    ) -> Result<Box<dyn DecoderHandle>> {
        let name = item.id().as_str().to_string();
        self.script.record(Call::Construct(name.clone()));
        let delay = self.script.state.lock().unwrap().construct_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.script
            .state
            .lock()
            .unwrap()
            .sinks
            .insert(name.clone(), events);
        Ok(Box::new(ScriptedHandle {
            name,
            script: self.script.clone(),
            status: DecoderStatus::Ready,
        }))
    }
}

struct ScriptedHandle {
    name: String,
    script: Script,
    status: DecoderStatus,
}

impl DecoderHandle for ScriptedHandle {
    fn play(&mut self) -> Result<()> {
        self.script.record(Call::Play(self.name.clone()));
        self.status = DecoderStatus::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.script.record(Call::Pause(self.name.clone()));
        self.status = DecoderStatus::Paused;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.script.record(Call::Stop(self.name.clone()));
        self.script.set_elapsed(&self.name, Duration::ZERO);
        self.status = DecoderStatus::Stopped;
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.script.record(Call::Seek(self.name.clone(), position));
        self.script.set_elapsed(&self.name, position);
        Ok(())
    }

    fn position(&self) -> Duration {
        self.script.elapsed(&self.name)
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn status(&self) -> DecoderStatus {
        self.status
    }

    fn dispose(&mut self) {
        self.script.record(Call::Dispose(self.name.clone()));
        self.status = DecoderStatus::Disposed;
    }
}

// ===== Builders =====

/// Song whose item id and title are both `name`
pub fn song(name: &str) -> SharedItem {
    ItemBuilder::new(Locator::parse(&format!("file:///music/{name}.flac")).unwrap())
        .id(ItemId::new(name))
        .build_shared()
}

pub fn unsupported_song(name: &str) -> SharedItem {
    ItemBuilder::new(Locator::parse(&format!("file:///music/{name}.bad")).unwrap())
        .id(ItemId::new(name))
        .build_shared()
}

pub fn playlist(name: &str, songs: &[&str]) -> PlaylistRef {
    let playlist = PlaylistRef::new(name);
    for name in songs {
        playlist.push_song(song(name));
    }
    playlist
}

pub fn test_config(max_live: usize) -> PlaybackConfig {
    PlaybackConfig {
        max_live_decoders: max_live,
        acquire_timeout_ms: None,
        ..PlaybackConfig::default()
    }
}

pub fn engine(script: &Script, root: PlaylistRef) -> QueueEngine {
    QueueEngine::with_queue(root, script.registry(), test_config(10)).unwrap()
}

/// The `[a, X = [b, Y = []], c]` queue
pub fn nested_queue() -> PlaylistRef {
    let y = PlaylistRef::new("Y");
    let x = playlist("X", &["b"]);
    x.push_playlist(&y, cadence_core::AddMode::Reference).unwrap();

    let root = PlaylistRef::new("Queue");
    root.push_song(song("a"));
    root.push_playlist(&x, cadence_core::AddMode::Reference)
        .unwrap();
    root.push_song(song("c"));
    root
}

pub fn current(engine: &QueueEngine) -> Option<String> {
    engine
        .current_item()
        .map(|item| item.id().as_str().to_string())
}
