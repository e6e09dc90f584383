//! Player service integration tests
//!
//! Exercise the actor thread through its handle: commands in, events and the
//! now-playing slot out.

mod common;

use cadence_core::{AddMode, ItemResolver, MediaLibrary};
use cadence_playback::{
    BackendRegistry, PlaybackConfig, PlaybackEvent, PlaybackState, PlayerService, QueueEngine,
    SnapshotEntry,
};
use common::*;
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

// ===== Helpers =====

/// Wait for the first event matching `predicate`
fn wait_for(events: &Receiver<PlaybackEvent>, predicate: impl Fn(&PlaybackEvent) -> bool) -> PlaybackEvent {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) if predicate(&event) => return event,
            Ok(_) => {}
            Err(e) => panic!("no matching event: {e}"),
        }
    }
}

fn headless_engine() -> QueueEngine {
    QueueEngine::new(BackendRegistry::headless(), PlaybackConfig::default()).unwrap()
}

// ===== Tests =====

#[test]
fn commands_drive_playback_and_publish_events() {
    let player = PlayerService::spawn(headless_engine(), None).unwrap();
    player.enqueue_item(song("a")).unwrap();
    player.enqueue_item(song("b")).unwrap();
    player.play().unwrap();

    let event = wait_for(player.events(), |e| {
        matches!(e, PlaybackEvent::NowPlayingChanged { now_playing: Some(_) })
    });
    let PlaybackEvent::NowPlayingChanged {
        now_playing: Some(now),
    } = event
    else {
        unreachable!()
    };
    assert_eq!(now.item.as_str(), "a");

    player.next().unwrap();
    let snapshot = player.snapshot().unwrap();
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.position_index, Some(1));
    assert_eq!(snapshot.entries.len(), 2);
    assert_eq!(player.current().map(|n| n.item.as_str().to_string()).as_deref(), Some("b"));
}

#[test]
fn now_playing_watch_follows_the_engine() {
    let player = PlayerService::spawn(headless_engine(), None).unwrap();
    let now_playing = player.now_playing();
    assert!(now_playing.borrow().is_none());

    player.enqueue_item(song("a")).unwrap();
    player.play().unwrap();
    player.snapshot().unwrap();
    assert_eq!(
        now_playing.borrow().as_ref().map(|n| n.state),
        Some(PlaybackState::Playing)
    );

    player.pause().unwrap();
    player.snapshot().unwrap();
    assert_eq!(
        now_playing.borrow().as_ref().map(|n| n.state),
        Some(PlaybackState::Paused)
    );

    player.stop(true).unwrap();
    player.snapshot().unwrap();
    assert!(now_playing.borrow().is_none());
}

#[test]
fn decoder_notifications_reach_the_service_thread() {
    let script = Script::new();
    let engine = QueueEngine::new(script.registry(), test_config(4)).unwrap();
    let player = PlayerService::spawn(engine, None).unwrap();
    player.enqueue_item(song("a")).unwrap();
    player.enqueue_item(song("b")).unwrap();
    player.play().unwrap();
    wait_for(player.events(), |e| {
        matches!(e, PlaybackEvent::StateChanged { state: PlaybackState::Playing })
    });

    script.finish("a");
    let event = wait_for(player.events(), |e| {
        matches!(e, PlaybackEvent::NowPlayingChanged { now_playing: Some(n) } if n.item.as_str() == "b")
    });
    assert!(matches!(event, PlaybackEvent::NowPlayingChanged { .. }));
}

#[test]
fn enqueue_by_id_uses_the_resolver() {
    let library = Arc::new(MediaLibrary::new());
    library.add_item(song("known"));
    let resolver: Arc<dyn ItemResolver> = library;

    let player = PlayerService::spawn(headless_engine(), Some(resolver)).unwrap();
    player.enqueue_by_id("known".into()).unwrap();
    player.enqueue_by_id("missing".into()).unwrap();

    let event = wait_for(player.events(), |e| matches!(e, PlaybackEvent::Error { .. }));
    let PlaybackEvent::Error { message } = event else {
        unreachable!()
    };
    assert!(message.contains("missing"));
    assert_eq!(player.snapshot().unwrap().size, 1);
}

#[test]
fn failed_commands_become_error_events() {
    let player = PlayerService::spawn(headless_engine(), None).unwrap();
    player.jump_to(7).unwrap();

    let event = wait_for(player.events(), |e| matches!(e, PlaybackEvent::Error { .. }));
    assert!(matches!(event, PlaybackEvent::Error { message } if message.contains("out of range")));
}

#[test]
fn snapshot_serializes_nested_entries() {
    let player = PlayerService::spawn(headless_engine(), None).unwrap();
    player.enqueue_item(song("a")).unwrap();
    player
        .enqueue_playlist(playlist("Album", &["b", "c"]), AddMode::Reference)
        .unwrap();

    let snapshot = player.snapshot().unwrap();
    assert_eq!(snapshot.size, 3);
    assert!(matches!(
        &snapshot.entries[1],
        SnapshotEntry::Playlist { name, size: 2, .. } if name == "Album"
    ));

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["entries"][0]["kind"], "song");
    assert_eq!(json["entries"][1]["kind"], "playlist");
}

#[test]
fn dropping_the_handle_stops_the_thread() {
    let player = PlayerService::spawn(headless_engine(), None).unwrap();
    player.enqueue_item(song("a")).unwrap();
    player.play().unwrap();
    let events = player.events().clone();
    drop(player);

    // Final events are flushed, then the channel closes
    let drained: Vec<_> = events.iter().collect();
    assert!(drained.contains(&PlaybackEvent::StateChanged {
        state: PlaybackState::Stopped
    }));
}

#[test]
fn stop_while_loading_disposes_instead_of_starting() {
    let script = Script::new();
    script.set_construct_delay(Duration::from_millis(200));
    let engine =
        QueueEngine::with_queue(playlist("Queue", &["a"]), script.registry(), test_config(4))
            .unwrap();
    let player = PlayerService::spawn(engine, None).unwrap();

    player.play().unwrap();
    player.stop(false).unwrap();

    let snapshot = player.snapshot().unwrap();
    assert_eq!(snapshot.state, PlaybackState::Stopped);
    assert!(player.current().is_none());
    assert!(script.played().is_empty());
    assert!(script.calls().contains(&Call::Construct("a".to_string())));
    assert!(script.calls().contains(&Call::Dispose("a".to_string())));

    // The signal is acknowledged; the next play starts normally
    script.set_construct_delay(Duration::ZERO);
    player.play().unwrap();
    let snapshot = player.snapshot().unwrap();
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(script.played(), vec!["a".to_string()]);
}
