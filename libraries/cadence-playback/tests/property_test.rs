//! Property-based tests for queue navigation
//!
//! Uses proptest to check navigation invariants over random nested queues.

mod common;

use cadence_core::{AddMode, PlaylistRef};
use cadence_playback::{PlaybackState, QueueEngine};
use common::*;
use proptest::prelude::*;
use std::time::Duration;

// ===== Helpers =====

#[derive(Debug, Clone)]
enum Shape {
    Song,
    List(Vec<Shape>),
}

fn arbitrary_shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![4 => Just(Shape::Song), 1 => Just(Shape::List(Vec::new()))];
    leaf.prop_recursive(3, 32, 5, |inner| {
        prop::collection::vec(inner, 0..5).prop_map(Shape::List)
    })
}

fn arbitrary_queue() -> impl Strategy<Value = Vec<Shape>> {
    prop::collection::vec(arbitrary_shape(), 1..8)
}

fn build(children: &[Shape], counter: &mut usize) -> PlaylistRef {
    *counter += 1;
    let playlist = PlaylistRef::new(format!("list-{counter}"));
    for child in children {
        match child {
            Shape::Song => {
                *counter += 1;
                playlist.push_song(song(&format!("song-{counter}")));
            }
            Shape::List(nested) => {
                let nested = build(nested, counter);
                playlist.push_playlist(&nested, AddMode::Reference).unwrap();
            }
        }
    }
    playlist
}

fn state_of(engine: &QueueEngine) -> (Vec<cadence_playback::FramePosition>, Option<String>, PlaybackState) {
    (engine.position(), current(engine), engine.state())
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Stopped,
    Paused,
    Playing,
}

fn arbitrary_mode() -> impl Strategy<Value = Mode> {
    prop_oneof![Just(Mode::Stopped), Just(Mode::Paused), Just(Mode::Playing)]
}

// ===== Property Tests =====

proptest! {
    /// Property: jump_to(n) while playing equals play() then n x next()
    #[test]
    fn jump_matches_repeated_next_while_playing(shape in arbitrary_queue(), pick in any::<prop::sample::Index>()) {
        let root = build(&shape, &mut 0);
        let size = root.size();
        prop_assume!(size > 0);
        let n = pick.index(size);

        let stepping_script = Script::new();
        let mut stepping = engine(&stepping_script, root.clone());
        stepping.play().unwrap();
        for _ in 0..n {
            stepping.next().unwrap();
        }

        let jumping_script = Script::new();
        let mut jumping = engine(&jumping_script, root.clone());
        jumping.play().unwrap();
        jumping.jump_to(n).unwrap();

        prop_assert_eq!(state_of(&stepping), state_of(&jumping));
        prop_assert_eq!(jumping.position_index(), Some(n));
        prop_assert_eq!(current(&jumping), Some(root.get_song(n).unwrap().id().as_str().to_string()));
    }

    /// Property: jump_to(n) from a reset engine equals n x next() without playing
    #[test]
    fn jump_matches_repeated_next_while_stopped(shape in arbitrary_queue(), pick in any::<prop::sample::Index>()) {
        let root = build(&shape, &mut 0);
        let size = root.size();
        prop_assume!(size > 0);
        let n = pick.index(size);

        let script = Script::new();
        let mut stepping = engine(&script, root.clone());
        for _ in 0..n {
            stepping.next().unwrap();
        }
        let mut jumping = engine(&script, root.clone());
        jumping.jump_to(n).unwrap();

        prop_assert_eq!(state_of(&stepping), state_of(&jumping));
        prop_assert_eq!(stepping.state(), PlaybackState::Stopped);
        prop_assert_eq!(stepping.position_index(), Some(n));
        prop_assert!(script.played().is_empty());
    }

    /// Property: next() visits every song exactly once, in flattened order
    #[test]
    fn next_visits_flattened_order(shape in arbitrary_queue()) {
        let root = build(&shape, &mut 0);
        let expected: Vec<String> = root
            .songs()
            .iter()
            .map(|s| s.id().as_str().to_string())
            .collect();

        let script = Script::new();
        let mut engine = engine(&script, root);
        engine.play().unwrap();
        for _ in 1..expected.len() {
            engine.next().unwrap();
        }
        prop_assert_eq!(script.played(), expected.clone());

        engine.next().unwrap();
        prop_assert_eq!(engine.state(), PlaybackState::Stopped);
        prop_assert_eq!(script.played().len(), expected.len());
    }

    /// Property: previous() resumes only when playing, and always lands one song back
    #[test]
    fn previous_resumes_only_when_playing(
        shape in arbitrary_queue(),
        pick in any::<prop::sample::Index>(),
        mode in arbitrary_mode(),
        elapsed_ms in 0u64..3000,
    ) {
        let root = build(&shape, &mut 0);
        let size = root.size();
        prop_assume!(size > 1);
        let k = 1 + pick.index(size - 1);

        let script = Script::new();
        let mut engine = engine(&script, root.clone());
        match mode {
            Mode::Stopped => engine.jump_to(k).unwrap(),
            Mode::Paused | Mode::Playing => {
                engine.play().unwrap();
                engine.jump_to(k).unwrap();
                let name = current(&engine).unwrap();
                script.set_elapsed(&name, Duration::from_millis(elapsed_ms));
                if matches!(mode, Mode::Paused) {
                    engine.pause().unwrap();
                }
            }
        }

        engine.previous().unwrap();

        prop_assert_eq!(engine.position_index(), Some(k - 1));
        match mode {
            Mode::Playing => {
                prop_assert_eq!(engine.state(), PlaybackState::Playing);
                let expected = root.get_song(k - 1).unwrap().id().as_str().to_string();
                prop_assert_eq!(current(&engine), Some(expected));
            }
            Mode::Paused | Mode::Stopped => {
                prop_assert_eq!(engine.state(), PlaybackState::Stopped);
                prop_assert!(engine.current_item().is_none());
            }
        }
    }
}
