//! Playback configuration

use crate::error::{PlaybackError, Result};
use crate::types::LoopMode;
use cadence_core::AddMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback configuration
///
/// Missing fields fall back to their defaults when deserialized, so a config
/// file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Upper bound on live decoder handles
    pub max_live_decoders: usize,

    /// How long `acquire` waits for a backend to construct a handle
    ///
    /// `None` constructs on the calling thread without a bound.
    pub acquire_timeout_ms: Option<u64>,

    /// Elapsed time after which `previous()` restarts the current item
    pub restart_threshold_ms: u64,

    /// Initial volume (0.0 - 1.0)
    pub volume: f32,

    pub loop_mode: LoopMode,

    pub shuffle: bool,

    /// Mode used when a playlist is enqueued without an explicit mode
    pub default_add_mode: AddMode,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_live_decoders: 10,
            acquire_timeout_ms: Some(5000),
            restart_threshold_ms: 3000,
            volume: 1.0,
            loop_mode: LoopMode::Off,
            shuffle: false,
            default_add_mode: AddMode::Reference,
        }
    }
}

impl PlaybackConfig {
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }

    pub fn restart_threshold(&self) -> Duration {
        Duration::from_millis(self.restart_threshold_ms)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_live_decoders == 0 {
            return Err(PlaybackError::Config(
                "max_live_decoders must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(PlaybackError::Config(format!(
                "volume {} outside 0.0..=1.0",
                self.volume
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PlaybackConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.acquire_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.restart_threshold(), Duration::from_secs(3));
    }

    #[test]
    fn rejects_zero_decoders_and_bad_volume() {
        let mut config = PlaybackConfig {
            max_live_decoders: 0,
            ..PlaybackConfig::default()
        };
        assert!(matches!(config.validate(), Err(PlaybackError::Config(_))));

        config.max_live_decoders = 2;
        config.volume = 1.5;
        assert!(matches!(config.validate(), Err(PlaybackError::Config(_))));

        config.volume = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{ "max_live_decoders": 2, "loop_mode": "all" }"#).unwrap();
        assert_eq!(config.max_live_decoders, 2);
        assert_eq!(config.loop_mode, LoopMode::All);
        assert_eq!(config.restart_threshold_ms, 3000);
        assert_eq!(config.default_add_mode, AddMode::Reference);
    }
}
