use std::time::Duration;

use serde::Deserialize;

use crate::events::DEFAULT_EVENT_CAPACITY;

/// Default interval between periodic status reports.
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 500;

/// Player tuning parameters.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Interval between periodic status reports while playing.
    pub update_interval_ms: u64,
    /// Keep pitch constant when the playback rate changes.
    pub preserves_pitch: bool,
    /// Initial volume (clamped to `0.0..=1.0`).
    pub volume: f32,
    /// Start muted.
    pub muted: bool,
    /// Initial playback rate.
    pub playback_rate: f32,
    /// Repeat the current item.
    pub looping: bool,
    /// Media attached at construction, if any.
    pub source: Option<String>,
    /// Buffered events per subscriber before slow receivers start lagging.
    pub event_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            preserves_pitch: true,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            looping: false,
            source: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl PlayerConfig {
    /// Reporting interval; a zero value falls back to the default.
    pub fn update_interval(&self) -> Duration {
        if self.update_interval_ms == 0 {
            tracing::warn!("update_interval_ms is 0; using {DEFAULT_UPDATE_INTERVAL_MS}ms");
            return Duration::from_millis(DEFAULT_UPDATE_INTERVAL_MS);
        }
        Duration::from_millis(self.update_interval_ms)
    }
}
