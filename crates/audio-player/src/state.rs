use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crate::config::PlayerConfig;

/// Player-scoped state shared by the facade and its components.
///
/// The facade is the only writer of everything except `is_playing`, which mirrors the
/// engine and is written by the playback listener. Floats are stored as bits so readers
/// never observe a partial value.
#[derive(Debug)]
pub struct PlayerState {
    id: String,
    muted: AtomicBool,
    previous_volume: AtomicU32,
    preserves_pitch: AtomicBool,
    playback_rate: AtomicU32,
    paused: AtomicBool,
    sampling_enabled: AtomicBool,
    is_playing: AtomicBool,
    update_interval_ms: AtomicU64,
}

impl PlayerState {
    pub fn new(id: impl Into<String>, config: &PlayerConfig) -> Self {
        Self {
            id: id.into(),
            muted: AtomicBool::new(config.muted),
            previous_volume: AtomicU32::new(1.0f32.to_bits()),
            preserves_pitch: AtomicBool::new(config.preserves_pitch),
            playback_rate: AtomicU32::new(clamp_rate(config.playback_rate).to_bits()),
            paused: AtomicBool::new(true),
            sampling_enabled: AtomicBool::new(false),
            is_playing: AtomicBool::new(false),
            update_interval_ms: AtomicU64::new(config.update_interval().as_millis() as u64),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn previous_volume(&self) -> f32 {
        f32::from_bits(self.previous_volume.load(Ordering::Relaxed))
    }

    pub(crate) fn set_previous_volume(&self, volume: f32) {
        self.previous_volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    pub fn preserves_pitch(&self) -> bool {
        self.preserves_pitch.load(Ordering::Relaxed)
    }

    pub fn set_preserves_pitch(&self, preserves: bool) {
        self.preserves_pitch.store(preserves, Ordering::Relaxed);
    }

    pub fn playback_rate(&self) -> f32 {
        f32::from_bits(self.playback_rate.load(Ordering::Relaxed))
    }

    pub fn set_playback_rate(&self, rate: f32) {
        self.playback_rate.store(clamp_rate(rate).to_bits(), Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn sampling_enabled(&self) -> bool {
        self.sampling_enabled.load(Ordering::Relaxed)
    }

    pub fn set_sampling_enabled(&self, enabled: bool) {
        self.sampling_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Engine-observed playing flag (not user intent).
    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    pub(crate) fn set_is_playing(&self, playing: bool) {
        self.is_playing.store(playing, Ordering::Relaxed);
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.load(Ordering::Relaxed))
    }

    pub(crate) fn set_update_interval(&self, interval: Duration) {
        let ms = (interval.as_millis() as u64).max(1);
        self.update_interval_ms.store(ms, Ordering::Relaxed);
    }
}

pub(crate) const MIN_PLAYBACK_RATE: f32 = 0.1;
pub(crate) const MAX_PLAYBACK_RATE: f32 = 2.0;

fn clamp_rate(rate: f32) -> f32 {
    if rate.is_nan() {
        return 1.0;
    }
    rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
}

/// Clamp a requested volume into `[0.0, 1.0]`; absent means full volume.
pub(crate) fn bound_volume(level: Option<f32>) -> f32 {
    match level {
        None => 1.0,
        Some(v) if v.is_nan() => 0.0,
        Some(v) => v.clamp(0.0, 1.0),
    }
}

/// Result of applying a volume write to the current mute state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct VolumeDecision {
    /// Volume to hand to the engine.
    pub engine_volume: f32,
    /// Value to keep for unmute.
    pub previous_volume: f32,
}

/// Volume write semantics.
///
/// Muting is sticky: while muted the engine stays at `0.0` and only the restore value moves.
/// While unmuted, a zero write falls back to the restore value instead of silencing output.
pub(crate) fn decide_volume(level: Option<f32>, muted: bool, previous: f32) -> VolumeDecision {
    let bounded = bound_volume(level);
    let previous_volume = if bounded > 0.0 { bounded } else { previous };
    let engine_volume = if muted {
        0.0
    } else if bounded > 0.0 {
        bounded
    } else {
        previous
    };
    VolumeDecision {
        engine_volume,
        previous_volume,
    }
}
