//! Status snapshots built from live engine fields.

use audio_player_types::{PlaybackState, StatusSnapshot};

use crate::engine::{EngineSlot, MediaEngine};
use crate::state::PlayerState;

/// Player-owned fields that appear in a snapshot next to the engine's.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnapshotFlags {
    pub muted: bool,
    pub preserves_pitch: bool,
}

impl SnapshotFlags {
    pub fn from_state(state: &PlayerState) -> Self {
        Self {
            muted: state.is_muted(),
            preserves_pitch: state.preserves_pitch(),
        }
    }
}

/// Read the engine and build a fresh snapshot.
///
/// Every field is read at call time; callers must not cache the result across emissions.
pub fn build_snapshot(id: &str, engine: &dyn MediaEngine, flags: SnapshotFlags) -> StatusSnapshot {
    let playback_state = engine.playback_state();
    let duration = engine
        .duration_ms()
        .filter(|ms| *ms > 0)
        .map(ms_to_seconds)
        .unwrap_or(0.0);
    StatusSnapshot {
        id: id.to_string(),
        current_time: ms_to_seconds(engine.position_ms()),
        duration,
        playback_state,
        playing: engine.is_playing(),
        mute: flags.muted,
        looping: engine.is_looping(),
        is_buffering: playback_state == PlaybackState::Buffering,
        did_just_finish: playback_state == PlaybackState::Ended,
        is_loaded: playback_state.is_loaded(),
        playback_rate: engine.playback_parameters().speed,
        should_correct_pitch: flags.preserves_pitch,
    }
}

/// Snapshot for the player, or the released default once the engine is gone.
pub fn snapshot_or_released(engine: &EngineSlot, state: &PlayerState) -> StatusSnapshot {
    match engine.get() {
        Some(engine) => {
            build_snapshot(state.id(), engine.as_ref(), SnapshotFlags::from_state(state))
        }
        None => StatusSnapshot::released(state.id()),
    }
}

fn ms_to_seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}
