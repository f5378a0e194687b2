use std::sync::Arc;

use audio_player_types::{AudioSample, PlayerEvent, StatusOverlay, StatusSnapshot, StatusUpdate};

use crate::engine::{EngineSlot, MediaEngine};
use crate::events::EventSink;
use crate::state::PlayerState;
use crate::status;

/// Capability to read the engine and publish events.
///
/// Handed to the listener, reporter and capture callback instead of the facade itself.
#[derive(Clone)]
pub struct StatusEmitter {
    engine: EngineSlot,
    state: Arc<PlayerState>,
    sink: Arc<dyn EventSink>,
}

impl StatusEmitter {
    pub fn new(engine: EngineSlot, state: Arc<PlayerState>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            engine,
            state,
            sink,
        }
    }

    pub fn state(&self) -> &Arc<PlayerState> {
        &self.state
    }

    pub fn engine(&self) -> Option<Arc<dyn MediaEngine>> {
        self.engine.get()
    }

    /// Current snapshot, or the released default.
    pub fn snapshot(&self) -> StatusSnapshot {
        status::snapshot_or_released(&self.engine, &self.state)
    }

    /// Emit a fresh snapshot with `overlay` on top. Returns `false` once released.
    pub fn emit_status(&self, overlay: StatusOverlay) -> bool {
        if self.engine.is_empty() {
            return false;
        }
        let update = StatusUpdate::new(self.snapshot(), overlay);
        self.sink.emit(PlayerEvent::StatusUpdate(update));
        true
    }

    /// Emit amplitudes stamped with the current player position. Returns `false` once released.
    pub fn emit_sample(&self, frames: Vec<f32>) -> bool {
        let Some(engine) = self.engine.get() else {
            return false;
        };
        let timestamp = engine.position_ms() as f64 / 1000.0;
        self.sink
            .emit(PlayerEvent::AudioSample(AudioSample::mono(frames, timestamp)));
        true
    }
}
