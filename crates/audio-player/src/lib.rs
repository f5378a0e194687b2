//! Audio player runtime.
//!
//! Wraps a [`MediaEngine`] with status reporting, waveform sampling and a small control surface.
//! Events are published through an [`EventSink`]; [`EventBus`] is the in-process default.

pub mod amplitude;
pub mod capture;
pub mod config;
pub mod emitter;
pub mod engine;
pub mod events;
pub mod listener;
mod media_queue;
pub mod player;
pub mod reporter;
pub mod state;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use audio_player_types as types;
pub use capture::{
    CaptureBackend, CaptureDevice, CaptureOutcome, CapturePermission, CaptureSettings,
    WaveformCallback,
};
pub use config::PlayerConfig;
pub use engine::{
    EngineListener, MediaEngine, MediaItemTransitionReason, MediaSource, PlaybackParameters,
    PlaybackState,
};
pub use events::{EventBus, EventSink, PlayerEvent};
pub use player::{AudioPlayer, PlayerParts};
