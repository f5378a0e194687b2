//! Engine callbacks to status emissions.
//!
//! The engine owns the state machine; this listener only observes transitions and turns each
//! one into a `playback-status-update` event carrying a fresh snapshot plus the changed field.

use audio_player_types::{PlaybackState, StatusOverlay};

use crate::emitter::StatusEmitter;
use crate::engine::{EngineListener, MediaItemTransitionReason};

pub struct PlaybackListener {
    emitter: StatusEmitter,
}

impl PlaybackListener {
    pub fn new(emitter: StatusEmitter) -> Self {
        Self { emitter }
    }
}

impl EngineListener for PlaybackListener {
    fn on_is_playing_changed(&self, is_playing: bool) {
        self.emitter.state().set_is_playing(is_playing);
        tracing::debug!(
            player_id = %self.emitter.state().id(),
            is_playing,
            "engine playing changed"
        );
        self.emitter.emit_status(StatusOverlay::playing(is_playing));
    }

    fn on_is_loading_changed(&self, is_loading: bool) {
        self.emitter.emit_status(StatusOverlay::loaded(!is_loading));
    }

    fn on_playback_state_changed(&self, state: PlaybackState) {
        tracing::debug!(
            player_id = %self.emitter.state().id(),
            state = %state,
            "engine playback state changed"
        );
        self.emitter.emit_status(StatusOverlay::state(state));
    }

    fn on_media_item_transition(&self, reason: MediaItemTransitionReason) {
        tracing::debug!(player_id = %self.emitter.state().id(), ?reason, "media item transition");
        self.emitter.emit_status(StatusOverlay::default());
    }

    fn on_player_error(&self, message: &str) {
        tracing::warn!(player_id = %self.emitter.state().id(), error = message, "engine error");
        self.emitter.emit_status(StatusOverlay::error(message));
    }
}
