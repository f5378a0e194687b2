//! Player facade.
//!
//! Owns the engine handle and all player-scoped state, wires the listener, reporter and capture
//! controller together, and exposes the public control surface. Engine mutations are queued onto
//! the media thread; none of these methods block on the engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use audio_player_types::StatusSnapshot;
use tokio::runtime::Handle;

use crate::capture::{CaptureBackend, CaptureController, CaptureOutcome, CapturePermission};
use crate::config::PlayerConfig;
use crate::emitter::StatusEmitter;
use crate::engine::{EngineSlot, MediaEngine, MediaSource, PlaybackParameters};
use crate::events::EventSink;
use crate::listener::PlaybackListener;
use crate::media_queue::{MediaCommand, MediaQueue};
use crate::reporter::PeriodicReporter;
use crate::state::PlayerState;

/// External collaborators a player is built from.
pub struct PlayerParts {
    pub engine: Arc<dyn MediaEngine>,
    pub capture: Arc<dyn CaptureBackend>,
    pub permission: Arc<dyn CapturePermission>,
    pub sink: Arc<dyn EventSink>,
}

pub struct AudioPlayer {
    state: Arc<PlayerState>,
    engine: EngineSlot,
    emitter: StatusEmitter,
    media: MediaQueue,
    reporter: PeriodicReporter,
    capture: CaptureController,
    released: AtomicBool,
}

impl AudioPlayer {
    /// Build a player around `parts.engine`.
    ///
    /// Must be called from within a tokio runtime; the periodic reporter runs on it.
    pub fn new(parts: PlayerParts, config: PlayerConfig) -> Result<Self> {
        let runtime = Handle::try_current().context("audio player requires a tokio runtime")?;
        let state = Arc::new(PlayerState::new(uuid::Uuid::new_v4().to_string(), &config));
        state.set_is_playing(parts.engine.is_playing());
        let engine = EngineSlot::new(parts.engine.clone());
        let emitter = StatusEmitter::new(engine.clone(), state.clone(), parts.sink);

        parts
            .engine
            .add_listener(Arc::new(PlaybackListener::new(emitter.clone())));
        let media = MediaQueue::spawn(engine.clone(), state.clone())?;
        let reporter = PeriodicReporter::new(runtime, emitter.clone());
        let capture = CaptureController::new(parts.capture, parts.permission, emitter.clone());

        let player = Self {
            state,
            engine,
            emitter,
            media,
            reporter,
            capture,
            released: AtomicBool::new(false),
        };

        player.media.send(MediaCommand::SetLooping(config.looping));
        player.apply_playback_parameters();
        player.media.send(MediaCommand::SetVolume {
            level: Some(config.volume),
        });
        tracing::info!(player_id = %player.id(), "audio player created");

        if let Some(uri) = config.source.as_deref() {
            player.set_media_source(MediaSource::new(uri));
        }
        Ok(player)
    }

    pub fn id(&self) -> &str {
        self.state.id()
    }

    /// Attach `source`, prepare it, and restart periodic reporting.
    pub fn set_media_source(&self, source: MediaSource) {
        if self.guard_released("set_media_source") {
            return;
        }
        self.media.send(MediaCommand::SetSource(source));
        self.reporter.start();
    }

    /// Set the output volume; `None` means full volume.
    ///
    /// While muted only the restore value changes. While unmuted a zero write restores the
    /// previous non-zero volume instead of silencing output.
    pub fn set_volume(&self, level: Option<f32>) {
        if self.guard_released("set_volume") {
            return;
        }
        self.media.send(MediaCommand::SetVolume { level });
    }

    pub fn set_muted(&self, muted: bool) {
        if self.guard_released("set_muted") {
            return;
        }
        self.state.set_muted(muted);
        self.media.send(MediaCommand::ApplyMute);
    }

    pub fn is_muted(&self) -> bool {
        self.state.is_muted()
    }

    /// Volume restored on unmute.
    pub fn previous_volume(&self) -> f32 {
        self.state.previous_volume()
    }

    /// Turn waveform sampling on or off.
    ///
    /// Enabling without capture permission is a logged no-op. Disabling always succeeds.
    pub fn set_sampling_enabled(&self, enabled: bool) {
        if self.guard_released("set_sampling_enabled") {
            return;
        }
        if !enabled {
            self.state.set_sampling_enabled(false);
            self.capture.disable();
            return;
        }
        if !self.capture.is_permitted() {
            tracing::warn!(
                player_id = %self.id(),
                "signal capture permission not granted; audio sampling unavailable"
            );
            return;
        }
        self.state.set_sampling_enabled(true);
        match self.capture.enable() {
            CaptureOutcome::Created | CaptureOutcome::AlreadyActive => {}
            outcome => {
                tracing::debug!(player_id = %self.id(), ?outcome, "waveform capture not started");
            }
        }
    }

    pub fn is_sampling_enabled(&self) -> bool {
        self.state.sampling_enabled()
    }

    /// `true` while a capture device is open.
    pub fn is_capturing(&self) -> bool {
        self.capture.is_active()
    }

    pub fn play(&self) {
        if self.guard_released("play") {
            return;
        }
        self.state.set_paused(false);
        self.media.send(MediaCommand::Play);
    }

    pub fn pause(&self) {
        if self.guard_released("pause") {
            return;
        }
        self.state.set_paused(true);
        self.media.send(MediaCommand::Pause);
    }

    /// User intent: `true` until `play` is called and after `pause`.
    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    /// Seek to `seconds`; negative values seek to the start.
    pub fn seek_to(&self, seconds: f64) {
        if self.guard_released("seek_to") {
            return;
        }
        let position_ms = if seconds.is_finite() && seconds > 0.0 {
            (seconds * 1000.0).round() as u64
        } else {
            0
        };
        self.media.send(MediaCommand::Seek { position_ms });
    }

    pub fn set_playback_rate(&self, rate: f32) {
        if self.guard_released("set_playback_rate") {
            return;
        }
        self.state.set_playback_rate(rate);
        self.apply_playback_parameters();
    }

    pub fn set_preserves_pitch(&self, preserves: bool) {
        if self.guard_released("set_preserves_pitch") {
            return;
        }
        self.state.set_preserves_pitch(preserves);
        self.apply_playback_parameters();
    }

    pub fn set_loop(&self, looping: bool) {
        if self.guard_released("set_loop") {
            return;
        }
        self.media.send(MediaCommand::SetLooping(looping));
    }

    /// Change the reporting interval; restarts the reporter if it is running.
    pub fn set_update_interval(&self, interval: Duration) {
        if self.guard_released("set_update_interval") {
            return;
        }
        if interval.is_zero() {
            tracing::warn!(player_id = %self.id(), "ignoring zero update interval");
            return;
        }
        self.state.set_update_interval(interval);
        if self.reporter.is_running() {
            self.reporter.start();
        }
    }

    pub fn update_interval(&self) -> Duration {
        self.state.update_interval()
    }

    /// Fresh snapshot of the engine, or the released default. Never fails.
    pub fn current_status(&self) -> StatusSnapshot {
        self.emitter.snapshot()
    }

    /// Block until every queued engine command has been applied.
    pub fn flush(&self) {
        self.media.sync();
    }

    pub fn is_reporting(&self) -> bool {
        self.reporter.is_running()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Stop reporting, drop the capture device and release the engine. Idempotent.
    ///
    /// Cancels in-flight work without waiting for it.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.reporter.stop();
        self.capture.disable();
        if let Some(engine) = self.engine.take() {
            if !self.media.send(MediaCommand::Release(Some(engine.clone()))) {
                engine.release();
            }
        }
        tracing::info!(player_id = %self.id(), "audio player released");
    }

    fn apply_playback_parameters(&self) {
        let params =
            PlaybackParameters::for_rate(self.state.playback_rate(), self.state.preserves_pitch());
        self.media.send(MediaCommand::SetPlaybackParameters(params));
    }

    fn guard_released(&self, op: &'static str) -> bool {
        let released = self.is_released();
        if released {
            tracing::debug!(player_id = %self.id(), op, "player released; ignoring call");
        }
        released
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.release();
    }
}
