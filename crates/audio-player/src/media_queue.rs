//! Media thread.
//!
//! Engines are not safe for concurrent writes, so every mutation is queued onto one worker
//! thread and applied in order. Callers never wait for a command to complete.

use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};

use crate::engine::{EngineSlot, MediaEngine, MediaSource, PlaybackParameters};
use crate::state::{PlayerState, decide_volume};

/// Commands applied on the media thread.
pub(crate) enum MediaCommand {
    SetSource(MediaSource),
    Play,
    Pause,
    Seek { position_ms: u64 },
    SetVolume { level: Option<f32> },
    /// Push the current mute state to the engine.
    ApplyMute,
    SetPlaybackParameters(PlaybackParameters),
    SetLooping(bool),
    /// Acknowledge once every earlier command has been applied.
    Sync(Sender<()>),
    /// Release the engine (already removed from the slot) and exit.
    Release(Option<Arc<dyn MediaEngine>>),
}

/// Handle for queueing commands onto the media thread.
#[derive(Clone)]
pub(crate) struct MediaQueue {
    cmd_tx: Sender<MediaCommand>,
}

impl MediaQueue {
    /// Spawn the media thread.
    pub(crate) fn spawn(engine: EngineSlot, state: Arc<PlayerState>) -> Result<Self> {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let name = format!("audio-player-media-{}", short_id(state.id()));
        std::thread::Builder::new()
            .name(name)
            .spawn(move || media_thread_main(engine, state, cmd_rx))
            .context("spawn media thread")?;
        Ok(Self { cmd_tx })
    }

    /// Queue a command. Returns `false` when the media thread has exited.
    pub(crate) fn send(&self, cmd: MediaCommand) -> bool {
        self.cmd_tx.send(cmd).is_ok()
    }

    /// Block until all previously queued commands have been applied.
    pub(crate) fn sync(&self) {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.send(MediaCommand::Sync(ack_tx)) {
            let _ = ack_rx.recv();
        }
    }
}

/// Main loop for the media thread.
fn media_thread_main(engine: EngineSlot, state: Arc<PlayerState>, cmd_rx: Receiver<MediaCommand>) {
    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            MediaCommand::Sync(ack) => {
                let _ = ack.send(());
            }
            MediaCommand::Release(released) => {
                if let Some(released) = released {
                    released.release();
                }
                tracing::info!(player_id = %state.id(), "engine released");
                break;
            }
            cmd => {
                let Some(engine) = engine.get() else {
                    tracing::debug!(player_id = %state.id(), "engine released; command dropped");
                    continue;
                };
                if let Err(e) = apply(engine.as_ref(), &state, cmd) {
                    tracing::warn!(player_id = %state.id(), "engine command failed: {e:#}");
                }
            }
        }
    }
}

fn apply(engine: &dyn MediaEngine, state: &PlayerState, cmd: MediaCommand) -> Result<()> {
    match cmd {
        MediaCommand::SetSource(source) => {
            tracing::info!(player_id = %state.id(), uri = %source.uri, "media source set");
            engine.set_media_source(source).context("set media source")?;
            engine.prepare().context("prepare")
        }
        MediaCommand::Play => engine.play().context("play"),
        MediaCommand::Pause => engine.pause().context("pause"),
        MediaCommand::Seek { position_ms } => engine.seek_to(position_ms).context("seek"),
        MediaCommand::SetVolume { level } => {
            let decision = decide_volume(level, state.is_muted(), state.previous_volume());
            state.set_previous_volume(decision.previous_volume);
            engine.set_volume(decision.engine_volume).context("set volume")
        }
        MediaCommand::ApplyMute => {
            let volume = if state.is_muted() {
                0.0
            } else {
                state.previous_volume()
            };
            engine.set_volume(volume).context("apply mute")
        }
        MediaCommand::SetPlaybackParameters(params) => engine
            .set_playback_parameters(params)
            .context("set playback parameters"),
        MediaCommand::SetLooping(looping) => engine.set_looping(looping).context("set looping"),
        MediaCommand::Sync(_) | MediaCommand::Release(_) => Ok(()),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
