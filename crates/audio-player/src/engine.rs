//! Media engine seam.
//!
//! The runtime never decodes audio itself. It drives an engine through [`MediaEngine`] and
//! observes it through [`EngineListener`] callbacks. Engines are expected to synchronize their
//! own fields internally, so simple getters may be called from any thread.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use anyhow::Result;
pub use audio_player_types::PlaybackState;

/// Media item handed to the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaSource {
    /// Location of the media (file path, URL, asset name).
    pub uri: String,
    /// Extra request headers for remote sources.
    pub headers: BTreeMap<String, String>,
}

impl MediaSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Speed and pitch applied by the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackParameters {
    pub speed: f32,
    pub pitch: f32,
}

impl PlaybackParameters {
    /// Parameters for `rate`; pitch stays at `1.0` when pitch is preserved.
    pub fn for_rate(rate: f32, preserves_pitch: bool) -> Self {
        Self {
            speed: rate,
            pitch: if preserves_pitch { 1.0 } else { rate },
        }
    }
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 1.0,
        }
    }
}

/// Why the engine moved to another media item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaItemTransitionReason {
    Repeat,
    Auto,
    Seek,
    PlaylistChanged,
}

/// Playback primitive wrapped by the player.
///
/// Mutating calls are only ever issued from the player's media thread.
pub trait MediaEngine: Send + Sync {
    fn set_media_source(&self, source: MediaSource) -> Result<()>;
    fn prepare(&self) -> Result<()>;
    fn play(&self) -> Result<()>;
    fn pause(&self) -> Result<()>;
    fn seek_to(&self, position_ms: u64) -> Result<()>;
    fn set_volume(&self, volume: f32) -> Result<()>;
    fn volume(&self) -> f32;
    fn set_playback_parameters(&self, params: PlaybackParameters) -> Result<()>;
    fn playback_parameters(&self) -> PlaybackParameters;
    fn set_looping(&self, looping: bool) -> Result<()>;
    fn is_looping(&self) -> bool;
    fn playback_state(&self) -> PlaybackState;
    fn is_playing(&self) -> bool;
    fn is_loading(&self) -> bool;
    /// Current position in milliseconds (`0` before a source is attached).
    fn position_ms(&self) -> u64;
    /// Duration in milliseconds, `None` while unknown.
    fn duration_ms(&self) -> Option<u64>;
    /// Audio session the capture device attaches to.
    fn audio_session_id(&self) -> i32;
    fn add_listener(&self, listener: Arc<dyn EngineListener>);
    fn release(&self);
}

/// Lifecycle callbacks raised by the engine.
pub trait EngineListener: Send + Sync {
    fn on_is_playing_changed(&self, is_playing: bool);
    fn on_is_loading_changed(&self, is_loading: bool);
    fn on_playback_state_changed(&self, state: PlaybackState);
    fn on_media_item_transition(&self, reason: MediaItemTransitionReason);
    fn on_player_error(&self, message: &str);
}

/// Shared optional engine handle.
///
/// Emptied exactly once, on release. Readers clone the `Arc` out and never hold the lock
/// across engine calls.
#[derive(Clone)]
pub struct EngineSlot {
    inner: Arc<RwLock<Option<Arc<dyn MediaEngine>>>>,
}

impl EngineSlot {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(engine))),
        }
    }

    pub fn get(&self) -> Option<Arc<dyn MediaEngine>> {
        self.inner.read().ok().and_then(|guard| guard.clone())
    }

    pub fn take(&self) -> Option<Arc<dyn MediaEngine>> {
        self.inner.write().ok().and_then(|mut guard| guard.take())
    }

    pub fn is_empty(&self) -> bool {
        self.get().is_none()
    }
}
