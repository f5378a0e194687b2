use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event name used for every playback status emission.
pub const PLAYBACK_STATUS_UPDATE: &str = "playback-status-update";
/// Event name used for waveform amplitude emissions.
pub const AUDIO_SAMPLE_UPDATE: &str = "audio-sample-update";

/// Playback state as reported by the underlying media engine.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No media attached, or the engine has not been prepared.
    #[default]
    Idle,
    /// The engine is waiting for data before it can play.
    Buffering,
    /// Media is prepared and can start immediately.
    Ready,
    /// Playback reached the end of the current item.
    Ended,
}

impl PlaybackState {
    /// Wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Buffering => "buffering",
            PlaybackState::Ready => "ready",
            PlaybackState::Ended => "ended",
        }
    }

    /// `true` once media is loaded, which includes the ended state.
    pub fn is_loaded(&self) -> bool {
        matches!(self, PlaybackState::Ready | PlaybackState::Ended)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time readout of a player.
///
/// Built fresh for every emission; never cached by the runtime.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Player identifier.
    pub id: String,
    /// Current position in seconds.
    pub current_time: f64,
    /// Media duration in seconds, `0.0` when unknown.
    pub duration: f64,
    /// Engine playback state.
    pub playback_state: PlaybackState,
    /// `true` while the engine reports audible playback.
    pub playing: bool,
    /// Player mute flag.
    pub mute: bool,
    /// `true` when the current item repeats.
    #[serde(rename = "loop")]
    pub looping: bool,
    /// `true` while the engine is buffering.
    pub is_buffering: bool,
    /// `true` when the item just reached its end.
    pub did_just_finish: bool,
    /// `true` when media is ready or has ended.
    pub is_loaded: bool,
    /// Playback speed multiplier.
    pub playback_rate: f32,
    /// Whether pitch correction is applied at non-unit rates.
    pub should_correct_pitch: bool,
}

impl StatusSnapshot {
    /// Snapshot returned once the engine handle is gone.
    pub fn released(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            playback_rate: 1.0,
            ..Self::default()
        }
    }
}

/// Fields merged over a snapshot for a single emission.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusOverlay {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_loaded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_state: Option<PlaybackState>,
    /// Engine error message, passed through unmodified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusOverlay {
    pub fn playing(playing: bool) -> Self {
        Self {
            playing: Some(playing),
            ..Self::default()
        }
    }

    pub fn loaded(is_loaded: bool) -> Self {
        Self {
            is_loaded: Some(is_loaded),
            ..Self::default()
        }
    }

    pub fn state(state: PlaybackState) -> Self {
        Self {
            playback_state: Some(state),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.playing.is_none()
            && self.is_loaded.is_none()
            && self.playback_state.is_none()
            && self.error.is_none()
    }
}

/// A status emission: a full snapshot plus zero or more overlay fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusUpdate {
    pub snapshot: StatusSnapshot,
    pub overlay: StatusOverlay,
}

impl StatusUpdate {
    pub fn new(snapshot: StatusSnapshot, overlay: StatusOverlay) -> Self {
        Self { snapshot, overlay }
    }

    /// Snapshot with the overlay fields applied.
    ///
    /// The `error` field has no snapshot counterpart and is only visible in [`Self::payload`].
    pub fn resolved(&self) -> StatusSnapshot {
        let mut snap = self.snapshot.clone();
        if let Some(playing) = self.overlay.playing {
            snap.playing = playing;
        }
        if let Some(is_loaded) = self.overlay.is_loaded {
            snap.is_loaded = is_loaded;
        }
        if let Some(state) = self.overlay.playback_state {
            snap.playback_state = state;
        }
        snap
    }

    /// JSON object delivered to subscribers: snapshot keys, then overlay keys on top.
    pub fn payload(&self) -> Value {
        let mut merged = match serde_json::to_value(&self.snapshot) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if let Ok(Value::Object(overlay)) = serde_json::to_value(&self.overlay) {
            merged.extend(overlay);
        }
        Value::Object(merged)
    }
}

/// Frames captured for one channel, each in `[-1.0, 1.0]`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SampleChannel {
    pub frames: Vec<f32>,
}

/// Waveform amplitudes captured while playing.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioSample {
    pub channels: Vec<SampleChannel>,
    /// Player position in seconds when the waveform was captured.
    pub timestamp: f64,
}

impl AudioSample {
    /// Single-channel sample, which is what waveform capture devices deliver.
    pub fn mono(frames: Vec<f32>, timestamp: f64) -> Self {
        Self {
            channels: vec![SampleChannel { frames }],
            timestamp,
        }
    }
}

/// Named event delivered to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    StatusUpdate(StatusUpdate),
    AudioSample(AudioSample),
}

impl PlayerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::StatusUpdate(_) => PLAYBACK_STATUS_UPDATE,
            PlayerEvent::AudioSample(_) => AUDIO_SAMPLE_UPDATE,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            PlayerEvent::StatusUpdate(update) => update.payload(),
            PlayerEvent::AudioSample(sample) => {
                serde_json::to_value(sample).unwrap_or(Value::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_snapshot() -> StatusSnapshot {
        StatusSnapshot {
            id: "p1".to_string(),
            current_time: 1.5,
            duration: 10.0,
            playback_state: PlaybackState::Ready,
            playing: false,
            is_loaded: true,
            playback_rate: 1.0,
            should_correct_pitch: true,
            ..StatusSnapshot::default()
        }
    }

    #[test]
    fn snapshot_serializes_camel_case_keys() {
        let value = serde_json::to_value(ready_snapshot()).unwrap();
        assert_eq!(value["currentTime"], 1.5);
        assert_eq!(value["playbackState"], "ready");
        assert_eq!(value["loop"], false);
        assert_eq!(value["didJustFinish"], false);
        assert_eq!(value["shouldCorrectPitch"], true);
        assert!(value.get("looping").is_none());
    }

    #[test]
    fn payload_merges_overlay_over_snapshot() {
        let update = StatusUpdate::new(ready_snapshot(), StatusOverlay::playing(true));
        let payload = update.payload();
        assert_eq!(payload["playing"], true);
        assert_eq!(payload["duration"], 10.0);
        assert!(payload.get("error").is_none());
    }

    #[test]
    fn payload_passes_error_through() {
        let update = StatusUpdate::new(ready_snapshot(), StatusOverlay::error("source stalled"));
        assert_eq!(update.payload()["error"], "source stalled");
        assert_eq!(update.resolved(), ready_snapshot());
    }

    #[test]
    fn resolved_applies_typed_overlay() {
        let overlay = StatusOverlay {
            is_loaded: Some(false),
            playback_state: Some(PlaybackState::Buffering),
            ..StatusOverlay::default()
        };
        let resolved = StatusUpdate::new(ready_snapshot(), overlay).resolved();
        assert!(!resolved.is_loaded);
        assert_eq!(resolved.playback_state, PlaybackState::Buffering);
    }

    #[test]
    fn empty_overlay_payload_is_the_snapshot() {
        let update = StatusUpdate::new(ready_snapshot(), StatusOverlay::default());
        assert!(update.overlay.is_empty());
        assert_eq!(update.payload(), serde_json::to_value(ready_snapshot()).unwrap());
    }

    #[test]
    fn audio_sample_event_shape() {
        let event = PlayerEvent::AudioSample(AudioSample::mono(vec![0.0, -1.0], 2.25));
        assert_eq!(event.name(), AUDIO_SAMPLE_UPDATE);
        let payload = event.payload();
        assert_eq!(payload["timestamp"], 2.25);
        assert_eq!(payload["channels"][0]["frames"][1], -1.0);
    }

    #[test]
    fn released_snapshot_is_idle_and_empty() {
        let snap = StatusSnapshot::released("gone");
        assert_eq!(snap.playback_state, PlaybackState::Idle);
        assert_eq!(snap.duration, 0.0);
        assert!(!snap.is_loaded);
        assert_eq!(snap.playback_rate, 1.0);
    }
}
