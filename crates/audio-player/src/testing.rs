//! In-memory engine, capture backend and event sink used by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use audio_player_types::{AudioSample, PlaybackState, PlayerEvent, StatusUpdate};
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

use crate::capture::{
    CaptureBackend, CaptureDevice, CapturePermission, CaptureSettings, WaveformCallback,
};
use crate::engine::{EngineListener, MediaEngine, MediaSource, PlaybackParameters};
use crate::events::EventSink;

#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    SetSource(String),
    Prepare,
    Play,
    Pause,
    Seek(u64),
    SetVolume(f32),
    SetParameters(PlaybackParameters),
    SetLooping(bool),
}

#[derive(Clone, Debug)]
pub struct FakeEngineState {
    pub playback_state: PlaybackState,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub playing: bool,
    pub loading: bool,
    pub looping: bool,
    pub params: PlaybackParameters,
    pub volume: f32,
    pub audio_session_id: i32,
}

impl Default for FakeEngineState {
    fn default() -> Self {
        Self {
            playback_state: PlaybackState::Idle,
            position_ms: 0,
            duration_ms: None,
            playing: false,
            loading: false,
            looping: false,
            params: PlaybackParameters::default(),
            volume: 1.0,
            audio_session_id: 1,
        }
    }
}

#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<FakeEngineState>,
    calls: Mutex<Vec<EngineCall>>,
    listeners: Mutex<Vec<Arc<dyn EngineListener>>>,
    fail_next: Mutex<Option<String>>,
    released: AtomicBool,
    on_is_playing: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Mutate engine fields without notifying listeners.
    pub fn with(&self, f: impl FnOnce(&mut FakeEngineState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Make the next mutating call fail with `message`.
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    /// Run `hook` every time `is_playing` is read, before the value is returned.
    pub fn on_is_playing(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_is_playing.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Flip the playing flag and notify listeners, as a real engine would.
    pub fn set_playing(&self, playing: bool) {
        self.with(|s| s.playing = playing);
        for listener in self.listeners() {
            listener.on_is_playing_changed(playing);
        }
    }

    pub fn set_playback_state(&self, state: PlaybackState) {
        self.with(|s| s.playback_state = state);
        for listener in self.listeners() {
            listener.on_playback_state_changed(state);
        }
    }

    fn listeners(&self) -> Vec<Arc<dyn EngineListener>> {
        self.listeners.lock().unwrap().clone()
    }

    fn record(&self, call: EngineCall) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match self.fail_next.lock().unwrap().take() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&FakeEngineState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }
}

impl MediaEngine for FakeEngine {
    fn set_media_source(&self, source: MediaSource) -> Result<()> {
        self.record(EngineCall::SetSource(source.uri))
    }

    fn prepare(&self) -> Result<()> {
        self.record(EngineCall::Prepare)
    }

    fn play(&self) -> Result<()> {
        self.record(EngineCall::Play)
    }

    fn pause(&self) -> Result<()> {
        self.record(EngineCall::Pause)
    }

    fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.record(EngineCall::Seek(position_ms))?;
        self.with(|s| s.position_ms = position_ms);
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        self.record(EngineCall::SetVolume(volume))?;
        self.with(|s| s.volume = volume);
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.read(|s| s.volume)
    }

    fn set_playback_parameters(&self, params: PlaybackParameters) -> Result<()> {
        self.record(EngineCall::SetParameters(params))?;
        self.with(|s| s.params = params);
        Ok(())
    }

    fn playback_parameters(&self) -> PlaybackParameters {
        self.read(|s| s.params)
    }

    fn set_looping(&self, looping: bool) -> Result<()> {
        self.record(EngineCall::SetLooping(looping))?;
        self.with(|s| s.looping = looping);
        Ok(())
    }

    fn is_looping(&self) -> bool {
        self.read(|s| s.looping)
    }

    fn playback_state(&self) -> PlaybackState {
        self.read(|s| s.playback_state)
    }

    fn is_playing(&self) -> bool {
        if let Some(hook) = self.on_is_playing.lock().unwrap().as_ref() {
            hook();
        }
        self.read(|s| s.playing)
    }

    fn is_loading(&self) -> bool {
        self.read(|s| s.loading)
    }

    fn position_ms(&self) -> u64 {
        self.read(|s| s.position_ms)
    }

    fn duration_ms(&self) -> Option<u64> {
        self.read(|s| s.duration_ms)
    }

    fn audio_session_id(&self) -> i32 {
        self.read(|s| s.audio_session_id)
    }

    fn add_listener(&self, listener: Arc<dyn EngineListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PlayerEvent>>,
}

impl RecordingSink {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<StatusUpdate> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PlayerEvent::StatusUpdate(update) => Some(update),
                PlayerEvent::AudioSample(_) => None,
            })
            .collect()
    }

    pub fn samples(&self) -> Vec<AudioSample> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PlayerEvent::AudioSample(sample) => Some(sample),
                PlayerEvent::StatusUpdate(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: PlayerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct FakePermission {
    granted: AtomicBool,
}

impl FakePermission {
    pub fn shared(granted: bool) -> Arc<Self> {
        Arc::new(Self {
            granted: AtomicBool::new(granted),
        })
    }

    pub fn set(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

impl CapturePermission for FakePermission {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

/// What the fake backend knows about one opened device.
#[derive(Clone)]
pub struct OpenedDevice {
    pub session_id: i32,
    pub settings: Option<CaptureSettings>,
    pub enabled: bool,
    pub released: bool,
    pub callback: Option<WaveformCallback>,
}

#[derive(Default)]
struct CaptureLog {
    devices: Mutex<Vec<OpenedDevice>>,
    fail_configure: AtomicBool,
}

impl CaptureLog {
    fn update(&self, index: usize, f: impl FnOnce(&mut OpenedDevice)) {
        if let Some(device) = self.devices.lock().unwrap().get_mut(index) {
            f(device);
        }
    }
}

#[derive(Default)]
pub struct FakeCapture {
    log: Arc<CaptureLog>,
}

impl FakeCapture {
    pub const MIN_SIZE: usize = 128;
    pub const MAX_SIZE: usize = 1024;
    pub const MAX_RATE: u32 = 20_000;

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Devices opened so far.
    pub fn opened(&self) -> usize {
        self.log.devices.lock().unwrap().len()
    }

    /// Devices opened and not yet released.
    pub fn live(&self) -> usize {
        self.log
            .devices
            .lock()
            .unwrap()
            .iter()
            .filter(|d| !d.released)
            .count()
    }

    pub fn last_open(&self) -> Option<OpenedDevice> {
        self.log.devices.lock().unwrap().last().cloned()
    }

    pub fn last_callback(&self) -> Option<WaveformCallback> {
        self.last_open().and_then(|d| d.callback)
    }

    pub fn fail_configure(&self, fail: bool) {
        self.log.fail_configure.store(fail, Ordering::SeqCst);
    }
}

impl CaptureBackend for FakeCapture {
    fn capture_size_range(&self) -> (usize, usize) {
        (Self::MIN_SIZE, Self::MAX_SIZE)
    }

    fn max_capture_rate(&self) -> u32 {
        Self::MAX_RATE
    }

    fn open(&self, audio_session_id: i32) -> Result<Box<dyn CaptureDevice>> {
        let mut devices = self.log.devices.lock().unwrap();
        devices.push(OpenedDevice {
            session_id: audio_session_id,
            settings: None,
            enabled: false,
            released: false,
            callback: None,
        });
        Ok(Box::new(FakeDevice {
            index: devices.len() - 1,
            log: self.log.clone(),
        }))
    }
}

struct FakeDevice {
    index: usize,
    log: Arc<CaptureLog>,
}

impl CaptureDevice for FakeDevice {
    fn configure(&mut self, settings: CaptureSettings) -> Result<()> {
        if self.log.fail_configure.load(Ordering::SeqCst) {
            return Err(anyhow!("capture size rejected"));
        }
        self.log.update(self.index, |d| d.settings = Some(settings));
        Ok(())
    }

    fn set_waveform_callback(&mut self, callback: WaveformCallback, _rate_mhz: u32) -> Result<()> {
        self.log.update(self.index, |d| d.callback = Some(callback));
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.log.update(self.index, |d| d.enabled = enabled);
        Ok(())
    }

    fn release(&mut self) {
        self.log.update(self.index, |d| {
            d.enabled = false;
            d.released = true;
        });
    }
}

/// One captured `tracing` event.
#[derive(Clone, Debug)]
pub struct LogLine {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<String>,
}

/// `tracing` layer that keeps every event for later inspection.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl CapturedLogs {
    pub fn subscriber(&self) -> impl Subscriber + Send + Sync + 'static {
        tracing_subscriber::registry().with(self.clone())
    }

    pub fn at_level(&self, level: Level) -> Vec<LogLine> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.level == level)
            .cloned()
            .collect()
    }
}

impl<S> Layer<S> for CapturedLogs
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LogVisitor::default();
        event.record(&mut visitor);
        self.lines.lock().unwrap().push(LogLine {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct LogVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl Visit for LogVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let formatted = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(formatted);
        } else {
            self.fields.push(format!("{}={}", field.name(), formatted));
        }
    }
}
