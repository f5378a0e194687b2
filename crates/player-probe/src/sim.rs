//! Simulated engine and capture backend.
//!
//! The engine keeps a wall clock that advances while playing, scaled by the playback speed.
//! The capture backend produces a sine waveform at the configured callback rate.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use audio_player::{
    CaptureBackend, CaptureDevice, CapturePermission, CaptureSettings, EngineListener,
    MediaEngine, MediaItemTransitionReason, MediaSource, PlaybackParameters, PlaybackState,
    WaveformCallback,
};

const SIM_AUDIO_SESSION: i32 = 7;
const SIM_SAMPLE_RATE: f32 = 44_100.0;

/// Listener notifications collected under the state lock and delivered after it is dropped.
enum Notice {
    Playing(bool),
    Loading(bool),
    State(PlaybackState),
    Transition(MediaItemTransitionReason),
}

struct SimState {
    source: Option<MediaSource>,
    playback_state: PlaybackState,
    playing: bool,
    loading: bool,
    volume: f32,
    params: PlaybackParameters,
    looping: bool,
    base_position_ms: u64,
    started_at: Option<Instant>,
    duration_ms: Option<u64>,
    released: bool,
}

impl SimState {
    fn position_ms(&self) -> u64 {
        let elapsed = self
            .started_at
            .map(|t| (t.elapsed().as_secs_f64() * 1000.0 * self.params.speed as f64) as u64)
            .unwrap_or(0);
        let position = self.base_position_ms + elapsed;
        match self.duration_ms {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    /// Freeze the clock at the current position.
    fn rebase(&mut self) {
        self.base_position_ms = self.position_ms();
        self.started_at = self.playing.then(Instant::now);
    }
}

pub struct SimEngine {
    state: Mutex<SimState>,
    listeners: Mutex<Vec<Arc<dyn EngineListener>>>,
    track_length: Duration,
}

impl SimEngine {
    pub fn new(track_length: Duration) -> Self {
        Self {
            state: Mutex::new(SimState {
                source: None,
                playback_state: PlaybackState::Idle,
                playing: false,
                loading: false,
                volume: 1.0,
                params: PlaybackParameters::default(),
                looping: false,
                base_position_ms: 0,
                started_at: None,
                duration_ms: None,
                released: false,
            }),
            listeners: Mutex::new(Vec::new()),
            track_length,
        }
    }

    /// Advance end-of-track handling. Returns `true` when the track has just ended.
    pub fn tick(&self) -> bool {
        let mut notices = Vec::new();
        let ended = {
            let Ok(mut s) = self.state.lock() else {
                return false;
            };
            let at_end = s.playing && s.duration_ms.is_some_and(|d| s.position_ms() >= d);
            if at_end && s.looping {
                s.base_position_ms = 0;
                s.started_at = Some(Instant::now());
                notices.push(Notice::Transition(MediaItemTransitionReason::Repeat));
                false
            } else if at_end {
                s.base_position_ms = s.duration_ms.unwrap_or(0);
                s.started_at = None;
                s.playing = false;
                s.playback_state = PlaybackState::Ended;
                notices.push(Notice::Playing(false));
                notices.push(Notice::State(PlaybackState::Ended));
                true
            } else {
                false
            }
        };
        self.notify(notices);
        ended
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimState>> {
        let guard = self
            .state
            .lock()
            .map_err(|_| anyhow!("sim engine state poisoned"))?;
        if guard.released {
            return Err(anyhow!("sim engine released"));
        }
        Ok(guard)
    }

    fn read<T: Default>(&self, f: impl FnOnce(&SimState) -> T) -> T {
        self.state.lock().map(|s| f(&s)).unwrap_or_default()
    }

    fn notify(&self, notices: Vec<Notice>) {
        if notices.is_empty() {
            return;
        }
        let listeners = match self.listeners.lock() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };
        for notice in notices {
            for listener in &listeners {
                match notice {
                    Notice::Playing(playing) => listener.on_is_playing_changed(playing),
                    Notice::Loading(loading) => listener.on_is_loading_changed(loading),
                    Notice::State(state) => listener.on_playback_state_changed(state),
                    Notice::Transition(reason) => listener.on_media_item_transition(reason),
                }
            }
        }
    }
}

impl MediaEngine for SimEngine {
    fn set_media_source(&self, source: MediaSource) -> Result<()> {
        tracing::debug!(
            uri = %source.uri,
            headers = ?source.headers.keys().collect::<Vec<_>>(),
            "sim source attached"
        );
        let mut notices = Vec::new();
        {
            let mut s = self.lock()?;
            if s.playing {
                notices.push(Notice::Playing(false));
            }
            s.source = Some(source);
            s.playing = false;
            s.started_at = None;
            s.base_position_ms = 0;
            s.duration_ms = None;
            s.playback_state = PlaybackState::Idle;
            notices.push(Notice::Transition(MediaItemTransitionReason::PlaylistChanged));
        }
        self.notify(notices);
        Ok(())
    }

    fn prepare(&self) -> Result<()> {
        {
            let mut s = self.lock()?;
            if s.source.is_none() {
                return Err(anyhow!("no media source"));
            }
            s.loading = true;
            s.playback_state = PlaybackState::Buffering;
        }
        self.notify(vec![
            Notice::Loading(true),
            Notice::State(PlaybackState::Buffering),
        ]);
        {
            let mut s = self.lock()?;
            s.loading = false;
            s.duration_ms = Some(self.track_length.as_millis() as u64);
            s.playback_state = PlaybackState::Ready;
        }
        self.notify(vec![
            Notice::Loading(false),
            Notice::State(PlaybackState::Ready),
        ]);
        Ok(())
    }

    fn play(&self) -> Result<()> {
        let mut notices = Vec::new();
        {
            let mut s = self.lock()?;
            if s.source.is_none() {
                return Err(anyhow!("no media source"));
            }
            if s.playing {
                return Ok(());
            }
            if s.playback_state == PlaybackState::Ended {
                s.base_position_ms = 0;
                s.playback_state = PlaybackState::Ready;
                notices.push(Notice::State(PlaybackState::Ready));
            }
            s.playing = true;
            s.started_at = Some(Instant::now());
            notices.push(Notice::Playing(true));
        }
        self.notify(notices);
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        {
            let mut s = self.lock()?;
            if !s.playing {
                return Ok(());
            }
            s.rebase();
            s.playing = false;
            s.started_at = None;
        }
        self.notify(vec![Notice::Playing(false)]);
        Ok(())
    }

    fn seek_to(&self, position_ms: u64) -> Result<()> {
        let mut notices = Vec::new();
        {
            let mut s = self.lock()?;
            let target = s.duration_ms.map_or(position_ms, |d| position_ms.min(d));
            s.base_position_ms = target;
            s.started_at = s.playing.then(Instant::now);
            if s.playback_state == PlaybackState::Ended {
                s.playback_state = PlaybackState::Ready;
                notices.push(Notice::State(PlaybackState::Ready));
            }
        }
        self.notify(notices);
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        self.lock()?.volume = volume;
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.read(|s| s.volume)
    }

    fn set_playback_parameters(&self, params: PlaybackParameters) -> Result<()> {
        let mut s = self.lock()?;
        s.rebase();
        s.params = params;
        Ok(())
    }

    fn playback_parameters(&self) -> PlaybackParameters {
        self.read(|s| s.params)
    }

    fn set_looping(&self, looping: bool) -> Result<()> {
        self.lock()?.looping = looping;
        Ok(())
    }

    fn is_looping(&self) -> bool {
        self.read(|s| s.looping)
    }

    fn playback_state(&self) -> PlaybackState {
        self.read(|s| s.playback_state)
    }

    fn is_playing(&self) -> bool {
        self.read(|s| s.playing)
    }

    fn is_loading(&self) -> bool {
        self.read(|s| s.loading)
    }

    fn position_ms(&self) -> u64 {
        self.read(|s| s.position_ms())
    }

    fn duration_ms(&self) -> Option<u64> {
        self.read(|s| s.duration_ms)
    }

    fn audio_session_id(&self) -> i32 {
        SIM_AUDIO_SESSION
    }

    fn add_listener(&self, listener: Arc<dyn EngineListener>) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }

    fn release(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.rebase();
            s.released = true;
            s.playing = false;
            s.started_at = None;
        }
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.clear();
        }
        tracing::debug!("sim engine released");
    }
}

pub struct SimPermission {
    granted: bool,
}

impl SimPermission {
    pub fn new(granted: bool) -> Self {
        Self { granted }
    }
}

impl CapturePermission for SimPermission {
    fn is_granted(&self) -> bool {
        self.granted
    }
}

pub struct SimCapture {
    tone_hz: f32,
}

impl SimCapture {
    const MIN_SIZE: usize = 128;
    const MAX_SIZE: usize = 1024;
    /// 20 Hz, in millihertz.
    const MAX_RATE_MHZ: u32 = 20_000;

    pub fn new(tone_hz: f32) -> Self {
        Self { tone_hz }
    }
}

impl CaptureBackend for SimCapture {
    fn capture_size_range(&self) -> (usize, usize) {
        (Self::MIN_SIZE, Self::MAX_SIZE)
    }

    fn max_capture_rate(&self) -> u32 {
        Self::MAX_RATE_MHZ
    }

    fn open(&self, audio_session_id: i32) -> Result<Box<dyn CaptureDevice>> {
        if audio_session_id != SIM_AUDIO_SESSION {
            return Err(anyhow!("unknown audio session {audio_session_id}"));
        }
        Ok(Box::new(SimCaptureDevice {
            tone_hz: self.tone_hz,
            capture_size: Self::MAX_SIZE,
            callback: None,
            rate_mhz: Self::MAX_RATE_MHZ,
            worker: None,
        }))
    }
}

struct CaptureWorker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct SimCaptureDevice {
    tone_hz: f32,
    capture_size: usize,
    callback: Option<WaveformCallback>,
    rate_mhz: u32,
    worker: Option<CaptureWorker>,
}

impl SimCaptureDevice {
    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::Relaxed);
            let _ = worker.handle.join();
        }
    }
}

impl CaptureDevice for SimCaptureDevice {
    fn configure(&mut self, settings: CaptureSettings) -> Result<()> {
        if !(SimCapture::MIN_SIZE..=SimCapture::MAX_SIZE).contains(&settings.capture_size) {
            return Err(anyhow!("capture size {} out of range", settings.capture_size));
        }
        self.capture_size = settings.capture_size;
        self.rate_mhz = settings.capture_rate_mhz;
        Ok(())
    }

    fn set_waveform_callback(&mut self, callback: WaveformCallback, rate_mhz: u32) -> Result<()> {
        if rate_mhz == 0 || rate_mhz > SimCapture::MAX_RATE_MHZ {
            return Err(anyhow!("capture rate {rate_mhz} mHz out of range"));
        }
        self.callback = Some(callback);
        self.rate_mhz = rate_mhz;
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        if !enabled {
            self.stop_worker();
            return Ok(());
        }
        if self.worker.is_some() {
            return Ok(());
        }
        let callback = self
            .callback
            .clone()
            .ok_or_else(|| anyhow!("no waveform callback registered"))?;
        let stop = Arc::new(AtomicBool::new(false));
        let period = Duration::from_secs_f64(1000.0 / self.rate_mhz as f64);
        let mut tone = SineWave::new(self.tone_hz, self.capture_size);
        let stop_flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("sim-capture".to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Relaxed) {
                    callback(tone.next_chunk());
                    std::thread::sleep(period);
                }
            })?;
        self.worker = Some(CaptureWorker { stop, handle });
        Ok(())
    }

    fn release(&mut self) {
        self.stop_worker();
        self.callback = None;
    }
}

impl Drop for SimCaptureDevice {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

/// Unsigned 8-bit sine generator with a continuous phase across chunks.
struct SineWave {
    step: f32,
    phase: f32,
    chunk: Vec<u8>,
}

impl SineWave {
    fn new(tone_hz: f32, chunk_len: usize) -> Self {
        Self {
            step: TAU * tone_hz / SIM_SAMPLE_RATE,
            phase: 0.0,
            chunk: vec![128; chunk_len],
        }
    }

    fn next_chunk(&mut self) -> &[u8] {
        for byte in self.chunk.iter_mut() {
            *byte = (128.0 + 127.0 * self.phase.sin()).round() as u8;
            self.phase = (self.phase + self.step) % TAU;
        }
        &self.chunk
    }
}
