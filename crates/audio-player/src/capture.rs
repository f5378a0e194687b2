//! Real-time waveform capture.
//!
//! Platforms allow a single capture device per audio session; opening a second one is fatal.
//! [`CaptureController`] owns the only slot a device may live in and opens a device only when the
//! slot is empty, so callers cannot violate that.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::amplitude::extract_amplitudes;
use crate::emitter::StatusEmitter;

/// Answers whether signal capture is authorized.
pub trait CapturePermission: Send + Sync {
    fn is_granted(&self) -> bool;
}

/// Capture parameters applied before the device is enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Bytes per waveform chunk.
    pub capture_size: usize,
    /// Callback rate in millihertz.
    pub capture_rate_mhz: u32,
}

/// Receives raw unsigned 8-bit waveform chunks.
pub type WaveformCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Opens capture devices bound to an audio session.
pub trait CaptureBackend: Send + Sync {
    /// Inclusive `(min, max)` capture size in bytes.
    fn capture_size_range(&self) -> (usize, usize);
    /// Maximum callback rate in millihertz.
    fn max_capture_rate(&self) -> u32;
    fn open(&self, audio_session_id: i32) -> Result<Box<dyn CaptureDevice>>;
}

/// A live capture device.
pub trait CaptureDevice: Send {
    fn configure(&mut self, settings: CaptureSettings) -> Result<()>;
    fn set_waveform_callback(&mut self, callback: WaveformCallback, rate_mhz: u32) -> Result<()>;
    fn set_enabled(&mut self, enabled: bool) -> Result<()>;
    fn release(&mut self);
}

/// Result of [`CaptureController::enable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A new device was opened.
    Created,
    /// A device already existed; nothing changed.
    AlreadyActive,
    /// Capture is not authorized; nothing changed.
    PermissionDenied,
    /// The player has been released.
    EngineReleased,
    /// The backend failed to open or configure a device.
    Failed,
}

pub struct CaptureController {
    backend: Arc<dyn CaptureBackend>,
    permission: Arc<dyn CapturePermission>,
    emitter: StatusEmitter,
    device: Mutex<Option<Box<dyn CaptureDevice>>>,
    generation: Arc<AtomicU64>,
}

impl CaptureController {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        permission: Arc<dyn CapturePermission>,
        emitter: StatusEmitter,
    ) -> Self {
        Self {
            backend,
            permission,
            emitter,
            device: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_permitted(&self) -> bool {
        self.permission.is_granted()
    }

    pub fn is_active(&self) -> bool {
        self.device.lock().map(|d| d.is_some()).unwrap_or(false)
    }

    /// Open the capture device unless one exists already.
    pub fn enable(&self) -> CaptureOutcome {
        if !self.is_permitted() {
            tracing::warn!(
                player_id = %self.emitter.state().id(),
                "signal capture permission not granted; audio sampling unavailable"
            );
            return CaptureOutcome::PermissionDenied;
        }
        let Ok(mut slot) = self.device.lock() else {
            return CaptureOutcome::Failed;
        };
        if slot.is_some() {
            return CaptureOutcome::AlreadyActive;
        }
        let Some(engine) = self.emitter.engine() else {
            return CaptureOutcome::EngineReleased;
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        match self.open_device(engine.audio_session_id(), generation) {
            Ok(device) => {
                *slot = Some(device);
                tracing::info!(player_id = %self.emitter.state().id(), "waveform capture enabled");
                CaptureOutcome::Created
            }
            Err(e) => {
                tracing::warn!(
                    player_id = %self.emitter.state().id(),
                    "capture device error: {e:#}"
                );
                CaptureOutcome::Failed
            }
        }
    }

    /// Drop the device. The slot is cleared before the device is released.
    pub fn disable(&self) {
        let device = self.device.lock().ok().and_then(|mut slot| slot.take());
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(mut device) = device {
            device.release();
            tracing::info!(player_id = %self.emitter.state().id(), "waveform capture released");
        }
    }

    fn open_device(
        &self,
        audio_session_id: i32,
        generation: u64,
    ) -> Result<Box<dyn CaptureDevice>> {
        let mut device = self
            .backend
            .open(audio_session_id)
            .with_context(|| format!("open capture device for session {audio_session_id}"))?;
        let (_, max_size) = self.backend.capture_size_range();
        let rate = self.backend.max_capture_rate() / 2;
        let settings = CaptureSettings {
            capture_size: max_size,
            capture_rate_mhz: rate,
        };
        let callback = self.waveform_callback(generation);
        if let Err(e) = configure_device(device.as_mut(), settings, callback) {
            device.release();
            return Err(e);
        }
        Ok(device)
    }

    fn waveform_callback(&self, generation: u64) -> WaveformCallback {
        let current = self.generation.clone();
        let emitter = self.emitter.clone();
        Arc::new(move |waveform: &[u8]| {
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            if !emitter.state().sampling_enabled() {
                return;
            }
            let playing = emitter.engine().is_some_and(|engine| engine.is_playing());
            if !playing {
                return;
            }
            let frames = extract_amplitudes(waveform);
            // A disable that lands between here and the sink can still let this one chunk out.
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            emitter.emit_sample(frames);
        })
    }
}

fn configure_device(
    device: &mut dyn CaptureDevice,
    settings: CaptureSettings,
    callback: WaveformCallback,
) -> Result<()> {
    device.configure(settings).context("set capture size")?;
    device
        .set_waveform_callback(callback, settings.capture_rate_mhz)
        .context("register waveform callback")?;
    device.set_enabled(true).context("enable capture device")?;
    Ok(())
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.disable();
    }
}
