//! Waveform bytes to normalized amplitudes.
//!
//! Capture devices deliver unsigned 8-bit samples centred on 128.

/// Normalize one unsigned waveform byte into `[-1.0, 0.9921875]`.
#[inline]
pub fn extract_amplitude(byte: u8) -> f32 {
    (byte as f32 - 128.0) / 128.0
}

/// Normalize a captured waveform chunk.
pub fn extract_amplitudes(waveform: &[u8]) -> Vec<f32> {
    waveform.iter().copied().map(extract_amplitude).collect()
}
