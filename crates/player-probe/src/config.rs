//! Probe configuration.
//!
//! A TOML file with an optional `[player]` table (the library's `PlayerConfig`) and an optional
//! `[sim]` table for the simulated engine. Command-line flags override both.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use audio_player::{MediaSource, PlayerConfig};
use serde::Deserialize;

use crate::cli::RunArgs;

/// Source used when neither the config nor the command line names one.
pub const DEFAULT_SOURCE: &str = "sim://sine-440";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub player: PlayerConfig,
    pub sim: SimConfig,
    /// Request headers sent with the source.
    pub headers: BTreeMap<String, String>,
}

/// Simulated engine and capture settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Track length in seconds.
    pub duration_secs: f64,
    /// Frequency of the generated waveform.
    pub tone_hz: f32,
    /// Whether signal capture is authorized.
    pub capture_granted: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration_secs: 5.0,
            tone_hz: 440.0,
            capture_granted: true,
        }
    }
}

impl SimConfig {
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_secs).unwrap_or(Duration::ZERO)
    }
}

impl ProbeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<ProbeConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }

    /// Apply command-line overrides.
    pub fn apply_args(&mut self, args: &RunArgs) -> Result<()> {
        for header in &args.headers {
            let (name, value) = parse_header(header)?;
            self.headers.insert(name.to_string(), value.to_string());
        }
        if let Some(source) = args.source.as_ref() {
            self.player.source = Some(source.clone());
        }
        if self.player.source.is_none() {
            self.player.source = Some(DEFAULT_SOURCE.to_string());
        }
        if let Some(secs) = args.duration_secs {
            self.sim.duration_secs = secs;
        }
        if let Some(ms) = args.interval_ms {
            self.player.update_interval_ms = ms;
        }
        if let Some(volume) = args.volume {
            self.player.volume = volume;
        }
        if let Some(rate) = args.rate {
            self.player.playback_rate = rate;
        }
        if args.mute {
            self.player.muted = true;
        }
        if args.looping {
            self.player.looping = true;
        }
        if args.deny_capture {
            self.sim.capture_granted = false;
        }
        Ok(())
    }

    /// Take the configured source out of the player config, with headers attached.
    ///
    /// The probe attaches the source itself so the headers reach the engine.
    pub fn take_media_source(&mut self) -> Option<MediaSource> {
        let uri = self.player.source.take()?;
        let source = self
            .headers
            .iter()
            .fold(MediaSource::new(uri), |source, (name, value)| {
                source.with_header(name, value)
            });
        Some(source)
    }
}

fn parse_header(raw: &str) -> Result<(&str, &str)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("header {raw:?} is not NAME=VALUE"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("header {raw:?} has an empty name"));
    }
    Ok((name, value.trim()))
}
