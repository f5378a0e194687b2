use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "player-probe", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a simulated track and print every player event as a JSON line
    Run(RunArgs),
}

#[derive(ClapArgs, Debug, Default)]
pub struct RunArgs {
    /// TOML config file with `[player]` and `[sim]` tables
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Media source name handed to the simulated engine
    #[arg(long)]
    pub source: Option<String>,

    /// Extra request header for the source, as NAME=VALUE (repeatable)
    #[arg(long = "header", value_name = "NAME=VALUE")]
    pub headers: Vec<String>,

    /// Length of the simulated track in seconds
    #[arg(long)]
    pub duration_secs: Option<f64>,

    /// Status report interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Enable waveform sampling (audio-sample-update events)
    #[arg(long)]
    pub sampling: bool,

    /// Simulate a denied signal-capture permission
    #[arg(long)]
    pub deny_capture: bool,

    /// Initial volume (0.0 - 1.0)
    #[arg(long)]
    pub volume: Option<f32>,

    /// Start muted
    #[arg(long)]
    pub mute: bool,

    /// Playback rate (clamped to 0.1 - 2.0)
    #[arg(long)]
    pub rate: Option<f32>,

    /// Repeat the track until interrupted
    #[arg(long = "loop")]
    pub looping: bool,

    /// Stop after this many seconds even if the track has not ended
    #[arg(long)]
    pub run_secs: Option<u64>,
}
