//! Player probe: drives the audio player runtime against a simulated engine.
//!
//! Every event the player publishes is written to stdout as one JSON line
//! (`{"event": ..., "payload": ...}`); logs go to stderr.

mod cli;
mod config;
mod sim;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use audio_player::{AudioPlayer, EventBus, MediaEngine, PlayerParts};
use audio_player_types::PlayerEvent;
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::ProbeConfig;
use crate::sim::{SimCapture, SimEngine, SimPermission};

/// How often the simulated engine checks for end of track.
const ENGINE_TICK: Duration = Duration::from_millis(50);
const PRINTER_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,audio_player=info,player_probe=info")
        }))
        .init();

    match args.cmd {
        cli::Command::Run(run) => run_probe(run),
    }
}

fn run_probe(args: cli::RunArgs) -> Result<()> {
    let mut config = match args.config.as_deref() {
        Some(path) => ProbeConfig::load(path)?,
        None => ProbeConfig::default(),
    };
    config.apply_args(&args)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    ctrlc::set_handler(move || shutdown_signal.cancel()).context("install Ctrl-C handler")?;

    let run_for = args.run_secs.map(Duration::from_secs);
    runtime.block_on(drive(config, args.sampling, run_for, shutdown))
}

async fn drive(
    mut config: ProbeConfig,
    sampling: bool,
    run_for: Option<Duration>,
    shutdown: CancellationToken,
) -> Result<()> {
    let bus = EventBus::new(config.player.event_capacity);
    let printer = tokio::spawn(print_events(bus.subscribe()));

    let engine = Arc::new(SimEngine::new(config.sim.duration()));
    let parts = PlayerParts {
        engine: engine.clone(),
        capture: Arc::new(SimCapture::new(config.sim.tone_hz)),
        permission: Arc::new(SimPermission::new(config.sim.capture_granted)),
        sink: Arc::new(bus.clone()),
    };
    let source = config.take_media_source();
    let player = AudioPlayer::new(parts, config.player).context("create audio player")?;
    tracing::info!(
        player_id = %player.id(),
        track_secs = config.sim.duration_secs,
        subscribers = bus.subscriber_count(),
        "probe started"
    );
    if let Some(source) = source {
        player.set_media_source(source);
    }

    if sampling {
        player.set_sampling_enabled(true);
    }
    player.play();

    let deadline = async {
        match run_for {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut ticker = tokio::time::interval(ENGINE_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("interrupted");
                break;
            }
            _ = &mut deadline => {
                tracing::info!("run time elapsed");
                break;
            }
            _ = ticker.tick() => {
                if engine.tick() && !engine.is_looping() {
                    tracing::info!("track ended");
                    break;
                }
            }
        }
    }

    let last = player.current_status();
    tracing::info!(
        position_secs = last.current_time,
        state = %last.playback_state,
        "releasing player"
    );
    player.release();
    drop(player);
    drop(bus);

    if tokio::time::timeout(PRINTER_DRAIN_TIMEOUT, printer).await.is_err() {
        tracing::debug!("event printer still attached; exiting without draining");
    }
    std::io::stdout().flush().context("flush stdout")?;
    Ok(())
}

async fn print_events(mut rx: broadcast::Receiver<PlayerEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let line = serde_json::json!({
                    "event": event.name(),
                    "payload": event.payload(),
                });
                println!("{line}");
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
