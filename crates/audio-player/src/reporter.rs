//! Periodic status reporting.
//!
//! One tokio task per player ticks at the configured interval and emits a snapshot whenever the
//! engine-observed playing flag is set. Restarting cancels the previous task first, so there is
//! never more than one live timer.

use std::sync::Mutex;
use std::time::Duration;

use audio_player_types::StatusOverlay;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::emitter::StatusEmitter;

struct ReporterTask {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl ReporterTask {
    /// Cancel without waiting for the task to observe it.
    fn cancel(self) {
        self.cancel.cancel();
        self.join.abort();
    }
}

pub struct PeriodicReporter {
    runtime: Handle,
    emitter: StatusEmitter,
    task: Mutex<Option<ReporterTask>>,
}

impl PeriodicReporter {
    pub fn new(runtime: Handle, emitter: StatusEmitter) -> Self {
        Self {
            runtime,
            emitter,
            task: Mutex::new(None),
        }
    }

    /// (Re)start the loop using the player's current update interval.
    pub fn start(&self) {
        let interval = self.emitter.state().update_interval();
        let Ok(mut task) = self.task.lock() else {
            return;
        };
        if let Some(previous) = task.take() {
            previous.cancel();
        }
        let cancel = CancellationToken::new();
        let join = self.runtime.spawn(run_reporter(
            self.emitter.clone(),
            interval,
            cancel.clone(),
        ));
        tracing::debug!(
            player_id = %self.emitter.state().id(),
            interval_ms = interval.as_millis() as u64,
            "status reporter started"
        );
        *task = Some(ReporterTask { cancel, join });
    }

    /// Cancel the loop. Safe to call repeatedly.
    pub fn stop(&self) {
        let previous = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(previous) = previous {
            previous.cancel();
            tracing::debug!(player_id = %self.emitter.state().id(), "status reporter stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| {
                task.as_ref()
                    .is_some_and(|t| !t.cancel.is_cancelled() && !t.join.is_finished())
            })
            .unwrap_or(false)
    }
}

impl Drop for PeriodicReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_reporter(emitter: StatusEmitter, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if cancel.is_cancelled() {
            break;
        }
        if emitter.state().is_playing() && !emitter.emit_status(StatusOverlay::default()) {
            // Engine released underneath us.
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::PlayerConfig;
    use crate::engine::EngineSlot;
    use crate::state::PlayerState;
    use crate::testing::{FakeEngine, RecordingSink};

    fn reporter(
        interval_ms: u64,
    ) -> (PeriodicReporter, Arc<PlayerState>, EngineSlot, Arc<RecordingSink>) {
        let cfg = PlayerConfig {
            update_interval_ms: interval_ms,
            ..PlayerConfig::default()
        };
        let slot = EngineSlot::new(FakeEngine::shared());
        let sink = RecordingSink::shared();
        let state = Arc::new(PlayerState::new("p", &cfg));
        let emitter = StatusEmitter::new(slot.clone(), state.clone(), sink.clone());
        (PeriodicReporter::new(Handle::current(), emitter), state, slot, sink)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn emits_each_tick_while_playing() {
        let (reporter, state, _slot, sink) = reporter(500);
        state.set_is_playing(true);
        reporter.start();

        advance(1_010).await;
        let updates = sink.statuses();
        assert_eq!(updates.len(), 3);
        assert!(updates.iter().all(|u| u.overlay.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_while_not_playing() {
        let (reporter, state, _slot, sink) = reporter(100);
        reporter.start();
        advance(1_000).await;
        assert!(sink.events().is_empty());

        state.set_is_playing(true);
        advance(250).await;
        assert!(!sink.events().is_empty());

        state.set_is_playing(false);
        sink.clear();
        advance(1_000).await;
        assert!(sink.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_timer() {
        let (reporter, state, _slot, sink) = reporter(500);
        state.set_is_playing(true);
        reporter.start();
        reporter.start();
        reporter.start();

        advance(10).await;
        sink.clear();
        advance(1_000).await;
        assert_eq!(sink.statuses().len(), 2);
        assert!(reporter.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_and_is_idempotent() {
        let (reporter, state, _slot, sink) = reporter(100);
        state.set_is_playing(true);
        reporter.start();
        advance(10).await;

        reporter.stop();
        reporter.stop();
        assert!(!reporter.is_running());
        sink.clear();
        advance(1_000).await;
        assert!(sink.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_ends_when_engine_is_released() {
        let (reporter, state, slot, sink) = reporter(100);
        state.set_is_playing(true);
        reporter.start();
        advance(10).await;

        slot.take();
        sink.clear();
        advance(500).await;
        assert!(sink.events().is_empty());
        assert!(!reporter.is_running());
    }
}
