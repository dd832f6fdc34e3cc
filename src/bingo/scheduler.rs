//! Periodic sweeps.
//!
//! The settlement sweep is the safety net for settlements that were deferred
//! or never triggered; the auto-start sweep activates draws whose scheduled
//! time has passed and keeps a timer alive for every active automatic draw.

use super::types::{DrawMode, DrawStatus};
use crate::config::SchedulerConfig;
use crate::engine::DrawEngine;
use crate::errors::BingoResult;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Counts from one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub acted: usize,
    pub deferred: usize,
    pub failed: usize,
}

/// Re-run settlement for every active draw, finishing the ones whose
/// numbers ran out once nothing is left to settle
pub async fn settlement_sweep(engine: &DrawEngine) -> BingoResult<SweepReport> {
    let mut report = SweepReport::default();

    for draw in engine.list_draws()? {
        if draw.status != DrawStatus::Active {
            continue;
        }
        report.examined += 1;

        let pass = engine.settle_pending(&draw.id).await;
        if !pass.winners.is_empty() || pass.finished {
            report.acted += 1;
        }
        match pass.error {
            Some(e) if e.is_transient() => report.deferred += 1,
            Some(_) => report.failed += 1,
            None => {}
        }
    }

    Ok(report)
}

/// Start due draws and make sure every active automatic draw has a timer
pub async fn auto_start_sweep(engine: &DrawEngine, now: DateTime<Utc>) -> BingoResult<SweepReport> {
    let mut report = SweepReport::default();
    let period = engine.config().auto_tick_interval();

    for draw in engine.list_draws()? {
        if draw.is_due(now) {
            report.examined += 1;
            match engine.start_draw(&draw.id).await {
                Ok(_) => report.acted += 1,
                Err(e) if e.is_transient() => report.deferred += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(draw_id = %draw.id, "Auto-start failed: {}", e);
                }
            }
        } else if draw.status == DrawStatus::Active && draw.mode == DrawMode::Automatic {
            engine.timers().ensure(engine, &draw.id, period);
        }
    }

    Ok(report)
}

/// Background task running both sweeps on their own intervals
pub struct DrawScheduler {
    engine: DrawEngine,
    settlement_interval: Duration,
    auto_start_interval: Duration,
    running: Arc<AtomicBool>,
    shutdown: Notify,
}

impl DrawScheduler {
    pub fn spawn(engine: DrawEngine, config: &SchedulerConfig) -> Arc<Self> {
        let scheduler = Arc::new(Self {
            engine,
            settlement_interval: Duration::from_secs(config.settlement_sweep_interval_secs),
            auto_start_interval: Duration::from_secs(config.auto_start_interval_secs),
            running: Arc::new(AtomicBool::new(true)),
            shutdown: Notify::new(),
        });

        scheduler.clone().spawn_task();
        scheduler
    }

    fn spawn_task(self: Arc<Self>) {
        tokio::spawn(async move {
            tracing::info!(
                settlement_secs = self.settlement_interval.as_secs(),
                auto_start_secs = self.auto_start_interval.as_secs(),
                "Draw scheduler started"
            );

            let mut settle_tick = tokio::time::interval(self.settlement_interval);
            let mut start_tick = tokio::time::interval(self.auto_start_interval);
            settle_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            start_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            while self.running.load(Ordering::SeqCst) {
                tokio::select! {
                    biased;
                    _ = self.shutdown.notified() => break,
                    _ = start_tick.tick() => {
                        match auto_start_sweep(&self.engine, Utc::now()).await {
                            Ok(report) if report.examined > 0 => {
                                tracing::info!(?report, "Auto-start sweep");
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!("Auto-start sweep failed: {}", e),
                        }
                    }
                    _ = settle_tick.tick() => {
                        match settlement_sweep(&self.engine).await {
                            Ok(report) if report.acted > 0 || report.deferred > 0 => {
                                tracing::info!(?report, "Settlement sweep");
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!("Settlement sweep failed: {}", e),
                        }
                    }
                }
            }

            tracing::info!("Draw scheduler stopped");
        });
    }

    /// Stop after the sweep in progress, if any. Idle waits end at once.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
