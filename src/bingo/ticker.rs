//! Draw ticking: appending numbers and the per-draw automatic timers.

use super::state_machine::Transition;
use super::types::{Draw, DrawMode, DrawStatus};
use crate::engine::DrawEngine;
use crate::errors::{BingoError, BingoResult};
use crate::storage::DrawStore;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Result of one automatic tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// A number was appended
    Drawn { number: u8, drawn_count: usize },
    /// No numbers remain but a tier is still waiting on settlement
    Exhausted,
    /// No numbers remained; the draw was finished instead
    Finished,
    /// Draw no longer active; nothing happened
    Idle,
}

/// Append an operator-chosen number. Rejections leave the draw untouched.
pub fn append_chosen(store: &DrawStore, draw_id: &str, number: u32) -> BingoResult<Draw> {
    let txn = store.begin();
    let mut draw = txn.draw_for_update(draw_id)?;
    draw.append_number(number)?;
    txn.put_draw(&draw)?;
    txn.commit()?;
    Ok(draw)
}

/// Append a uniformly random undrawn number, chosen inside the transaction so
/// the choice always reflects the committed state. Writes nothing and returns
/// `Exhausted` once every number is out; closing the draw is up to the caller.
pub fn append_random(store: &DrawStore, draw_id: &str) -> BingoResult<TickOutcome> {
    let txn = store.begin();
    let mut draw = txn.draw_for_update(draw_id)?;

    if draw.status != DrawStatus::Active {
        return Ok(TickOutcome::Idle);
    }
    if draw.mode != DrawMode::Automatic {
        return Err(BingoError::InvalidRequest(format!(
            "draw {} is not automatic",
            draw_id
        )));
    }

    let remaining = draw.remaining_numbers();
    let Some(&number) = remaining.choose(&mut rand::thread_rng()) else {
        return Ok(TickOutcome::Exhausted);
    };

    draw.append_number(number as u32)?;
    txn.put_draw(&draw)?;
    txn.commit()?;

    Ok(TickOutcome::Drawn {
        number,
        drawn_count: draw.drawn_numbers.len(),
    })
}

/// Finish the draw only if it is still active. Used after the last number.
pub fn finish_if_active(store: &DrawStore, draw_id: &str, now: DateTime<Utc>) -> BingoResult<Transition> {
    let txn = store.begin();
    let mut draw = txn.draw_for_update(draw_id)?;
    if draw.status != DrawStatus::Active {
        return Ok(Transition::Unchanged);
    }
    draw.finish(now);
    txn.put_draw(&draw)?;
    txn.commit()?;
    Ok(Transition::Applied)
}

/// At most one automatic timer per draw.
///
/// Only suppresses duplicate timers; two timers racing would still be safe
/// because every tick is a transaction.
#[derive(Clone, Default)]
pub struct AutoDrawRegistry {
    timers: Arc<DashMap<String, JoinHandle<()>>>,
}

impl AutoDrawRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a timer for the draw unless one is already running.
    /// Returns true when a new timer was spawned.
    pub fn ensure(&self, engine: &DrawEngine, draw_id: &str, period: Duration) -> bool {
        let spawn = || {
            let engine = engine.clone();
            let registry = self.clone();
            let id = draw_id.to_string();
            tokio::spawn(async move { run_timer(engine, registry, id, period).await })
        };

        match self.timers.entry(draw_id.to_string()) {
            Entry::Occupied(entry) if !entry.get().is_finished() => false,
            Entry::Occupied(mut entry) => {
                entry.insert(spawn());
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(spawn());
                true
            }
        }
    }

    pub fn stop(&self, draw_id: &str) {
        if let Some((_, handle)) = self.timers.remove(draw_id) {
            handle.abort();
        }
    }

    pub fn is_running(&self, draw_id: &str) -> bool {
        self.timers
            .get(draw_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn active_count(&self) -> usize {
        self.timers.iter().filter(|entry| !entry.value().is_finished()).count()
    }

    pub fn shutdown(&self) {
        for entry in self.timers.iter() {
            entry.value().abort();
        }
        self.timers.clear();
    }
}

/// Holds the running-timer gauge up for the life of a timer task, aborts included
struct GaugeGuard(prometheus::IntGauge);

impl GaugeGuard {
    fn new(gauge: prometheus::IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

async fn run_timer(engine: DrawEngine, registry: AutoDrawRegistry, draw_id: String, period: Duration) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let _gauge = GaugeGuard::new(engine.metrics().auto_timers.clone());
    tracing::info!(%draw_id, period_ms = period.as_millis() as u64, "Automatic timer started");

    loop {
        interval.tick().await;

        match engine.load_draw(&draw_id) {
            Ok(draw) if draw.status == DrawStatus::Active => {}
            Ok(_) => break,
            Err(e) => {
                tracing::warn!(%draw_id, "Automatic timer could not read draw: {}", e);
                break;
            }
        }

        match engine.tick_automatic(&draw_id).await {
            Ok(TickOutcome::Drawn { .. }) => {}
            // An exhausted draw is closed by the settlement sweep
            Ok(TickOutcome::Exhausted) | Ok(TickOutcome::Finished) | Ok(TickOutcome::Idle) => break,
            Err(e) if e.is_transient() => {
                tracing::warn!(%draw_id, "Automatic tick deferred: {}", e);
            }
            Err(e) => {
                tracing::error!(%draw_id, "Automatic tick failed: {}", e);
                break;
            }
        }
    }

    registry.timers.remove(&draw_id);
    tracing::info!(%draw_id, "Automatic timer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bingo::types::{NewDraw, Payout};

    fn seed_active(store: &DrawStore, mode: DrawMode) {
        let mut draw = Draw::create(
            "d1".to_string(),
            NewDraw {
                name: "Tick".to_string(),
                scheduled_at: Utc::now(),
                card_price: 100,
                payout: Payout::Accumulated,
                mode,
                external_url: None,
            },
            Utc::now(),
        )
        .unwrap();
        draw.start(Utc::now());
        let txn = store.begin();
        txn.put_draw(&draw).unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn test_append_chosen_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = DrawStore::open_path(dir.path()).unwrap();
        seed_active(&store, DrawMode::Manual);

        append_chosen(&store, "d1", 17).unwrap();
        assert!(append_chosen(&store, "d1", 17).is_err());
        assert_eq!(store.load_draw("d1").unwrap().drawn_numbers, vec![17]);
    }

    #[test]
    fn test_random_draws_cover_pool_then_finish() {
        let dir = tempfile::tempdir().unwrap();
        let store = DrawStore::open_path(dir.path()).unwrap();
        seed_active(&store, DrawMode::Automatic);

        for expected in 1..=90 {
            match append_random(&store, "d1").unwrap() {
                TickOutcome::Drawn { drawn_count, .. } => assert_eq!(drawn_count, expected),
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        let mut drawn = store.load_draw("d1").unwrap().drawn_numbers;
        drawn.sort_unstable();
        assert_eq!(drawn, (1..=90).collect::<Vec<u8>>());

        // Exhaustion alone never finishes the draw
        assert_eq!(append_random(&store, "d1").unwrap(), TickOutcome::Exhausted);
        assert_eq!(store.load_draw("d1").unwrap().status, DrawStatus::Active);

        finish_if_active(&store, "d1", Utc::now()).unwrap();
        assert_eq!(append_random(&store, "d1").unwrap(), TickOutcome::Idle);
    }

    #[test]
    fn test_random_draw_refuses_manual_draw() {
        let dir = tempfile::tempdir().unwrap();
        let store = DrawStore::open_path(dir.path()).unwrap();
        seed_active(&store, DrawMode::Manual);

        assert!(matches!(
            append_random(&store, "d1"),
            Err(BingoError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_finish_if_active_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = DrawStore::open_path(dir.path()).unwrap();
        seed_active(&store, DrawMode::Manual);

        assert_eq!(finish_if_active(&store, "d1", Utc::now()).unwrap(), Transition::Applied);
        assert_eq!(finish_if_active(&store, "d1", Utc::now()).unwrap(), Transition::Unchanged);
    }
}
