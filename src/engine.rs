//! Draw engine facade.
//!
//! Owns the store, the settlement coordinator, the event bus and the timer
//! registry, and exposes every draw operation the API, the scheduler and the
//! timers use. All writes go through optimistic transactions with bounded
//! conflict retry; nothing here holds an in-process lock.

use crate::bingo::retry::with_conflict_retry;
use crate::bingo::settlement::SettlementCoordinator;
use crate::bingo::state_machine::Transition;
use crate::bingo::ticker::{self, AutoDrawRegistry, TickOutcome};
use crate::bingo::types::{
    Card, Cents, Draw, DrawEvent, DrawMode, DrawStatus, NewDraw, Purchase, Tier, UserAccount, WinnerEvent,
};
use crate::bingo::accounts;
use crate::config::EngineConfig;
use crate::errors::{BingoError, BingoResult};
use crate::events::EventBus;
use crate::metrics::EngineMetrics;
use crate::storage::DrawStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// What a drawn number led to. The number is stored whatever the settlement
/// outcome; a settlement that did not complete is left to the sweep.
#[derive(Debug, Clone, Serialize)]
pub struct DrawProgress {
    pub draw_id: String,
    pub number: u8,
    pub drawn_count: usize,
    /// Tiers settled after this number, in contest order
    pub winners: Vec<WinnerEvent>,
    /// Settlement lost every retry
    pub settlement_deferred: bool,
    /// Settlement failed for another reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_error: Option<String>,
    pub finished: bool,
}

/// Result of settling everything a draw's numbers already satisfy
#[derive(Debug, Default)]
pub struct SettlementPass {
    pub winners: Vec<WinnerEvent>,
    /// Error that stopped the pass. The draw stays active when this is set.
    pub error: Option<BingoError>,
    /// Draw is finished after this pass
    pub finished: bool,
}

#[derive(Clone)]
pub struct DrawEngine {
    store: DrawStore,
    settlement: SettlementCoordinator,
    events: EventBus,
    metrics: Arc<EngineMetrics>,
    timers: AutoDrawRegistry,
    config: Arc<EngineConfig>,
}

impl DrawEngine {
    /// Validate the configuration and open the store it points at
    pub fn open(config: EngineConfig) -> BingoResult<Self> {
        config.validate()?;
        let store = DrawStore::open(&config.storage)?;
        Self::with_store(store, config)
    }

    pub fn with_store(store: DrawStore, config: EngineConfig) -> BingoResult<Self> {
        let metrics = Arc::new(
            EngineMetrics::new().map_err(|e| BingoError::Configuration(format!("metrics: {}", e)))?,
        );
        let events = EventBus::default();
        let settlement = SettlementCoordinator::new(
            store.clone(),
            events.clone(),
            metrics.clone(),
            config.retry.clone(),
        );

        Ok(Self {
            store,
            settlement,
            events,
            metrics,
            timers: AutoDrawRegistry::new(),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn timers(&self) -> &AutoDrawRegistry {
        &self.timers
    }

    async fn retry<T, F>(&self, operation: &'static str, attempt: F) -> BingoResult<T>
    where
        T: Send + 'static,
        F: Fn() -> BingoResult<T> + Send + Sync + 'static,
    {
        with_conflict_retry(&self.config.retry, &self.metrics, operation, attempt).await
    }

    // ---- lifecycle ----

    pub async fn create_draw(&self, request: NewDraw) -> BingoResult<Draw> {
        let draw = Draw::create(Uuid::new_v4().to_string(), request, Utc::now())?;
        let store = self.store.clone();
        let record = draw.clone();

        self.retry("create_draw", move || {
            let txn = store.begin();
            if txn.draw_exists(&record.id)? {
                return Err(BingoError::InvalidRequest(format!("draw {} already exists", record.id)));
            }
            txn.put_draw(&record)?;
            txn.commit()
        })
        .await?;

        tracing::info!(draw_id = %draw.id, name = %draw.name, mode = ?draw.mode, "Draw created");
        Ok(draw)
    }

    /// waiting -> active. Starting a draw that already left waiting is a no-op.
    pub async fn start_draw(&self, draw_id: &str) -> BingoResult<Draw> {
        let store = self.store.clone();
        let id = draw_id.to_string();

        let (draw, transition) = self
            .retry("start_draw", move || {
                let txn = store.begin();
                let mut draw = txn.draw_for_update(&id)?;
                let transition = draw.start(Utc::now());
                if transition.applied() {
                    txn.put_draw(&draw)?;
                    txn.commit()?;
                }
                Ok((draw, transition))
            })
            .await?;

        if transition.applied() {
            self.metrics.draws_started.inc();
            tracing::info!(draw_id, cards_sold = draw.cards_sold, "Draw started");
            self.events.publish(DrawEvent::DrawStarted {
                draw_id: draw_id.to_string(),
            });
        }

        if draw.status == DrawStatus::Active && draw.mode == DrawMode::Automatic {
            self.timers.ensure(self, draw_id, self.config.auto_tick_interval());
        }

        Ok(draw)
    }

    /// Operator force-finish. Also cancels a draw that never started.
    pub async fn finish_draw(&self, draw_id: &str) -> BingoResult<Draw> {
        let store = self.store.clone();
        let id = draw_id.to_string();

        let (draw, transition) = self
            .retry("finish_draw", move || {
                let txn = store.begin();
                let mut draw = txn.draw_for_update(&id)?;
                let transition = draw.finish(Utc::now());
                if transition.applied() {
                    txn.put_draw(&draw)?;
                    txn.commit()?;
                }
                Ok((draw, transition))
            })
            .await?;

        self.timers.stop(draw_id);
        if transition.applied() {
            self.on_finished(draw_id, "operator");
        }
        Ok(draw)
    }

    fn on_finished(&self, draw_id: &str, reason: &'static str) {
        self.metrics.draws_finished.inc();
        tracing::info!(draw_id, reason, "Draw finished");
        self.events.publish(DrawEvent::DrawFinished {
            draw_id: draw_id.to_string(),
        });
    }

    // ---- ticking ----

    /// Append an operator-chosen number, then settle.
    ///
    /// Errors only when the number was rejected. Once it is stored the call
    /// succeeds and reports any settlement problem in the progress.
    pub async fn draw_number(&self, draw_id: &str, number: u32) -> BingoResult<DrawProgress> {
        let store = self.store.clone();
        let id = draw_id.to_string();

        let draw = self
            .retry("draw_number", move || ticker::append_chosen(&store, &id, number))
            .await?;

        let drawn = draw
            .drawn_numbers
            .last()
            .copied()
            .ok_or_else(|| BingoError::CorruptedData(format!("draw {} lost its numbers", draw_id)))?;

        Ok(self.after_append(draw_id, drawn, draw.drawn_numbers.len()).await)
    }

    /// One automatic tick: random undrawn number, then settle. With no
    /// numbers left the draw is closed instead.
    pub async fn tick_automatic(&self, draw_id: &str) -> BingoResult<TickOutcome> {
        let store = self.store.clone();
        let id = draw_id.to_string();

        let outcome = self
            .retry("tick_automatic", move || ticker::append_random(&store, &id))
            .await?;

        match outcome {
            TickOutcome::Drawn { number, drawn_count } => {
                self.after_append(draw_id, number, drawn_count).await;
                Ok(outcome)
            }
            TickOutcome::Exhausted | TickOutcome::Finished => {
                let pass = self.settle_pending(draw_id).await;
                Ok(if pass.finished {
                    TickOutcome::Finished
                } else {
                    TickOutcome::Exhausted
                })
            }
            TickOutcome::Idle => Ok(outcome),
        }
    }

    async fn after_append(&self, draw_id: &str, number: u8, drawn_count: usize) -> DrawProgress {
        self.metrics.numbers_drawn.inc();
        tracing::debug!(draw_id, number, drawn_count, "Number drawn");
        self.events.publish(DrawEvent::NumberDrawn {
            draw_id: draw_id.to_string(),
            number,
            drawn_count,
        });

        let pass = self.settle_pending(draw_id).await;
        let settlement_deferred = matches!(pass.error, Some(BingoError::SettlementDeferred { .. }));

        DrawProgress {
            draw_id: draw_id.to_string(),
            number,
            drawn_count,
            winners: pass.winners,
            settlement_deferred,
            settlement_error: pass
                .error
                .filter(|_| !settlement_deferred)
                .map(|e| e.to_string()),
            finished: pass.finished,
        }
    }

    /// Settle the current tier of a draw. Safe under any concurrency.
    pub async fn settle(&self, draw_id: &str) -> BingoResult<Option<WinnerEvent>> {
        self.settlement.settle(draw_id).await
    }

    /// Settle every tier the drawn numbers already satisfy, in contest order.
    /// When all 90 numbers are out and nothing is left to settle, finish the
    /// draw. Any settlement error stops the pass and leaves the draw active,
    /// so a later pass (normally the sweep) picks up where this one stopped.
    pub async fn settle_pending(&self, draw_id: &str) -> SettlementPass {
        let mut pass = SettlementPass::default();

        loop {
            match self.settlement.settle(draw_id).await {
                Ok(Some(event)) => {
                    let cheia = event.tier == Tier::Cheia;
                    pass.winners.push(event);
                    if cheia {
                        pass.finished = true;
                        return pass;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    if e.is_transient() {
                        tracing::warn!(draw_id, "Settlement left for the sweep: {}", e);
                    } else {
                        tracing::error!(draw_id, "Settlement failed: {}", e);
                    }
                    pass.error = Some(e);
                    return pass;
                }
            }
        }

        let draw = match self.store.load_draw(draw_id) {
            Ok(draw) => draw,
            Err(e) => {
                pass.error = Some(e);
                return pass;
            }
        };
        if draw.status == DrawStatus::Finished {
            pass.finished = true;
            return pass;
        }
        if draw.status != DrawStatus::Active || !draw.is_exhausted() {
            return pass;
        }

        let store = self.store.clone();
        let id = draw_id.to_string();
        match self
            .retry("finish_exhausted", move || ticker::finish_if_active(&store, &id, Utc::now()))
            .await
        {
            Ok(transition) => {
                if transition == Transition::Applied {
                    self.on_finished(draw_id, "numbers exhausted");
                }
                pass.finished = true;
            }
            Err(e) => {
                tracing::warn!(draw_id, "Could not finish exhausted draw: {}", e);
                pass.error = Some(e);
            }
        }

        pass
    }

    // ---- reads ----

    pub fn load_draw(&self, draw_id: &str) -> BingoResult<Draw> {
        self.store.load_draw(draw_id)
    }

    pub fn list_draws(&self) -> BingoResult<Vec<Draw>> {
        self.store.list_draws()
    }

    pub fn draw_cards(&self, draw_id: &str) -> BingoResult<Vec<Card>> {
        self.store.load_draw(draw_id)?;
        self.store.load_cards(draw_id)
    }

    pub fn payout_receipts(&self, draw_id: &str) -> BingoResult<Vec<WinnerEvent>> {
        self.store.load_payouts(draw_id)
    }

    pub fn load_account(&self, user_id: &str) -> BingoResult<UserAccount> {
        self.store.load_account(user_id)
    }

    pub fn purchases(&self, user_id: &str) -> BingoResult<Vec<Purchase>> {
        self.store.load_account(user_id)?;
        self.store.load_purchases(user_id)
    }

    // ---- accounts ----

    pub async fn open_account(&self, name: &str) -> BingoResult<UserAccount> {
        let store = self.store.clone();
        let user_id = Uuid::new_v4().to_string();
        let name = name.to_string();

        let account = self
            .retry("open_account", move || accounts::open_account(&store, &user_id, &name, Utc::now()))
            .await?;
        tracing::info!(user_id = %account.id, "Account opened");
        Ok(account)
    }

    /// Effect of a confirmed payment on the user's balance
    pub async fn confirm_deposit(&self, user_id: &str, amount: Cents) -> BingoResult<UserAccount> {
        let store = self.store.clone();
        let id = user_id.to_string();

        let account = self
            .retry("confirm_deposit", move || accounts::confirm_deposit(&store, &id, amount))
            .await?;
        tracing::info!(user_id, amount, balance = account.balance, "Deposit confirmed");
        Ok(account)
    }

    pub async fn approve_withdrawal(&self, user_id: &str, amount: Cents) -> BingoResult<UserAccount> {
        let store = self.store.clone();
        let id = user_id.to_string();

        let account = self
            .retry("approve_withdrawal", move || accounts::approve_withdrawal(&store, &id, amount))
            .await?;
        tracing::info!(user_id, amount, balance = account.balance, "Withdrawal approved");
        Ok(account)
    }

    pub async fn purchase_cards(&self, user_id: &str, draw_id: &str, quantity: u32) -> BingoResult<Purchase> {
        let store = self.store.clone();
        let user = user_id.to_string();
        let draw = draw_id.to_string();
        let max = self.config.draws.max_cards_per_purchase;

        let purchase = self
            .retry("purchase_cards", move || {
                accounts::purchase_cards(&store, &user, &draw, quantity, max, Utc::now())
            })
            .await?;

        self.metrics.cards_sold.inc_by(quantity as u64);
        tracing::info!(user_id, draw_id, quantity, total = purchase.total_amount, "Cards purchased");
        Ok(purchase)
    }

    /// Stop every automatic timer
    pub fn shutdown(&self) {
        self.timers.shutdown();
    }
}
