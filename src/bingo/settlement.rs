//! Settlement: find the winner of the current tier, record it, pay it.
//!
//! Every trigger (manual draw, automatic timer, sweep, API) converges on
//! [`SettlementCoordinator::settle`]. One settlement attempt is a single
//! optimistic transaction over the draw record, the tier's payout receipt and
//! the winner's account. Losing a race aborts the attempt with nothing written;
//! the retry re-reads and normally finds the tier already settled.

use super::detector::reaches;
use super::prize;
use super::retry::with_conflict_retry;
use super::types::{Card, Draw, DrawEvent, DrawStatus, Tier, WinnerEvent};
use crate::config::RetryConfig;
use crate::errors::{BingoError, BingoResult};
use crate::events::EventBus;
use crate::metrics::EngineMetrics;
use crate::storage::DrawStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// First card, in sale order, that reaches the draw's current phase.
/// Winners of lower tiers are not eligible.
pub fn select_winner<'a>(draw: &Draw, cards: &'a [Card]) -> Option<&'a Card> {
    let excluded = draw.excluded_cards();
    cards
        .iter()
        .filter(|card| !excluded.contains(&card.id.as_str()))
        .find(|card| reaches(&card.numbers, &draw.drawn_numbers, draw.current_phase))
}

/// One settlement attempt. `Ok(None)` means there was nothing to do.
pub fn settle_once(store: &DrawStore, draw_id: &str, now: DateTime<Utc>) -> BingoResult<Option<WinnerEvent>> {
    let txn = store.begin();
    let mut draw = txn.draw_for_update(draw_id)?;

    if draw.status != DrawStatus::Active {
        return Ok(None);
    }

    let tier = draw.current_phase;
    if draw.is_settled(tier) {
        return Ok(None);
    }

    if let Some(receipt) = txn.payout_for_update(draw_id, tier)? {
        tracing::warn!(
            draw_id,
            %tier,
            card_id = %receipt.card_id,
            "Payout receipt exists for an unsettled tier; refusing to pay twice"
        );
        return Ok(None);
    }

    // Cards are immutable and sales close before activation
    let cards = store.load_cards(draw_id)?;
    let Some(card) = select_winner(&draw, &cards) else {
        return Ok(None);
    };

    let prize = prize::calculate(tier, &draw);
    draw.record_winner(&card.id, now)?;

    let mut account = txn.account_for_update(&card.user_id)?;
    account.balance = account
        .balance
        .checked_add(prize)
        .ok_or_else(|| BingoError::CorruptedData(format!("balance overflow for {}", account.id)))?;
    account.total_won = account.total_won.saturating_add(prize);
    account.last_win_at = Some(now);

    let receipt = WinnerEvent {
        draw_id: draw.id.clone(),
        card_id: card.id.clone(),
        user_id: card.user_id.clone(),
        tier,
        prize,
        settled_at: now,
    };

    txn.put_draw(&draw)?;
    txn.put_account(&account)?;
    txn.put_payout(&receipt)?;
    txn.commit()?;

    Ok(Some(receipt))
}

/// Shared settlement entry point, safe to call concurrently and repeatedly
#[derive(Clone)]
pub struct SettlementCoordinator {
    store: DrawStore,
    events: EventBus,
    metrics: Arc<EngineMetrics>,
    retry: RetryConfig,
}

impl SettlementCoordinator {
    pub fn new(store: DrawStore, events: EventBus, metrics: Arc<EngineMetrics>, retry: RetryConfig) -> Self {
        Self {
            store,
            events,
            metrics,
            retry,
        }
    }

    /// Settle the draw's current tier if a card has reached it.
    ///
    /// Fails with `SettlementDeferred` when every attempt conflicted; the draw
    /// is then exactly as some other writer left it.
    pub async fn settle(&self, draw_id: &str) -> BingoResult<Option<WinnerEvent>> {
        let store = self.store.clone();
        let id = draw_id.to_string();

        let outcome = with_conflict_retry(&self.retry, &self.metrics, "settle", move || {
            settle_once(&store, &id, Utc::now())
        })
        .await;

        let settled = match outcome {
            Ok(settled) => settled,
            Err(BingoError::TransactionConflict(_)) => {
                self.metrics.settlements_deferred.inc();
                tracing::warn!(draw_id, attempts = self.retry.max_attempts, "Settlement deferred");
                return Err(BingoError::SettlementDeferred {
                    draw_id: draw_id.to_string(),
                    attempts: self.retry.max_attempts,
                });
            }
            Err(e) => return Err(e),
        };

        if let Some(event) = &settled {
            self.metrics.settlements.with_label_values(&[event.tier.as_str()]).inc();
            tracing::info!(
                draw_id,
                tier = %event.tier,
                card_id = %event.card_id,
                user_id = %event.user_id,
                prize = event.prize,
                "Tier settled"
            );

            self.events.publish(DrawEvent::WinnerSettled(event.clone()));
            if event.tier == Tier::Cheia {
                self.metrics.draws_finished.inc();
                self.events.publish(DrawEvent::DrawFinished {
                    draw_id: draw_id.to_string(),
                });
            }
        }

        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bingo::types::{DrawMode, NewDraw, Payout, UserAccount};

    const CARD: [u8; 25] = [
        1, 16, 31, 46, 61, //
        2, 17, 32, 47, 62, //
        3, 18, 0, 48, 63, //
        4, 19, 34, 49, 64, //
        5, 20, 35, 50, 65,
    ];

    fn card(id: &str, serial: u64, numbers: [u8; 25]) -> Card {
        Card {
            id: id.to_string(),
            user_id: "u1".to_string(),
            draw_id: "d1".to_string(),
            serial,
            numbers,
            purchased_at: Utc::now(),
        }
    }

    fn active_draw(payout: Payout) -> Draw {
        let mut draw = Draw::create(
            "d1".to_string(),
            NewDraw {
                name: "Test".to_string(),
                scheduled_at: Utc::now(),
                card_price: 1_000,
                payout,
                mode: DrawMode::Manual,
                external_url: None,
            },
            Utc::now(),
        )
        .unwrap();
        draw.start(Utc::now());
        draw
    }

    fn seed(store: &DrawStore, draw: &Draw, cards: &[Card]) {
        let txn = store.begin();
        txn.put_draw(draw).unwrap();
        for c in cards {
            txn.put_card(c).unwrap();
        }
        txn.put_account(&UserAccount {
            id: "u1".to_string(),
            name: "Ana".to_string(),
            balance: 0,
            total_deposited: 0,
            total_withdrawn: 0,
            total_won: 0,
            last_win_at: None,
            created_at: Utc::now(),
        })
        .unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn test_lowest_serial_wins_ties() {
        let mut draw = active_draw(Payout::Accumulated);
        draw.drawn_numbers = vec![1, 16, 31, 46];
        let cards = vec![card("first", 0, CARD), card("second", 1, CARD)];

        assert_eq!(select_winner(&draw, &cards).unwrap().id, "first");
    }

    #[test]
    fn test_previous_winner_is_excluded() {
        let mut draw = active_draw(Payout::Accumulated);
        draw.drawn_numbers = vec![1, 16, 31, 46, 61];
        draw.record_winner("first", Utc::now()).unwrap();

        let cards = vec![card("first", 0, CARD), card("second", 1, CARD)];
        assert_eq!(select_winner(&draw, &cards).unwrap().id, "second");
    }

    #[test]
    fn test_settle_once_records_credits_and_writes_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let store = DrawStore::open_path(dir.path()).unwrap();

        let mut draw = active_draw(Payout::Fixed {
            quadra: 100,
            quina: 300,
            cheia: 1_000,
        });
        draw.drawn_numbers = vec![1, 16, 31, 46];
        seed(&store, &draw, &[card("c1", 0, CARD)]);

        let event = settle_once(&store, "d1", Utc::now()).unwrap().unwrap();
        assert_eq!(event.tier, Tier::Quadra);
        assert_eq!(event.prize, 100);

        let stored = store.load_draw("d1").unwrap();
        assert_eq!(stored.current_phase, Tier::Quina);
        assert_eq!(stored.tier_winner(Tier::Quadra), Some("c1"));

        let account = store.load_account("u1").unwrap();
        assert_eq!(account.balance, 100);
        assert_eq!(account.total_won, 100);
        assert!(account.last_win_at.is_some());

        assert_eq!(store.load_payouts("d1").unwrap(), vec![event]);

        // Nothing left to do at quina
        assert!(settle_once(&store, "d1", Utc::now()).unwrap().is_none());
        assert_eq!(store.load_account("u1").unwrap().balance, 100);
    }

    #[test]
    fn test_settle_once_ignores_waiting_draw() {
        let dir = tempfile::tempdir().unwrap();
        let store = DrawStore::open_path(dir.path()).unwrap();

        let mut draw = active_draw(Payout::Accumulated);
        draw.status = DrawStatus::Waiting;
        draw.drawn_numbers = vec![1, 16, 31, 46];
        seed(&store, &draw, &[card("c1", 0, CARD)]);

        assert!(settle_once(&store, "d1", Utc::now()).unwrap().is_none());
        assert!(store.load_draw("d1").unwrap().winners.is_empty());
    }

    #[test]
    fn test_existing_receipt_blocks_second_payment() {
        let dir = tempfile::tempdir().unwrap();
        let store = DrawStore::open_path(dir.path()).unwrap();

        let mut draw = active_draw(Payout::Accumulated);
        draw.drawn_numbers = vec![1, 16, 31, 46];
        seed(&store, &draw, &[card("c1", 0, CARD)]);

        let txn = store.begin();
        txn.put_payout(&WinnerEvent {
            draw_id: "d1".to_string(),
            card_id: "c1".to_string(),
            user_id: "u1".to_string(),
            tier: Tier::Quadra,
            prize: 0,
            settled_at: Utc::now(),
        })
        .unwrap();
        txn.commit().unwrap();

        assert!(settle_once(&store, "d1", Utc::now()).unwrap().is_none());
        assert_eq!(store.load_account("u1").unwrap().total_won, 0);
    }
}
