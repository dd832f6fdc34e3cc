//! Draw lifecycle and phase cursor.
//!
//! These methods only mutate an in-memory `Draw`. Persisting the result is
//! the caller's job and must happen inside a store transaction that read the
//! draw with `get_for_update`.

use super::types::{Draw, DrawStatus, NewDraw, Payout, Tier, MAX_NUMBER};
use crate::errors::{BingoError, BingoResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Outcome of an idempotent transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Unchanged,
}

impl Transition {
    pub fn applied(self) -> bool {
        self == Transition::Applied
    }
}

impl Draw {
    /// Build a waiting draw from an operator request
    pub fn create(id: String, request: NewDraw, now: DateTime<Utc>) -> BingoResult<Self> {
        if request.name.trim().is_empty() {
            return Err(BingoError::InvalidRequest("draw name is required".to_string()));
        }
        if request.card_price == 0 {
            return Err(BingoError::InvalidRequest("card price must be positive".to_string()));
        }
        if let Payout::Fixed { quadra, quina, cheia } = request.payout {
            if quadra == 0 || quina == 0 || cheia == 0 {
                return Err(BingoError::InvalidRequest(
                    "fixed draws need a positive prize for every tier".to_string(),
                ));
            }
        }

        Ok(Self {
            id,
            name: request.name,
            scheduled_at: request.scheduled_at,
            card_price: request.card_price,
            payout: request.payout,
            mode: request.mode,
            status: DrawStatus::Waiting,
            current_phase: Tier::Quadra,
            drawn_numbers: Vec::new(),
            winners: BTreeMap::new(),
            cards_sold: 0,
            external_url: request.external_url,
            created_at: now,
            started_at: None,
            finished_at: None,
        })
    }

    /// Waiting and past its scheduled start
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DrawStatus::Waiting && self.scheduled_at <= now
    }

    /// waiting -> active. Anything else is a no-op.
    pub fn start(&mut self, now: DateTime<Utc>) -> Transition {
        if self.status != DrawStatus::Waiting {
            return Transition::Unchanged;
        }
        self.status = DrawStatus::Active;
        self.started_at = Some(now);
        Transition::Applied
    }

    /// Force-finish. Finishing an already finished draw is a no-op.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Transition {
        if self.status == DrawStatus::Finished {
            return Transition::Unchanged;
        }
        self.status = DrawStatus::Finished;
        self.finished_at = Some(now);
        Transition::Applied
    }

    /// Append a drawn number. State is unchanged on any rejection.
    pub fn append_number(&mut self, number: u32) -> BingoResult<u8> {
        if self.status != DrawStatus::Active {
            return Err(self.invalid("draw number"));
        }
        let number = match u8::try_from(number) {
            Ok(n) if (1..=MAX_NUMBER).contains(&n) => n,
            _ => return Err(BingoError::NumberOutOfRange { number }),
        };
        if self.drawn_numbers.contains(&number) {
            return Err(BingoError::DuplicateNumber {
                draw_id: self.id.clone(),
                number,
            });
        }

        self.drawn_numbers.push(number);
        Ok(number)
    }

    /// Numbers still in the pool, ascending
    pub fn remaining_numbers(&self) -> Vec<u8> {
        (1..=MAX_NUMBER)
            .filter(|n| !self.drawn_numbers.contains(n))
            .collect()
    }

    pub fn is_exhausted(&self) -> bool {
        self.drawn_numbers.len() >= MAX_NUMBER as usize
    }

    pub fn is_settled(&self, tier: Tier) -> bool {
        self.winners.get(&tier).is_some_and(|cards| !cards.is_empty())
    }

    pub fn tier_winner(&self, tier: Tier) -> Option<&str> {
        self.winners
            .get(&tier)
            .and_then(|cards| cards.first())
            .map(String::as_str)
    }

    /// Cards that already won a tier below the current phase
    pub fn excluded_cards(&self) -> Vec<&str> {
        self.current_phase
            .lower()
            .iter()
            .filter_map(|&tier| self.tier_winner(tier))
            .collect()
    }

    /// Record the winner of the current phase and move the cursor forward.
    /// At cheia the cursor stays and the draw finishes.
    pub fn record_winner(&mut self, card_id: &str, now: DateTime<Utc>) -> BingoResult<Tier> {
        if self.status != DrawStatus::Active {
            return Err(self.invalid("settle"));
        }
        let tier = self.current_phase;
        if self.is_settled(tier) {
            return Err(BingoError::TierAlreadySettled {
                draw_id: self.id.clone(),
                tier,
            });
        }

        self.winners.insert(tier, vec![card_id.to_string()]);
        match tier.next() {
            Some(next) => self.current_phase = next,
            None => {
                self.finish(now);
            }
        }
        Ok(tier)
    }

    fn invalid(&self, action: &'static str) -> BingoError {
        BingoError::InvalidTransition {
            draw_id: self.id.clone(),
            action,
            status: self.status,
        }
    }
}
