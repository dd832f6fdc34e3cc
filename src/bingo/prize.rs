//! Prize amounts per tier.

use super::types::{Cents, Draw, Payout, Tier};

/// Share of ticket revenue paid back as prizes (the house keeps the rest)
pub const POOL_PERCENT: u64 = 70;

/// Share of the accumulated pool paid for a tier
pub fn pool_weight_percent(tier: Tier) -> u64 {
    match tier {
        Tier::Quadra => 20,
        Tier::Quina => 30,
        Tier::Cheia => 50,
    }
}

/// Accumulated pool for a draw given its sold card count. Floors to whole cents.
pub fn accumulated_pool(cards_sold: u64, card_price: Cents) -> Cents {
    cards_sold.saturating_mul(card_price).saturating_mul(POOL_PERCENT) / 100
}

/// Prize for `tier` under the draw's payout configuration.
///
/// Accumulated draws use the draw's `cards_sold` as given; callers pass a
/// draw read inside the settlement transaction.
pub fn calculate(tier: Tier, draw: &Draw) -> Cents {
    match &draw.payout {
        Payout::Fixed {
            quadra,
            quina,
            cheia,
        } => match tier {
            Tier::Quadra => *quadra,
            Tier::Quina => *quina,
            Tier::Cheia => *cheia,
        },
        Payout::Accumulated => {
            accumulated_pool(draw.cards_sold, draw.card_price) * pool_weight_percent(tier) / 100
        }
    }
}
