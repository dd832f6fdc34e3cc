use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Monetary amounts are integer cents
pub type Cents = u64;

/// Highest drawable number; the pool is 1..=MAX_NUMBER
pub const MAX_NUMBER: u8 = 90;

/// Prize tiers, contested in this order. `Ord` follows the contest order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Quadra,
    Quina,
    Cheia,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Quadra, Tier::Quina, Tier::Cheia];

    /// Tier contested after this one; `None` at cheia
    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Quadra => Some(Tier::Quina),
            Tier::Quina => Some(Tier::Cheia),
            Tier::Cheia => None,
        }
    }

    /// Tiers contested before this one
    pub fn lower(self) -> &'static [Tier] {
        match self {
            Tier::Quadra => &[],
            Tier::Quina => &[Tier::Quadra],
            Tier::Cheia => &[Tier::Quadra, Tier::Quina],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Quadra => "quadra",
            Tier::Quina => "quina",
            Tier::Cheia => "cheia",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Draw lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DrawStatus {
    Waiting,
    Active,
    Finished,
}

impl fmt::Display for DrawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawStatus::Waiting => write!(f, "waiting"),
            DrawStatus::Active => write!(f, "active"),
            DrawStatus::Finished => write!(f, "finished"),
        }
    }
}

/// Where drawn numbers come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DrawMode {
    /// Entered by an operator (or relayed from an external generator)
    Manual,
    /// Generated internally on a timer
    Automatic,
}

/// Prize configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payout {
    Fixed {
        quadra: Cents,
        quina: Cents,
        cheia: Cents,
    },
    /// Percentage split of the pool derived from ticket revenue
    Accumulated,
}

/// A single bingo draw as persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Draw {
    pub id: String,
    pub name: String,
    pub scheduled_at: DateTime<Utc>,
    pub card_price: Cents,
    pub payout: Payout,
    pub mode: DrawMode,
    pub status: DrawStatus,
    pub current_phase: Tier,
    pub drawn_numbers: Vec<u8>,
    #[serde(default)]
    pub winners: BTreeMap<Tier, Vec<String>>,
    #[serde(default)]
    pub cards_sold: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Operator request to create a draw
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDraw {
    pub name: String,
    pub scheduled_at: DateTime<Utc>,
    pub card_price: Cents,
    pub payout: Payout,
    pub mode: DrawMode,
    #[serde(default)]
    pub external_url: Option<String>,
}

/// A purchased card. Numbers are a 5x5 grid in row-major order; the centre
/// cell holds 0 and is always marked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: String,
    pub user_id: String,
    pub draw_id: String,
    /// Position in the draw's sale order
    pub serial: u64,
    pub numbers: [u8; 25],
    pub purchased_at: DateTime<Utc>,
}

/// User balance and lifetime totals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAccount {
    pub id: String,
    pub name: String,
    pub balance: Cents,
    #[serde(default)]
    pub total_deposited: Cents,
    #[serde(default)]
    pub total_withdrawn: Cents,
    #[serde(default)]
    pub total_won: Cents,
    #[serde(default)]
    pub last_win_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Record of a card purchase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Purchase {
    pub id: String,
    pub user_id: String,
    pub draw_id: String,
    pub quantity: u32,
    pub total_amount: Cents,
    pub card_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Announcement of a settled tier. Also stored as the durable payout receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WinnerEvent {
    pub draw_id: String,
    pub card_id: String,
    pub user_id: String,
    pub tier: Tier,
    pub prize: Cents,
    pub settled_at: DateTime<Utc>,
}

/// Change notifications for observers. Never used for correctness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawEvent {
    DrawStarted {
        draw_id: String,
    },
    NumberDrawn {
        draw_id: String,
        number: u8,
        drawn_count: usize,
    },
    WinnerSettled(WinnerEvent),
    DrawFinished {
        draw_id: String,
    },
}

impl DrawEvent {
    pub fn draw_id(&self) -> &str {
        match self {
            DrawEvent::DrawStarted { draw_id }
            | DrawEvent::NumberDrawn { draw_id, .. }
            | DrawEvent::DrawFinished { draw_id } => draw_id,
            DrawEvent::WinnerSettled(event) => &event.draw_id,
        }
    }
}
