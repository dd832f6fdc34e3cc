//! Request and response bodies

use crate::bingo::types::{Cents, Draw, DrawStatus, Tier, WinnerEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Draw as shown in listings: no card data
#[derive(Debug, Serialize, Deserialize)]
pub struct DrawSummary {
    pub id: String,
    pub name: String,
    pub status: DrawStatus,
    pub current_phase: Tier,
    pub scheduled_at: DateTime<Utc>,
    pub card_price: Cents,
    pub cards_sold: u64,
    pub drawn_count: usize,
    pub winners: BTreeMap<Tier, Vec<String>>,
}

impl From<&Draw> for DrawSummary {
    fn from(draw: &Draw) -> Self {
        Self {
            id: draw.id.clone(),
            name: draw.name.clone(),
            status: draw.status,
            current_phase: draw.current_phase,
            scheduled_at: draw.scheduled_at,
            card_price: draw.card_price,
            cards_sold: draw.cards_sold,
            drawn_count: draw.drawn_numbers.len(),
            winners: draw.winners.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DrawListQuery {
    #[serde(default)]
    pub status: Option<DrawStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DrawNumberRequest {
    pub number: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettleResponse {
    pub draw_id: String,
    pub winner: Option<WinnerEvent>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub user_id: String,
    pub quantity: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAccountRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AmountRequest {
    pub amount: Cents,
}
