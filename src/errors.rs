//! Error types for the bingo draw engine
//!
//! Validation errors are terminal for the call that produced them. Conflict
//! errors are transient: the state was left untouched and the caller may try
//! again later.

use crate::bingo::types::{DrawStatus, Tier};

/// Root error type for all engine operations
#[derive(Debug, thiserror::Error)]
pub enum BingoError {
    /// Operation not allowed in the draw's current lifecycle state
    #[error("Invalid transition for draw {draw_id}: {action} not allowed while {status}")]
    InvalidTransition {
        draw_id: String,
        action: &'static str,
        status: DrawStatus,
    },

    #[error("Number {number} already drawn in draw {draw_id}")]
    DuplicateNumber { draw_id: String, number: u8 },

    #[error("Number {number} outside the drawable range 1..=90")]
    NumberOutOfRange { number: u32 },

    /// Optimistic transaction lost a race; nothing was written
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    /// Settlement retries exhausted; the draw is exactly as it was
    #[error("Settlement of draw {draw_id} deferred after {attempts} conflicting attempts")]
    SettlementDeferred { draw_id: String, attempts: u32 },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Tier {tier} already settled for draw {draw_id}")]
    TierAlreadySettled { draw_id: String, tier: Tier },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BingoError {
    pub fn draw_not_found(draw_id: &str) -> Self {
        BingoError::NotFound {
            kind: "Draw",
            id: draw_id.to_string(),
        }
    }

    pub fn account_not_found(user_id: &str) -> Self {
        BingoError::NotFound {
            kind: "Account",
            id: user_id.to_string(),
        }
    }

    /// True when the caller should treat the failure as "state unchanged, try again later"
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BingoError::TransactionConflict(_) | BingoError::SettlementDeferred { .. }
        )
    }
}

impl From<rocksdb::Error> for BingoError {
    fn from(e: rocksdb::Error) -> Self {
        match e.kind() {
            rocksdb::ErrorKind::Busy | rocksdb::ErrorKind::TryAgain => {
                BingoError::TransactionConflict(e.to_string())
            }
            _ => BingoError::Storage(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for BingoError {
    fn from(e: serde_json::Error) -> Self {
        BingoError::CorruptedData(e.to_string())
    }
}

// Convenience type alias for Results
pub type BingoResult<T> = Result<T, BingoError>;
