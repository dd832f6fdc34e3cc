//! Bingo draw engine
//!
//! Draw progression and prize settlement for real-money bingo: numbers are
//! drawn manually or on a timer, and each prize tier (quadra, quina, cheia)
//! is detected and paid exactly once even when several triggers settle the
//! same draw concurrently. State lives in RocksDB and every read-modify-write
//! is an optimistic transaction.

pub mod api;
pub mod bingo;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod storage;

pub use bingo::types::{
    Card, Cents, Draw, DrawEvent, DrawMode, DrawStatus, NewDraw, Payout, Purchase, Tier, UserAccount,
    WinnerEvent,
};
pub use bingo::{AutoDrawRegistry, DrawScheduler, SettlementCoordinator, SweepReport, TickOutcome};
pub use config::EngineConfig;
pub use engine::{DrawEngine, DrawProgress, SettlementPass};
pub use errors::{BingoError, BingoResult};
pub use events::EventBus;
pub use storage::DrawStore;
