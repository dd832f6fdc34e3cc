//! Bingo domain: card model, winner detection, prizes, draw lifecycle and
//! the settlement pipeline built on top of them.

pub mod accounts;
pub mod detector;
pub mod grid;
pub mod prize;
pub(crate) mod retry;
pub mod scheduler;
pub mod settlement;
pub mod state_machine;
pub mod ticker;
pub mod types;

pub use scheduler::{DrawScheduler, SweepReport};
pub use settlement::SettlementCoordinator;
pub use state_machine::Transition;
pub use ticker::{AutoDrawRegistry, TickOutcome};
pub use types::*;
