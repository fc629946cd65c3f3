pub mod api;
pub mod collector;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod snapshot;
pub mod utils;

pub use api::*;
pub use collector::{run_collection, RunReport, UnitOutcome, UnitResult};
pub use config::Config;
pub use error::{SnapshotError, ViolationReason};
pub use ledger::{SlotStatus, WeekLedger};
pub use models::*;
pub use snapshot::*;
pub use utils::*;
