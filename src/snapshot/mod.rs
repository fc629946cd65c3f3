//! Snapshot scheduling core: which slot is due, whether it was already
//! collected, what to collect now, and how a captured value enters a record.

pub mod dedup;
pub mod planner;
pub mod record;
pub mod schedule;

pub use dedup::{is_already_collected, is_unit_collected, CollectedState};
pub use planner::{
    next_collection, plan, plan_week, reconcile_slate, CollectionUnit, KnownGames, Plan,
    RescheduleDetected,
};
pub use record::{apply, Record};
pub use schedule::{Schedule, SlotDef, SlotWindow, WeekCalendar};
