use crate::models::{EntityKey, Slot};
use std::fmt;
use thiserror::Error;

/// Errors raised by the snapshot core. Each one is scoped to a single unit or entity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("Sequence violation for {key} at {slot}: {reason}")]
    SequenceViolation {
        key: EntityKey,
        slot: Slot,
        reason: ViolationReason,
    },

    #[error("Unknown slot: {0}")]
    UnknownSlot(Slot),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid pick: {0}")]
    InvalidPick(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationReason {
    AlreadyFilled,
    OutOfOrder { latest: Slot },
    NotApplicable,
    EmptyValue,
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationReason::AlreadyFilled => f.write_str("slot already filled"),
            ViolationReason::OutOfOrder { latest } => {
                write!(f, "{} is already filled", latest)
            }
            ViolationReason::NotApplicable => f.write_str("slot does not apply to this record"),
            ViolationReason::EmptyValue => f.write_str("value carries no line or price"),
        }
    }
}
