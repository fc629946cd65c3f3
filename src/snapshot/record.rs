use crate::error::{SnapshotError, ViolationReason};
use crate::models::{EntityKey, Slot, SlotValue};
use crate::snapshot::schedule::Schedule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot history of one line or prop. Filled slots never change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    slots: BTreeMap<Slot, SlotValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored value, placeholders included
    pub fn get(&self, slot: Slot) -> Option<&SlotValue> {
        self.slots.get(&slot)
    }

    /// The captured value at `slot`, ignoring placeholders
    pub fn value(&self, slot: Slot) -> Option<&SlotValue> {
        self.get(slot).filter(|value| !value.is_placeholder())
    }

    pub fn is_filled(&self, slot: Slot) -> bool {
        self.value(slot).is_some()
    }

    /// Filled slots in sequence order
    pub fn filled(&self) -> impl Iterator<Item = (Slot, &SlotValue)> {
        self.slots
            .iter()
            .filter(|(_, value)| !value.is_placeholder())
            .map(|(slot, value)| (*slot, value))
    }

    pub fn latest_filled(&self) -> Option<Slot> {
        self.filled().map(|(slot, _)| slot).last()
    }

    /// Line movement between the earliest and latest filled slots that carry a line
    pub fn movement(&self) -> Option<f64> {
        let mut lines = self.filled().filter_map(|(_, value)| value.line);
        let first = lines.next()?;
        let last = lines.last()?;
        Some(last - first)
    }
}

/// Fill `slot` of `record` with `value`, returning the new record state.
///
/// The slot must be absent, known to the schedule, applicable to the entity,
/// and not earlier than any slot already filled. On error `record` is untouched.
pub fn apply(
    schedule: &Schedule,
    key: &EntityKey,
    slot: Slot,
    value: SlotValue,
    record: &Record,
) -> Result<Record, SnapshotError> {
    let violation = |reason| SnapshotError::SequenceViolation {
        key: key.clone(),
        slot,
        reason,
    };

    let def = schedule.slot(slot).ok_or(SnapshotError::UnknownSlot(slot))?;
    if !def.applies_to(key.family()) {
        return Err(violation(ViolationReason::NotApplicable));
    }
    if value.is_placeholder() {
        return Err(violation(ViolationReason::EmptyValue));
    }
    if record.is_filled(slot) {
        return Err(violation(ViolationReason::AlreadyFilled));
    }
    if let Some(latest) = record.latest_filled() {
        if latest > slot {
            return Err(violation(ViolationReason::OutOfOrder { latest }));
        }
    }

    let mut next = record.clone();
    next.slots.insert(slot, value);
    Ok(next)
}
