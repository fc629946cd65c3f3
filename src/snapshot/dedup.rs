use crate::models::{EntityKey, GameId, Market, Slot};
use crate::snapshot::record::Record;

/// Read-only view of what has already been persisted for the week.
///
/// Callers load this once per run so every check in a run sees the same state.
pub trait CollectedState {
    fn record(&self, key: &EntityKey) -> Option<&Record>;

    /// Every record stored for a game and market, across players and bookmakers
    fn market_records<'a>(&'a self, game_id: &GameId, market: Market) -> Vec<&'a Record>;
}

/// True iff `slot` holds a captured (non-placeholder) value for `key`
pub fn is_already_collected<S: CollectedState + ?Sized>(state: &S, key: &EntityKey, slot: Slot) -> bool {
    state.record(key).is_some_and(|record| record.is_filled(slot))
}

/// Unit-level check. Prop entities are only known after a fetch, so a prop
/// market counts as collected once any of its entities has the slot filled.
pub fn is_unit_collected<S: CollectedState + ?Sized>(
    state: &S,
    game_id: &GameId,
    market: Market,
    slot: Slot,
) -> bool {
    match market {
        Market::Line(line) => {
            is_already_collected(state, &EntityKey::line(game_id.clone(), line), slot)
        }
        Market::Prop(_) => state
            .market_records(game_id, market)
            .iter()
            .any(|record| record.is_filled(slot)),
    }
}
