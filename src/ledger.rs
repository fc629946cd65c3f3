use crate::error::SnapshotError;
use crate::models::{EntityKey, Game, GameId, Market, Slot, SlotValue};
use crate::snapshot::{apply, CollectedState, KnownGames, Record, Schedule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Everything persisted for one week: the games seen and every entity's snapshot record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "LedgerFile", into = "LedgerFile")]
pub struct WeekLedger {
    pub week: u32,
    games: BTreeMap<String, Game>,
    records: BTreeMap<EntityKey, Record>,
}

/// On-disk shape; JSON maps need string keys
#[derive(Serialize, Deserialize)]
struct LedgerFile {
    week: u32,
    #[serde(default)]
    games: Vec<Game>,
    #[serde(default)]
    records: Vec<LedgerEntry>,
}

#[derive(Serialize, Deserialize)]
struct LedgerEntry {
    key: EntityKey,
    record: Record,
}

impl From<LedgerFile> for WeekLedger {
    fn from(file: LedgerFile) -> Self {
        Self {
            week: file.week,
            games: file
                .games
                .into_iter()
                .map(|game| (game.event_id.clone(), game))
                .collect(),
            records: file
                .records
                .into_iter()
                .map(|entry| (entry.key, entry.record))
                .collect(),
        }
    }
}

impl From<WeekLedger> for LedgerFile {
    fn from(ledger: WeekLedger) -> Self {
        Self {
            week: ledger.week,
            games: ledger.games.into_values().collect(),
            records: ledger
                .records
                .into_iter()
                .map(|(key, record)| LedgerEntry { key, record })
                .collect(),
        }
    }
}

/// Filled-record count per slot, the "Data Collection Status" view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotStatus {
    pub slot: Slot,
    pub name: String,
    pub lines_filled: usize,
    pub props_filled: usize,
}

impl WeekLedger {
    pub fn new(week: u32) -> Self {
        Self {
            week,
            ..Self::default()
        }
    }

    pub fn games(&self) -> impl Iterator<Item = &Game> {
        self.games.values()
    }

    pub fn game_by_id(&self, game_id: &GameId) -> Option<&Game> {
        self.games.values().find(|game| &game.game_id == game_id)
    }

    pub fn records(&self) -> impl Iterator<Item = (&EntityKey, &Record)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remember a game. The first-seen identity and kickoff are kept; a new
    /// kickoff is only taken while nothing has been collected for the game.
    pub fn register_game(&mut self, game: &Game) {
        // A moved game derives a new Game_ID; collection is tracked under the recorded one
        let collected = match self.games.get(&game.event_id) {
            Some(known) => self.has_collected(&known.game_id),
            None => {
                self.games.insert(game.event_id.clone(), game.clone());
                return;
            }
        };
        if let Some(known) = self.games.get_mut(&game.event_id) {
            if !collected && known.kickoff != game.kickoff {
                known.kickoff = game.kickoff;
            }
        }
    }

    /// Take the provider's new kickoff for a rescheduled game
    pub fn accept_kickoff(&mut self, game_id: &GameId, kickoff: DateTime<Utc>) -> bool {
        match self.games.values_mut().find(|game| &game.game_id == game_id) {
            Some(game) => {
                game.kickoff = kickoff;
                true
            }
            None => false,
        }
    }

    /// Write one slot. Either the whole record is replaced or nothing changes.
    pub fn apply(
        &mut self,
        schedule: &Schedule,
        key: EntityKey,
        slot: Slot,
        value: SlotValue,
    ) -> Result<(), SnapshotError> {
        let next = {
            let current = self.records.get(&key);
            let empty = Record::new();
            apply(schedule, &key, slot, value, current.unwrap_or(&empty))?
        };
        debug!(key = %key, slot = slot.index(), "Filled slot");
        self.records.insert(key, next);
        Ok(())
    }

    pub fn collection_status(&self, schedule: &Schedule) -> Vec<SlotStatus> {
        schedule
            .slots()
            .map(|(slot, def)| {
                let (mut lines_filled, mut props_filled) = (0, 0);
                for (key, record) in &self.records {
                    if record.is_filled(slot) {
                        match key {
                            EntityKey::Line { .. } => lines_filled += 1,
                            EntityKey::Prop { .. } => props_filled += 1,
                        }
                    }
                }
                SlotStatus {
                    slot,
                    name: def.name.clone(),
                    lines_filled,
                    props_filled,
                }
            })
            .collect()
    }
}

impl CollectedState for WeekLedger {
    fn record(&self, key: &EntityKey) -> Option<&Record> {
        self.records.get(key)
    }

    fn market_records<'a>(&'a self, game_id: &GameId, market: Market) -> Vec<&'a Record> {
        self.records
            .iter()
            .filter(|(key, _)| key.game_id() == game_id && key.market() == market)
            .map(|(_, record)| record)
            .collect()
    }
}

impl KnownGames for WeekLedger {
    fn known_game(&self, event_id: &str) -> Option<&Game> {
        self.games.get(event_id)
    }

    fn has_collected(&self, game_id: &GameId) -> bool {
        self.records
            .iter()
            .any(|(key, record)| key.game_id() == game_id && record.latest_filled().is_some())
    }
}
