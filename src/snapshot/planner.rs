use crate::models::{Game, GameId, LineMarket, Market, PropMarket, RecordFamily, Slot};
use crate::snapshot::dedup::{is_unit_collected, CollectedState};
use crate::snapshot::schedule::Schedule;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// One planned (game, market, slot) collection task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionUnit {
    pub game: Game,
    pub market: Market,
    pub slot: Slot,
}

impl CollectionUnit {
    pub fn format(&self, schedule: &Schedule) -> String {
        format!(
            "{} | {} | {} | {} ({})",
            self.game.game_id,
            self.game.matchup(),
            self.market,
            self.slot,
            schedule.name(self.slot)
        )
    }
}

/// A game's kickoff moved after at least one of its slots was collected
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RescheduleDetected {
    pub game_id: GameId,
    pub recorded: DateTime<Utc>,
    pub current: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    pub units: Vec<CollectionUnit>,
    pub reschedules: Vec<RescheduleDetected>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// What the ledger already knows about a provider event
pub trait KnownGames {
    fn known_game(&self, event_id: &str) -> Option<&Game>;

    fn has_collected(&self, game_id: &GameId) -> bool;
}

/// Match slate games to games already in the ledger.
///
/// A recorded game keeps its `Game_ID`; the slate's kickoff becomes the
/// effective kickoff. A moved kickoff on a game with collected slots is
/// reported and otherwise left to the caller.
pub fn reconcile_slate<K: KnownGames + ?Sized>(
    games: &[Game],
    known: &K,
) -> (Vec<Game>, Vec<RescheduleDetected>) {
    let mut reschedules = Vec::new();
    let games = games
        .iter()
        .map(|game| {
            let Some(recorded) = known.known_game(&game.event_id) else {
                return game.clone();
            };
            if recorded.kickoff != game.kickoff && known.has_collected(&recorded.game_id) {
                reschedules.push(RescheduleDetected {
                    game_id: recorded.game_id.clone(),
                    recorded: recorded.kickoff,
                    current: game.kickoff,
                });
            }
            Game {
                game_id: recorded.game_id.clone(),
                ..game.clone()
            }
        })
        .collect();
    (games, reschedules)
}

/// Build the ordered list of units due at `now`.
///
/// Game lines are considered for every game; props only for games kicking off
/// on `now`'s local day. A unit is emitted when a slot resolves and has not
/// been collected. Output is ordered by kickoff, then `Game_ID`, then market.
pub fn plan<S: CollectedState + ?Sized>(
    schedule: &Schedule,
    games: &[Game],
    state: &S,
    now: DateTime<Utc>,
) -> Vec<CollectionUnit> {
    let mut slate: Vec<&Game> = games.iter().collect();
    slate.sort_by(|a, b| {
        a.kickoff
            .cmp(&b.kickoff)
            .then_with(|| a.game_id.cmp(&b.game_id))
    });
    // One entry per Game_ID, the earliest kickoff wins
    let mut seen = BTreeSet::new();
    slate.retain(|game| seen.insert(game.game_id.clone()));

    let mut units = Vec::new();
    for game in slate {
        let mut markets: Vec<Market> = LineMarket::ALL.iter().copied().map(Market::Line).collect();
        if schedule.is_game_day(game.kickoff, now) {
            markets.extend(PropMarket::ALL.iter().copied().map(Market::Prop));
        }

        for market in markets {
            let Some(slot) = schedule.resolve(market.family(), game.kickoff, now) else {
                continue;
            };
            if is_unit_collected(state, &game.game_id, market, slot) {
                continue;
            }
            units.push(CollectionUnit {
                game: game.clone(),
                market,
                slot,
            });
        }
    }
    units
}

/// Reconcile the slate against the ledger, then plan
pub fn plan_week<S>(schedule: &Schedule, slate: &[Game], state: &S, now: DateTime<Utc>) -> Plan
where
    S: CollectedState + KnownGames + ?Sized,
{
    let (games, reschedules) = reconcile_slate(slate, state);
    Plan {
        units: plan(schedule, &games, state, now),
        reschedules,
    }
}

/// Earliest upcoming window across the slate, for "nothing to do now" reporting
pub fn next_collection(
    schedule: &Schedule,
    games: &[Game],
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, Slot, GameId)> {
    games
        .iter()
        .flat_map(|game| {
            [RecordFamily::GameLines, RecordFamily::Props]
                .into_iter()
                .filter_map(move |family| schedule.next_window(family, game.kickoff, now))
                .map(move |(slot, start)| (start, slot, game.game_id.clone()))
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityKey, SlotValue};
    use crate::snapshot::record::{apply, Record};
    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct Ledger {
        games: BTreeMap<String, Game>,
        records: BTreeMap<EntityKey, Record>,
    }

    impl CollectedState for Ledger {
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

    impl KnownGames for Ledger {
        fn known_game(&self, event_id: &str) -> Option<&Game> {
            self.games.get(event_id)
        }

        fn has_collected(&self, game_id: &GameId) -> bool {
            self.records
                .iter()
                .any(|(key, record)| key.game_id() == game_id && record.latest_filled().is_some())
        }
    }

    impl Ledger {
        fn fill(&mut self, schedule: &Schedule, unit: &CollectionUnit) {
            let key = match unit.market {
                Market::Line(m) => EntityKey::line(unit.game.game_id.clone(), m),
                Market::Prop(m) => EntityKey::prop(unit.game.game_id.clone(), "Player", m, "Book"),
            };
            let value = SlotValue {
                line: Some(1.5),
                price: Some(-110),
                counter_price: Some(-110),
                bookmaker: "Book".to_string(),
                collected_at: unit.game.kickoff,
            };
            let current = self.records.get(&key).cloned().unwrap_or_default();
            let next = apply(schedule, &key, unit.slot, value, &current).unwrap();
            self.records.insert(key, next);
            self.games
                .entry(unit.game.event_id.clone())
                .or_insert_with(|| unit.game.clone());
        }
    }

    fn et(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        New_York
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn slate() -> Vec<Game> {
        vec![
            Game::new("e3", "Buffalo Bills", "New York Jets", et(2025, 9, 14, 13, 0)),
            Game::new("e1", "Philadelphia Eagles", "Dallas Cowboys", et(2025, 9, 11, 20, 15)),
            Game::new("e2", "Kansas City Chiefs", "Baltimore Ravens", et(2025, 9, 14, 13, 0)),
        ]
    }

    #[test]
    fn test_empty_slate_gives_empty_plan() {
        let schedule = Schedule::default();
        let units = plan(&schedule, &[], &Ledger::default(), et(2025, 9, 9, 12, 0));
        assert!(units.is_empty());
    }

    #[test]
    fn test_tuesday_plans_opening_lines_in_slate_order() {
        let schedule = Schedule::default();
        let units = plan(&schedule, &slate(), &Ledger::default(), et(2025, 9, 9, 12, 0));

        assert_eq!(units.len(), 9);
        assert!(units.iter().all(|u| u.slot == Slot::OPENING));
        assert!(units.iter().all(|u| matches!(u.market, Market::Line(_))));
        let order: Vec<&str> = units.iter().step_by(3).map(|u| u.game.event_id.as_str()).collect();
        // Thursday first, then the two Sunday games by Game_ID (BALT_KANS < NEWY_BUFF)
        assert_eq!(order, vec!["e1", "e2", "e3"]);
        assert_eq!(
            units[..3].iter().map(|u| u.market).collect::<Vec<_>>(),
            vec![
                Market::Line(LineMarket::Spread),
                Market::Line(LineMarket::Total),
                Market::Line(LineMarket::Moneyline)
            ]
        );
    }

    #[test]
    fn test_duplicate_game_id_is_planned_once() {
        let schedule = Schedule::default();
        let game = slate()[2].clone();
        // Same game twice with different kickoffs, a third game sorting between them
        let later = Game {
            kickoff: game.kickoff + chrono::Duration::hours(3),
            ..game.clone()
        };
        let games = vec![later, slate()[0].clone(), game.clone()];

        let units = plan(&schedule, &games, &Ledger::default(), et(2025, 9, 9, 12, 0));
        let for_game: Vec<_> = units.iter().filter(|u| u.game.game_id == game.game_id).collect();
        assert_eq!(for_game.len(), 3);
        assert!(for_game.iter().all(|u| u.game.kickoff == game.kickoff));
        assert_eq!(units.len(), 6);
    }

    #[test]
    fn test_game_day_plans_final_lines_and_props() {
        let schedule = Schedule::default();
        let now = et(2025, 9, 11, 18, 0);
        let units = plan(&schedule, &slate(), &Ledger::default(), now);

        // Thursday game: 3 final lines + 6 prop markets. Sunday games: opening lines.
        let thursday: Vec<_> = units.iter().filter(|u| u.game.event_id == "e1").collect();
        assert_eq!(thursday.len(), 9);
        assert!(thursday.iter().all(|u| u.slot == Slot::FINAL));
        let sunday: Vec<_> = units.iter().filter(|u| u.game.event_id != "e1").collect();
        assert_eq!(sunday.len(), 6);
        assert!(sunday.iter().all(|u| u.slot == Slot::OPENING));
    }

    #[test]
    fn test_game_day_before_lead_window_has_no_props() {
        let schedule = Schedule::default();
        let units = plan(&schedule, &slate()[1..2], &Ledger::default(), et(2025, 9, 11, 9, 0));
        assert!(units.is_empty());
    }

    #[test]
    fn test_missed_final_is_not_backfilled() {
        let schedule = Schedule::default();
        let units = plan(&schedule, &slate()[1..2], &Ledger::default(), et(2025, 9, 11, 21, 0));
        assert!(units.is_empty());
    }

    #[test]
    fn test_plan_is_idempotent_against_same_state() {
        let schedule = Schedule::default();
        let ledger = Ledger::default();
        let now = et(2025, 9, 11, 18, 0);
        assert_eq!(
            plan(&schedule, &slate(), &ledger, now),
            plan(&schedule, &slate(), &ledger, now)
        );
    }

    #[test]
    fn test_replan_after_partial_run_yields_remaining_units() {
        let schedule = Schedule::default();
        let mut ledger = Ledger::default();
        let now = et(2025, 9, 11, 18, 0);
        let first = plan(&schedule, &slate(), &ledger, now);

        let (done, rest) = first.split_at(5);
        for unit in done {
            ledger.fill(&schedule, unit);
        }
        let second = plan(&schedule, &slate(), &ledger, now);
        assert_eq!(second, rest.to_vec());

        for unit in &second {
            ledger.fill(&schedule, unit);
        }
        assert!(plan(&schedule, &slate(), &ledger, now).is_empty());
    }

    #[test]
    fn test_reschedule_is_reported_and_identity_kept() {
        let schedule = Schedule::default();
        let mut ledger = Ledger::default();
        let original = slate()[2].clone();
        let unit = CollectionUnit {
            game: original.clone(),
            market: Market::Line(LineMarket::Spread),
            slot: Slot::OPENING,
        };
        ledger.fill(&schedule, &unit);

        // Flexed from Sunday 13:00 to Sunday 20:20, same provider event
        let moved = Game::new("e2", "Kansas City Chiefs", "Baltimore Ravens", et(2025, 9, 14, 20, 20));
        let plan = plan_week(&schedule, &[moved.clone()], &ledger, et(2025, 9, 10, 12, 0));

        assert_eq!(
            plan.reschedules,
            vec![RescheduleDetected {
                game_id: original.game_id.clone(),
                recorded: original.kickoff,
                current: moved.kickoff,
            }]
        );
        assert!(plan.units.iter().all(|u| u.game.game_id == original.game_id));
        // Spread opening already collected; total and moneyline still due
        assert_eq!(plan.units.len(), 2);
    }

    #[test]
    fn test_new_kickoff_without_collection_is_not_a_reschedule() {
        let mut ledger = Ledger::default();
        let game = slate()[0].clone();
        ledger.games.insert(game.event_id.clone(), game.clone());
        let moved = Game {
            kickoff: game.kickoff + chrono::Duration::hours(3),
            ..game
        };
        let (_, reschedules) = reconcile_slate(&[moved], &ledger);
        assert!(reschedules.is_empty());
    }

    #[test]
    fn test_next_collection() {
        let schedule = Schedule::default();
        let next = next_collection(&schedule, &slate(), et(2025, 9, 10, 12, 0));
        assert_eq!(next.map(|(at, slot, _)| (at, slot)), Some((et(2025, 9, 11, 17, 45), Slot::FINAL)));
    }
}
