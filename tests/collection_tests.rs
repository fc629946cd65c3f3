use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use nfl_line_tracker::api::OddsProvider;
use nfl_line_tracker::collector::{run_collection, UnitResult};
use nfl_line_tracker::data::{load_ledger, save_ledger};
use nfl_line_tracker::ledger::WeekLedger;
use nfl_line_tracker::models::{EntityKey, Game, LineMarket, Market, Quote, Slot, SlotValue};
use nfl_line_tracker::snapshot::{is_already_collected, plan_week, Schedule};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serves fixed odds; after `budget` successful fetches every call fails,
/// like a run that hits its request quota mid-way
struct ScriptedProvider {
    slate: Vec<Game>,
    budget: usize,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(slate: Vec<Game>, budget: usize) -> Self {
        Self {
            slate,
            budget,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OddsProvider for ScriptedProvider {
    async fn fetch_slate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Game>> {
        Ok(self
            .slate
            .iter()
            .filter(|g| g.kickoff >= start && g.kickoff < end)
            .cloned()
            .collect())
    }

    async fn fetch_unit(&self, game: &Game, market: Market) -> Result<Vec<Quote>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.budget {
            anyhow::bail!("Odds API returned error: 401 Unauthorized");
        }
        let value = |line: Option<f64>, price: i32, counter: i32| SlotValue {
            line,
            price: Some(price),
            counter_price: Some(counter),
            bookmaker: "DraftKings".to_string(),
            collected_at: Utc::now(),
        };
        Ok(match market {
            Market::Line(LineMarket::Spread) => vec![Quote {
                key: EntityKey::line(game.game_id.clone(), LineMarket::Spread),
                value: value(Some(-3.5), -110, -110),
            }],
            Market::Line(LineMarket::Total) => vec![Quote {
                key: EntityKey::line(game.game_id.clone(), LineMarket::Total),
                value: value(Some(44.5), -105, -115),
            }],
            Market::Line(LineMarket::Moneyline) => vec![Quote {
                key: EntityKey::line(game.game_id.clone(), LineMarket::Moneyline),
                value: value(None, -170, 145),
            }],
            Market::Prop(prop) => ["Josh Allen", "James Cook"]
                .into_iter()
                .map(|player| Quote {
                    key: EntityKey::prop(game.game_id.clone(), player, prop, "DraftKings"),
                    value: value(Some(1.5), -120, 100),
                })
                .collect(),
        })
    }
}

fn et(d: u32, h: u32, min: u32) -> DateTime<Utc> {
    New_York
        .with_ymd_and_hms(2025, 9, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

fn slate() -> Vec<Game> {
    vec![
        Game::new("thu", "Green Bay Packers", "Washington Commanders", et(11, 20, 15)),
        Game::new("sun-1", "Buffalo Bills", "New York Jets", et(14, 13, 0)),
        Game::new("sun-2", "Kansas City Chiefs", "Philadelphia Eagles", et(14, 16, 25)),
    ]
}

fn filled_slots(ledger: &WeekLedger) -> usize {
    ledger.records().map(|(_, record)| record.filled().count()).sum()
}

#[tokio::test]
async fn test_aborted_run_resumes_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let schedule = Schedule::default();
    let tuesday = et(9, 12, 0);

    // First run dies after four units
    let provider = ScriptedProvider::new(slate(), 4);
    let mut ledger = load_ledger(dir.path(), 2).unwrap();
    let report = run_collection(&provider, &schedule, &mut ledger, &slate(), tuesday, 1).await;
    assert_eq!(report.outcomes.len(), 9);
    assert_eq!(report.written(), 4);
    assert_eq!(report.failed().count(), 5);
    save_ledger(&ledger, dir.path()).unwrap();

    // Resume from disk with a fresh quota: only the failed units are planned
    let mut ledger = load_ledger(dir.path(), 2).unwrap();
    assert_eq!(plan_week(&schedule, &slate(), &ledger, tuesday).units.len(), 5);
    let provider = ScriptedProvider::new(slate(), usize::MAX);
    let report = run_collection(&provider, &schedule, &mut ledger, &slate(), tuesday, 3).await;
    assert_eq!(report.written(), 5);
    assert_eq!(filled_slots(&ledger), 9);
    save_ledger(&ledger, dir.path()).unwrap();

    // A third run at the same instant has nothing left
    let ledger = load_ledger(dir.path(), 2).unwrap();
    assert!(plan_week(&schedule, &slate(), &ledger, tuesday).is_empty());
}

#[tokio::test]
async fn test_week_walkthrough_fills_opening_then_final() {
    let schedule = Schedule::default();
    let provider = ScriptedProvider::new(slate(), usize::MAX);
    let mut ledger = WeekLedger::new(2);

    let tuesday = run_collection(&provider, &schedule, &mut ledger, &slate(), et(9, 10, 0), 4).await;
    assert_eq!(tuesday.written(), 9);

    // Thursday evening: the Thursday game's final slot, lines and props
    let thursday = run_collection(&provider, &schedule, &mut ledger, &slate(), et(11, 19, 0), 4).await;
    assert!(thursday
        .outcomes
        .iter()
        .all(|o| o.unit.game.event_id == "thu" && o.unit.slot == Slot::FINAL));
    assert_eq!(thursday.outcomes.len(), 9);
    assert_eq!(thursday.written(), 3 + 2 * 6);

    // Sunday morning before either lead window: nothing due
    let early = run_collection(&provider, &schedule, &mut ledger, &slate(), et(14, 9, 0), 4).await;
    assert!(early.outcomes.is_empty());

    // Sunday 11:00: only the 13:00 game is inside its window
    let sunday = run_collection(&provider, &schedule, &mut ledger, &slate(), et(14, 11, 0), 4).await;
    assert!(sunday.outcomes.iter().all(|o| o.unit.game.event_id == "sun-1"));

    let spread = EntityKey::line(slate()[1].game_id.clone(), LineMarket::Spread);
    assert!(is_already_collected(&ledger, &spread, Slot::OPENING));
    assert!(is_already_collected(&ledger, &spread, Slot::FINAL));
    let record = ledger.records().find(|(key, _)| **key == spread).unwrap().1;
    assert_eq!(record.movement(), Some(0.0));

    // Sunday 14:30: the 13:00 game has kicked off, the 16:25 game is due
    let late = run_collection(&provider, &schedule, &mut ledger, &slate(), et(14, 14, 30), 4).await;
    assert!(late.outcomes.iter().all(|o| o.unit.game.event_id == "sun-2"));
    assert!(late
        .outcomes
        .iter()
        .all(|o| matches!(o.result, UnitResult::Applied { ref rejected, .. } if rejected.is_empty())));
}

#[tokio::test]
async fn test_postponed_game_keeps_its_identity() {
    let schedule = Schedule::default();
    let provider = ScriptedProvider::new(slate(), usize::MAX);
    let mut ledger = WeekLedger::new(2);
    run_collection(&provider, &schedule, &mut ledger, &slate(), et(9, 12, 0), 4).await;

    // Sunday afternoon game pushed to Monday night
    let mut moved = slate();
    moved[2] = Game::new("sun-2", "Kansas City Chiefs", "Philadelphia Eagles", et(15, 20, 15));
    let original_id = slate()[2].game_id.clone();
    assert_ne!(moved[2].game_id, original_id);

    // Sunday evening: the opening slot is already filled for the moved game
    let report = run_collection(&provider, &schedule, &mut ledger, &moved, et(14, 18, 0), 4).await;
    assert_eq!(report.reschedules.len(), 1);
    assert_eq!(report.reschedules[0].game_id, original_id);
    assert_eq!(report.reschedules[0].current, et(15, 20, 15));
    assert!(report.outcomes.is_empty());

    // Until the caller accepts, the recorded kickoff stands and the move keeps being reported
    let again = run_collection(&provider, &schedule, &mut ledger, &moved, et(14, 19, 0), 4).await;
    assert_eq!(ledger.game_by_id(&original_id).unwrap().kickoff, et(14, 16, 25));
    assert_eq!(again.reschedules.len(), 1);
    assert_eq!(again.reschedules[0].recorded, et(14, 16, 25));

    assert!(ledger.accept_kickoff(&original_id, et(15, 20, 15)));
    assert_eq!(ledger.games().count(), 3);

    let monday = run_collection(&provider, &schedule, &mut ledger, &moved, et(15, 18, 0), 4).await;
    assert!(monday.reschedules.is_empty());
    assert_eq!(monday.outcomes.len(), 9);
    assert!(monday
        .outcomes
        .iter()
        .all(|o| o.unit.game.game_id == original_id && o.unit.slot == Slot::FINAL));
}
