use crate::api::OddsProvider;
use crate::error::SnapshotError;
use crate::ledger::WeekLedger;
use crate::models::Game;
use crate::snapshot::{plan_week, CollectionUnit, RescheduleDetected, Schedule};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum UnitResult {
    /// Quotes went through the record builder; rejected ones left their record untouched
    Applied {
        written: usize,
        rejected: Vec<SnapshotError>,
    },
    /// The provider had nothing for this unit yet
    Empty,
    FetchFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitOutcome {
    pub unit: CollectionUnit,
    pub result: UnitResult,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub week: u32,
    pub outcomes: Vec<UnitOutcome>,
    pub reschedules: Vec<RescheduleDetected>,
}

impl RunReport {
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match &o.result {
                UnitResult::Applied { written, .. } => *written,
                _ => 0,
            })
            .sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, UnitResult::FetchFailed(_)))
    }

    pub fn rejected(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match &o.result {
                UnitResult::Applied { rejected, .. } => rejected.len(),
                _ => 0,
            })
            .sum()
    }
}

/// Plan the week against `ledger`, fetch every due unit with at most
/// `max_parallel` requests in flight, and apply the results in plan order.
///
/// A failed fetch is recorded in the report and the run moves on.
#[instrument(skip_all, fields(week = ledger.week, games = slate.len()))]
pub async fn run_collection<P>(
    provider: &P,
    schedule: &Schedule,
    ledger: &mut WeekLedger,
    slate: &[Game],
    now: DateTime<Utc>,
    max_parallel: usize,
) -> RunReport
where
    P: OddsProvider + ?Sized,
{
    let plan = plan_week(schedule, slate, &*ledger, now);
    for notice in &plan.reschedules {
        warn!(
            game = %notice.game_id,
            recorded = %notice.recorded,
            current = %notice.current,
            "Kickoff moved after collection started"
        );
    }
    for game in slate {
        ledger.register_game(game);
    }
    info!(units = plan.units.len(), "Planned collection");

    let mut report = RunReport {
        week: ledger.week,
        outcomes: Vec::with_capacity(plan.units.len()),
        reschedules: plan.reschedules,
    };

    let mut fetches = stream::iter(plan.units)
        .map(|unit| async move {
            let fetched = provider.fetch_unit(&unit.game, unit.market).await;
            (unit, fetched)
        })
        .buffered(max_parallel.max(1));

    while let Some((unit, fetched)) = fetches.next().await {
        let result = match fetched {
            Err(e) => {
                warn!(game = %unit.game.game_id, market = %unit.market, error = %e, "Fetch failed");
                UnitResult::FetchFailed(format!("{:#}", e))
            }
            Ok(quotes) if quotes.is_empty() => UnitResult::Empty,
            Ok(quotes) => {
                let mut written = 0;
                let mut rejected = Vec::new();
                for quote in quotes {
                    match ledger.apply(schedule, quote.key, unit.slot, quote.value) {
                        Ok(()) => written += 1,
                        Err(e) => {
                            warn!(error = %e, "Skipped quote");
                            rejected.push(e);
                        }
                    }
                }
                UnitResult::Applied { written, rejected }
            }
        };
        report.outcomes.push(UnitOutcome { unit, result });
    }

    info!(
        written = report.written(),
        failed = report.failed().count(),
        "Collection run finished"
    );
    report
}
