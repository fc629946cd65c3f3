use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use nfl_line_tracker::api::odds_api::OddsApiClient;
use nfl_line_tracker::api::OddsProvider;
use nfl_line_tracker::collector::{run_collection, UnitResult};
use nfl_line_tracker::config::Config;
use nfl_line_tracker::data::{export_game_lines_csv, export_props_csv, load_ledger, save_ledger};
use nfl_line_tracker::ledger::WeekLedger;
use nfl_line_tracker::models::Game;
use nfl_line_tracker::snapshot::{next_collection, plan_week, Schedule};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nfl-lines", about = "NFL line snapshot tracker")]
struct Cli {
    /// Evaluate the schedule at this instant (RFC 3339) instead of the current time
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    /// NFL week to work on; defaults to the week containing `now`
    #[arg(long, global = true)]
    week: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the units that are due right now
    Plan {
        /// Plan against games already in the ledger instead of fetching the slate
        #[arg(long)]
        offline: bool,
    },
    /// Fetch every due unit and record it in the week's ledger
    Collect {
        /// Move rescheduled games to their new kickoff
        #[arg(long)]
        accept_reschedules: bool,
    },
    /// Filled records per slot for the week
    Status,
    /// When the next snapshot window opens
    Next {
        #[arg(long)]
        offline: bool,
    },
    /// Write the week's game lines and player props to CSV
    Export {
        #[arg(long, default_value = "data/export")]
        out: PathBuf,
    },
}

struct Session {
    config: Config,
    schedule: Schedule,
    now: DateTime<Utc>,
    week: u32,
}

impl Session {
    fn client(&self) -> Result<OddsApiClient> {
        Ok(OddsApiClient::new(
            self.config.require_api_key()?.to_string(),
            self.config.regions.clone(),
            self.config.bookmaker.clone(),
        )
        .with_rate_limit(self.config.requests_per_minute))
    }

    async fn slate(&self, client: &OddsApiClient) -> Result<Vec<Game>> {
        let (start, end) = self
            .config
            .calendar()
            .week_window(self.week)
            .with_context(|| format!("Week {} has no valid date range", self.week))?;
        client
            .fetch_slate(start, end)
            .await
            .context("Failed to fetch NFL slate")
    }

    async fn slate_or_ledger(&self, offline: bool, ledger: &WeekLedger) -> Result<Vec<Game>> {
        if offline {
            Ok(ledger.games().cloned().collect())
        } else {
            self.slate(&self.client()?).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let schedule = config.schedule()?;
    let now = cli.now.unwrap_or_else(Utc::now);
    let week = cli.week.unwrap_or_else(|| config.calendar().week_of(now));
    let ctx = Session {
        config,
        schedule,
        now,
        week,
    };

    println!("NFL Line Tracker: week {}\n", ctx.week);

    match cli.command {
        Command::Plan { offline } => plan(&ctx, offline).await,
        Command::Collect { accept_reschedules } => collect(&ctx, accept_reschedules).await,
        Command::Status => status(&ctx),
        Command::Next { offline } => next(&ctx, offline).await,
        Command::Export { out } => export(&ctx, &out),
    }
}

async fn plan(ctx: &Session, offline: bool) -> Result<()> {
    let ledger = load_ledger(&ctx.config.data_dir, ctx.week)?;
    let slate = ctx.slate_or_ledger(offline, &ledger).await?;
    let plan = plan_week(&ctx.schedule, &slate, &ledger, ctx.now);

    for notice in &plan.reschedules {
        println!(
            "RESCHEDULED: {} moved from {} to {}",
            notice.game_id, notice.recorded, notice.current
        );
    }
    if plan.is_empty() {
        println!("Nothing to collect right now.");
    } else {
        println!("{} units due:\n", plan.units.len());
        for (i, unit) in plan.units.iter().enumerate() {
            println!("{}. {}", i + 1, unit.format(&ctx.schedule));
        }
    }
    Ok(())
}

async fn collect(ctx: &Session, accept_reschedules: bool) -> Result<()> {
    let client = ctx.client()?;
    let mut ledger = load_ledger(&ctx.config.data_dir, ctx.week)?;
    let slate = ctx.slate(&client).await?;
    println!("Found {} games this week\n", slate.len());

    let report = run_collection(
        &client,
        &ctx.schedule,
        &mut ledger,
        &slate,
        ctx.now,
        ctx.config.max_parallel_fetches,
    )
    .await;

    for notice in &report.reschedules {
        if accept_reschedules && ledger.accept_kickoff(&notice.game_id, notice.current) {
            println!("Moved {} to {}", notice.game_id, notice.current);
        } else {
            println!(
                "RESCHEDULED: {} moved from {} to {} (rerun with --accept-reschedules to keep the new time)",
                notice.game_id, notice.recorded, notice.current
            );
        }
    }

    if report.outcomes.is_empty() {
        println!("Nothing to collect right now.");
    }
    for (i, outcome) in report.outcomes.iter().enumerate() {
        let summary = match &outcome.result {
            UnitResult::Applied { written, rejected } if rejected.is_empty() => {
                format!("{} written", written)
            }
            UnitResult::Applied { written, rejected } => {
                format!("{} written, {} skipped", written, rejected.len())
            }
            UnitResult::Empty => "no odds posted".to_string(),
            UnitResult::FetchFailed(e) => format!("FAILED: {}", e),
        };
        println!("{}. {} -> {}", i + 1, outcome.unit.format(&ctx.schedule), summary);
    }

    let path = save_ledger(&ledger, &ctx.config.data_dir)?;
    println!(
        "\nWrote {} slot values ({} failed units). Saved ledger to {}",
        report.written(),
        report.failed().count(),
        path.display()
    );

    match client.check_usage().await {
        Ok(usage) => println!(
            "\nAPI requests remaining: {}, used: {}",
            usage.remaining.as_deref().unwrap_or("unknown"),
            usage.used.as_deref().unwrap_or("unknown")
        ),
        Err(e) => eprintln!("Could not check API usage: {}", e),
    }
    Ok(())
}

fn status(ctx: &Session) -> Result<()> {
    let ledger = load_ledger(&ctx.config.data_dir, ctx.week)?;
    println!(
        "{} games, {} records\n",
        ledger.games().count(),
        ledger.len()
    );
    for status in ledger.collection_status(&ctx.schedule) {
        println!(
            "{} ({}): {} game lines, {} props",
            status.slot, status.name, status.lines_filled, status.props_filled
        );
    }
    Ok(())
}

async fn next(ctx: &Session, offline: bool) -> Result<()> {
    let ledger = load_ledger(&ctx.config.data_dir, ctx.week)?;
    let slate = ctx.slate_or_ledger(offline, &ledger).await?;
    match next_collection(&ctx.schedule, &slate, ctx.now) {
        Some((at, slot, game_id)) => {
            let local = at.with_timezone(&ctx.schedule.timezone());
            println!(
                "Next: {} ({}) for {} at {}",
                slot,
                ctx.schedule.name(slot),
                game_id,
                local.format("%a %Y-%m-%d %H:%M %Z")
            );
        }
        None => println!("No upcoming snapshot windows this week."),
    }
    Ok(())
}

fn export(ctx: &Session, out: &Path) -> Result<()> {
    let ledger = load_ledger(&ctx.config.data_dir, ctx.week)?;
    std::fs::create_dir_all(out).context("Failed to create export directory")?;

    let lines_path = out.join(format!("week_{:02}_game_lines.csv", ctx.week));
    let games = export_game_lines_csv(&ledger, &ctx.schedule, &lines_path)?;
    println!("Saved {} games to {}", games, lines_path.display());

    let props_path = out.join(format!("week_{:02}_player_props.csv", ctx.week));
    let props = export_props_csv(&ledger, &ctx.schedule, &props_path)?;
    println!("Saved {} props to {}", props, props_path.display());
    Ok(())
}
