use crate::ledger::WeekLedger;
use crate::models::{EntityKey, LineMarket, RecordFamily, Slot, SlotValue};
use crate::snapshot::{CollectedState, Record, Schedule};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// `data/week_02.json`
pub fn ledger_path(data_dir: &Path, week: u32) -> PathBuf {
    data_dir.join(format!("week_{:02}.json", week))
}

/// Load a week's ledger, or start an empty one if none was saved yet
pub fn load_ledger(data_dir: &Path, week: u32) -> Result<WeekLedger> {
    let path = ledger_path(data_dir, week);
    if !path.exists() {
        info!(path = %path.display(), "No ledger yet, starting empty");
        return Ok(WeekLedger::new(week));
    }
    let json = std::fs::read_to_string(&path).context("Failed to read ledger file")?;
    let ledger: WeekLedger =
        serde_json::from_str(&json).context("Failed to deserialize ledger data")?;
    if ledger.week != week {
        anyhow::bail!(
            "Ledger {} holds week {}, expected week {}",
            path.display(),
            ledger.week,
            week
        );
    }
    Ok(ledger)
}

/// Save the ledger; the file is replaced in one rename so a crash never leaves half a file
pub fn save_ledger(ledger: &WeekLedger, data_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
    let path = ledger_path(data_dir, ledger.week);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(ledger).context("Failed to serialize ledger data")?;
    std::fs::write(&tmp, json).context("Failed to write ledger file")?;
    std::fs::rename(&tmp, &path).context("Failed to replace ledger file")?;
    Ok(path)
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn collected(value: Option<&SlotValue>) -> String {
    value
        .map(|v| v.collected_at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Save game lines to CSV: one row per game, one column group per slot
pub fn export_game_lines_csv(ledger: &WeekLedger, schedule: &Schedule, filename: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(filename).context("Failed to create CSV file")?;
    let slots = schedule.slots_for(RecordFamily::GameLines);

    let mut header = vec![
        "Game_ID".to_string(),
        "Date".to_string(),
        "Home_Team".to_string(),
        "Away_Team".to_string(),
    ];
    for slot in &slots {
        let n = slot.index();
        header.extend([
            format!("Spread_Line_{}", n),
            format!("Spread_Odds_Home_{}", n),
            format!("Spread_Odds_Away_{}", n),
            format!("Total_Line_{}", n),
            format!("Total_Over_Odds_{}", n),
            format!("Total_Under_Odds_{}", n),
            format!("ML_Home_{}", n),
            format!("ML_Away_{}", n),
            format!("Bookmaker_{}", n),
            format!("Collected_Date_{}", n),
        ]);
    }
    writer.write_record(&header)?;

    let mut games: Vec<_> = ledger.games().collect();
    games.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then_with(|| a.game_id.cmp(&b.game_id)));

    let empty = Record::new();
    for game in &games {
        let record = |market| ledger.record(&EntityKey::line(game.game_id.clone(), market));
        let (spread, total, moneyline) = (
            record(LineMarket::Spread).unwrap_or(&empty),
            record(LineMarket::Total).unwrap_or(&empty),
            record(LineMarket::Moneyline).unwrap_or(&empty),
        );

        let mut row = vec![
            game.game_id.to_string(),
            game.kickoff.format("%Y-%m-%d").to_string(),
            game.home_team.clone(),
            game.away_team.clone(),
        ];
        for slot in &slots {
            row.extend(slot_columns(*slot, spread, total, moneyline));
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(games.len())
}

fn slot_columns(slot: Slot, spread: &Record, total: &Record, moneyline: &Record) -> Vec<String> {
    let (s, t, m) = (spread.value(slot), total.value(slot), moneyline.value(slot));
    let first = [s, t, m].into_iter().flatten().min_by_key(|v| v.collected_at);
    vec![
        cell(s.and_then(|v| v.line)),
        cell(s.and_then(|v| v.price)),
        cell(s.and_then(|v| v.counter_price)),
        cell(t.and_then(|v| v.line)),
        cell(t.and_then(|v| v.price)),
        cell(t.and_then(|v| v.counter_price)),
        cell(m.and_then(|v| v.price)),
        cell(m.and_then(|v| v.counter_price)),
        first.map(|v| v.bookmaker.clone()).unwrap_or_default(),
        collected(first),
    ]
}

/// Save player props to CSV: one row per (game, player, market, bookmaker)
pub fn export_props_csv(ledger: &WeekLedger, schedule: &Schedule, filename: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(filename).context("Failed to create CSV file")?;
    let slots = schedule.slots_for(RecordFamily::Props);

    let mut header = vec![
        "Game_ID".to_string(),
        "Player_Name".to_string(),
        "Market_Type".to_string(),
        "Bookmaker".to_string(),
    ];
    for slot in &slots {
        let n = slot.index();
        header.extend([
            format!("Over_Line_{}", n),
            format!("Over_Odds_{}", n),
            format!("Under_Odds_{}", n),
            format!("Collected_Date_{}", n),
        ]);
    }
    writer.write_record(&header)?;

    let mut rows = 0;
    for (key, record) in ledger.records() {
        let EntityKey::Prop {
            game_id,
            player,
            market,
            bookmaker,
        } = key
        else {
            continue;
        };
        let mut row = vec![
            game_id.to_string(),
            player.clone(),
            market.display_name().to_string(),
            bookmaker.clone(),
        ];
        for slot in &slots {
            let value = record.value(*slot);
            row.extend([
                cell(value.and_then(|v| v.line)),
                cell(value.and_then(|v| v.price)),
                cell(value.and_then(|v| v.counter_price)),
                collected(value),
            ]);
        }
        writer.write_record(&row)?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}
