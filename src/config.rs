use crate::api::odds_api::DEFAULT_REQUESTS_PER_MINUTE;
use crate::snapshot::{Schedule, WeekCalendar};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;

/// Runtime settings, read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct Config {
    pub odds_api_key: Option<String>,
    pub regions: String,
    pub bookmaker: String,
    pub data_dir: PathBuf,
    pub timezone: Tz,
    pub opening_hour: u32,
    pub final_lead_minutes: i64,
    pub max_parallel_fetches: usize,
    pub requests_per_minute: NonZeroU32,
    pub season_start: NaiveDate,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset or blank variables take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timezone = match var("TIMEZONE") {
            Some(name) => Tz::from_str(&name)
                .map_err(|e| anyhow::anyhow!("TIMEZONE {:?} is not a valid time zone: {}", name, e))?,
            None => chrono_tz::America::New_York,
        };

        let season_start = match var("NFL_SEASON_START") {
            Some(date) => NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("NFL_SEASON_START {:?} is not a YYYY-MM-DD date", date))?,
            None => NaiveDate::from_ymd_opt(2025, 9, 2).context("Invalid default season start")?,
        };

        let default_rate = NonZeroU32::new(DEFAULT_REQUESTS_PER_MINUTE)
            .context("Invalid default request rate")?;

        Ok(Self {
            odds_api_key: var("ODDS_API_KEY"),
            regions: var("ODDS_API_REGIONS").unwrap_or_else(|| "us".to_string()),
            bookmaker: var("ODDS_BOOKMAKER").unwrap_or_else(|| "DraftKings".to_string()),
            data_dir: PathBuf::from(var("DATA_DIR").unwrap_or_else(|| "data".to_string())),
            timezone,
            opening_hour: parse(var("OPENING_HOUR"), "OPENING_HOUR", 10)?,
            final_lead_minutes: parse(var("FINAL_LEAD_MINUTES"), "FINAL_LEAD_MINUTES", 150)?,
            max_parallel_fetches: parse(var("MAX_PARALLEL_FETCHES"), "MAX_PARALLEL_FETCHES", 4)?,
            requests_per_minute: parse(
                var("ODDS_API_REQUESTS_PER_MINUTE"),
                "ODDS_API_REQUESTS_PER_MINUTE",
                default_rate,
            )?,
            season_start,
        })
    }

    pub fn schedule(&self) -> Result<Schedule> {
        let lead = Duration::try_minutes(self.final_lead_minutes).with_context(|| {
            format!("FINAL_LEAD_MINUTES {} is out of range", self.final_lead_minutes)
        })?;
        Schedule::with_final_lead(self.timezone, self.opening_hour, lead)
            .context("Invalid snapshot schedule configuration")
    }

    pub fn calendar(&self) -> WeekCalendar {
        WeekCalendar::new(self.season_start, self.timezone)
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.odds_api_key
            .as_deref()
            .context("ODDS_API_KEY not set in .env file")
    }
}

fn parse<T>(value: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, v)),
        None => Ok(default),
    }
}
