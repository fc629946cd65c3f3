pub mod odds_api;

use crate::models::{Game, Market, Quote};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of the week's slate and of per-unit odds
#[async_trait]
pub trait OddsProvider: Send + Sync {
    /// Games kicking off in `[start, end)`
    async fn fetch_slate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Game>>;

    /// Current quotes for one game and market. A line market yields at most
    /// one quote; a prop market yields one per (player, bookmaker).
    async fn fetch_unit(&self, game: &Game, market: Market) -> Result<Vec<Quote>>;
}
