use crate::api::OddsProvider;
use crate::models::{EntityKey, Game, LineMarket, Market, PropMarket, Quote, SlotValue};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

const ODDS_API_BASE_URL: &str = "https://api.the-odds-api.com/v4";
const SPORT_KEY: &str = "americanfootball_nfl";
const GAME_LINE_MARKETS: &str = "h2h,spreads,totals";
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 500;

/// Response from The Odds API for a single game
#[derive(Debug, Deserialize)]
struct OddsApiGame {
    id: String,
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
    #[serde(default)]
    bookmakers: Vec<OddsApiBookmaker>,
}

/// Bookmaker data from The Odds API
#[derive(Debug, Deserialize)]
struct OddsApiBookmaker {
    key: String,
    title: String,
    #[serde(default)]
    markets: Vec<OddsApiMarket>,
}

/// Market data (e.g., moneyline, spread) from The Odds API
#[derive(Debug, Deserialize)]
struct OddsApiMarket {
    key: String,
    outcomes: Vec<OddsApiOutcome>,
}

/// One side of a market. For player props `description` carries the player name.
#[derive(Debug, Deserialize)]
struct OddsApiOutcome {
    name: String,
    price: f64,
    #[serde(default)]
    point: Option<f64>,
    #[serde(default)]
    description: Option<String>,
}

impl OddsApiBookmaker {
    fn market(&self, key: &str) -> Option<&OddsApiMarket> {
        self.markets.iter().find(|m| m.key == key && !m.outcomes.is_empty())
    }

    fn is(&self, name: &str) -> bool {
        self.key.eq_ignore_ascii_case(name) || self.title.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApiUsage {
    pub remaining: Option<String>,
    pub used: Option<String>,
}

pub struct OddsApiClient {
    api_key: String,
    regions: String,
    bookmaker: String,
    client: reqwest::Client,
    // One game-lines request per run; every line unit reads from it
    lines: OnceCell<Vec<OddsApiGame>>,
    limiter: DefaultDirectRateLimiter,
}

fn per_minute(requests: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_minute(requests))
}

impl OddsApiClient {
    pub fn new(api_key: String, regions: String, bookmaker: String) -> Self {
        let requests = NonZeroU32::new(DEFAULT_REQUESTS_PER_MINUTE).unwrap_or(NonZeroU32::MIN);
        Self {
            api_key,
            regions,
            bookmaker,
            client: reqwest::Client::new(),
            lines: OnceCell::new(),
            limiter: per_minute(requests),
        }
    }

    /// Cap outgoing odds requests at `requests` per minute
    pub fn with_rate_limit(mut self, requests: NonZeroU32) -> Self {
        self.limiter = per_minute(requests);
        self
    }

    /// Wait for a slot in the per-minute request budget
    async fn throttle(&self) {
        self.limiter.until_ready().await;
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, markets: &str) -> Result<T> {
        self.throttle().await;
        let response = self
            .client
            .get(url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", self.regions.as_str()),
                ("markets", markets),
                ("oddsFormat", "american"),
                ("dateFormat", "iso"),
            ])
            .send()
            .await
            .context("Failed to fetch odds from The Odds API")?;

        if !response.status().is_success() {
            anyhow::bail!("Odds API returned error: {}", response.status());
        }

        if let Some(remaining) = response.headers().get("x-requests-remaining") {
            debug!(remaining = ?remaining, markets, "Odds API request");
        }

        response
            .json()
            .await
            .context("Failed to parse Odds API response")
    }

    /// Upcoming NFL games with spreads, totals and moneylines
    async fn fetch_lines(&self) -> Result<&[OddsApiGame]> {
        let games = self
            .lines
            .get_or_try_init(|| async {
                let url = format!("{}/sports/{}/odds", ODDS_API_BASE_URL, SPORT_KEY);
                let games: Vec<OddsApiGame> = self.get_json(&url, GAME_LINE_MARKETS).await?;
                info!(games = games.len(), "Retrieved NFL game lines");
                Ok::<_, anyhow::Error>(games)
            })
            .await?;
        Ok(games.as_slice())
    }

    async fn fetch_event(&self, event_id: &str, market: PropMarket) -> Result<OddsApiGame> {
        let url = format!(
            "{}/sports/{}/events/{}/odds",
            ODDS_API_BASE_URL, SPORT_KEY, event_id
        );
        self.get_json(&url, market.api_key())
            .await
            .with_context(|| format!("Failed to fetch {} props", market.display_name()))
    }

    /// Check how many API requests you have remaining
    pub async fn check_usage(&self) -> Result<ApiUsage> {
        let url = format!("{}/sports", ODDS_API_BASE_URL);

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .context("Failed to reach The Odds API")?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Ok(ApiUsage {
            remaining: header("x-requests-remaining"),
            used: header("x-requests-used"),
        })
    }
}

#[async_trait]
impl OddsProvider for OddsApiClient {
    async fn fetch_slate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Game>> {
        let games = self.fetch_lines().await?;
        Ok(slate_from(games, start, end))
    }

    async fn fetch_unit(&self, game: &Game, market: Market) -> Result<Vec<Quote>> {
        let collected_at = Utc::now();
        match market {
            Market::Line(line) => {
                let games = self.fetch_lines().await?;
                let Some(api_game) = games.iter().find(|g| g.id == game.event_id) else {
                    warn!(game = %game.game_id, "Game missing from odds response");
                    return Ok(Vec::new());
                };
                Ok(line_quote(game, api_game, line, &self.bookmaker, collected_at)
                    .into_iter()
                    .collect())
            }
            Market::Prop(prop) => {
                let event = self.fetch_event(&game.event_id, prop).await?;
                Ok(prop_quotes(game, &event, prop, collected_at))
            }
        }
    }
}

fn slate_from(games: &[OddsApiGame], start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Game> {
    games
        .iter()
        .filter(|g| g.commence_time >= start && g.commence_time < end)
        .map(|g| Game::new(g.id.clone(), g.home_team.clone(), g.away_team.clone(), g.commence_time))
        .collect()
}

fn american(price: f64) -> i32 {
    price.round() as i32
}

/// Build the quote for a game line, preferring `preferred` and falling back to
/// the first bookmaker that offers the market
fn line_quote(
    game: &Game,
    api_game: &OddsApiGame,
    market: LineMarket,
    preferred: &str,
    collected_at: DateTime<Utc>,
) -> Option<Quote> {
    let offered = |b: &&OddsApiBookmaker| b.market(market.api_key()).is_some();
    let bookmaker = api_game
        .bookmakers
        .iter()
        .filter(offered)
        .find(|b| b.is(preferred))
        .or_else(|| api_game.bookmakers.iter().find(offered))?;
    let outcomes = &bookmaker.market(market.api_key())?.outcomes;

    let side = |name: &str| outcomes.iter().find(|o| o.name == name);
    let (primary, counter) = match market {
        LineMarket::Spread | LineMarket::Moneyline => {
            (side(&api_game.home_team), side(&api_game.away_team))
        }
        LineMarket::Total => (side("Over"), side("Under")),
    };

    let value = SlotValue {
        line: match market {
            LineMarket::Moneyline => None,
            _ => primary.and_then(|o| o.point),
        },
        price: primary.map(|o| american(o.price)),
        counter_price: counter.map(|o| american(o.price)),
        bookmaker: bookmaker.title.clone(),
        collected_at,
    };
    if value.is_placeholder() {
        return None;
    }
    Some(Quote {
        key: EntityKey::line(game.game_id.clone(), market),
        value,
    })
}

/// Group prop outcomes by (player, bookmaker) into one quote each
fn prop_quotes(
    game: &Game,
    event: &OddsApiGame,
    market: PropMarket,
    collected_at: DateTime<Utc>,
) -> Vec<Quote> {
    let mut grouped: BTreeMap<(String, String), SlotValue> = BTreeMap::new();

    for bookmaker in &event.bookmakers {
        let Some(api_market) = bookmaker.market(market.api_key()) else {
            continue;
        };
        for outcome in &api_market.outcomes {
            let Some(player) = outcome
                .description
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
            else {
                continue;
            };
            let value = grouped
                .entry((player.to_string(), bookmaker.title.clone()))
                .or_insert_with(|| SlotValue {
                    line: None,
                    price: None,
                    counter_price: None,
                    bookmaker: bookmaker.title.clone(),
                    collected_at,
                });
            match (market, outcome.name.as_str()) {
                (PropMarket::AnytimeTd, "Yes" | "Over") => value.price = Some(american(outcome.price)),
                (PropMarket::AnytimeTd, "No" | "Under") => {
                    value.counter_price = Some(american(outcome.price))
                }
                (_, "Over") => {
                    value.line = outcome.point;
                    value.price = Some(american(outcome.price));
                }
                (_, "Under") => {
                    value.line = value.line.or(outcome.point);
                    value.counter_price = Some(american(outcome.price));
                }
                _ => {}
            }
        }
    }

    grouped
        .into_iter()
        .filter(|(_, value)| !value.is_placeholder())
        .map(|((player, bookmaker), value)| Quote {
            key: EntityKey::prop(game.game_id.clone(), player, market, bookmaker),
            value,
        })
        .collect()
}
