pub mod pick;

pub use pick::{Pick, PickResult};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a game inside the week ledger, e.g. `NFL_2025_2025-09-14_BALT_KANS`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl GameId {
    /// Derive the id from team names and the kickoff date.
    /// Games kicking off in January or February belong to the previous season.
    pub fn derive(home_team: &str, away_team: &str, kickoff: DateTime<Utc>) -> Self {
        let season = if kickoff.month() <= 2 {
            kickoff.year() - 1
        } else {
            kickoff.year()
        };
        GameId(format!(
            "NFL_{}_{}_{}_{}",
            season,
            kickoff.format("%Y-%m-%d"),
            team_code(away_team),
            team_code(home_team)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First four non-space characters, upper-cased
fn team_code(team: &str) -> String {
    team.chars()
        .filter(|c| !c.is_whitespace())
        .take(4)
        .collect::<String>()
        .to_uppercase()
}

/// Represents an NFL game from the week's slate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Provider event id, used to match the same game across fetches
    pub event_id: String,
    pub game_id: GameId,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
}

impl Game {
    pub fn new(
        event_id: impl Into<String>,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        kickoff: DateTime<Utc>,
    ) -> Self {
        let home_team = home_team.into();
        let away_team = away_team.into();
        Self {
            event_id: event_id.into(),
            game_id: GameId::derive(&home_team, &away_team, kickoff),
            home_team,
            away_team,
            kickoff,
        }
    }

    pub fn matchup(&self) -> String {
        format!("{} @ {}", self.away_team, self.home_team)
    }
}

/// The kind of record a snapshot slot can apply to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFamily {
    GameLines,
    Props,
}

/// Game-level markets, tracked across every slot of the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineMarket {
    Spread,
    Total,
    Moneyline,
}

impl LineMarket {
    pub const ALL: [LineMarket; 3] = [LineMarket::Spread, LineMarket::Total, LineMarket::Moneyline];

    /// Market key used by The Odds API
    pub fn api_key(&self) -> &'static str {
        match self {
            LineMarket::Spread => "spreads",
            LineMarket::Total => "totals",
            LineMarket::Moneyline => "h2h",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LineMarket::Spread => "Spread",
            LineMarket::Total => "Total",
            LineMarket::Moneyline => "Moneyline",
        }
    }
}

/// Player prop markets, collected once on the day of the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropMarket {
    PassingYards,
    PassingTds,
    RushingYards,
    Receptions,
    ReceivingYards,
    AnytimeTd,
}

impl PropMarket {
    pub const ALL: [PropMarket; 6] = [
        PropMarket::PassingYards,
        PropMarket::PassingTds,
        PropMarket::RushingYards,
        PropMarket::Receptions,
        PropMarket::ReceivingYards,
        PropMarket::AnytimeTd,
    ];

    /// Market key used by The Odds API
    pub fn api_key(&self) -> &'static str {
        match self {
            PropMarket::PassingYards => "player_pass_yds",
            PropMarket::PassingTds => "player_pass_tds",
            PropMarket::RushingYards => "player_rush_yds",
            PropMarket::Receptions => "player_receptions",
            PropMarket::ReceivingYards => "player_reception_yds",
            PropMarket::AnytimeTd => "player_anytime_td",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PropMarket::PassingYards => "Passing Yards",
            PropMarket::PassingTds => "Passing TDs",
            PropMarket::RushingYards => "Rushing Yards",
            PropMarket::Receptions => "Receptions",
            PropMarket::ReceivingYards => "Receiving Yards",
            PropMarket::AnytimeTd => "Anytime TD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Line(LineMarket),
    Prop(PropMarket),
}

impl Market {
    pub fn family(&self) -> RecordFamily {
        match self {
            Market::Line(_) => RecordFamily::GameLines,
            Market::Prop(_) => RecordFamily::Props,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Market::Line(m) => m.display_name(),
            Market::Prop(m) => m.display_name(),
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Identity of one trackable line or prop
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityKey {
    Line {
        game_id: GameId,
        market: LineMarket,
    },
    Prop {
        game_id: GameId,
        player: String,
        market: PropMarket,
        bookmaker: String,
    },
}

impl EntityKey {
    pub fn line(game_id: GameId, market: LineMarket) -> Self {
        EntityKey::Line { game_id, market }
    }

    pub fn prop(
        game_id: GameId,
        player: impl Into<String>,
        market: PropMarket,
        bookmaker: impl Into<String>,
    ) -> Self {
        EntityKey::Prop {
            game_id,
            player: player.into(),
            market,
            bookmaker: bookmaker.into(),
        }
    }

    pub fn game_id(&self) -> &GameId {
        match self {
            EntityKey::Line { game_id, .. } | EntityKey::Prop { game_id, .. } => game_id,
        }
    }

    pub fn market(&self) -> Market {
        match self {
            EntityKey::Line { market, .. } => Market::Line(*market),
            EntityKey::Prop { market, .. } => Market::Prop(*market),
        }
    }

    pub fn family(&self) -> RecordFamily {
        self.market().family()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Line { game_id, market } => {
                write!(f, "{} {}", game_id, market.display_name())
            }
            EntityKey::Prop {
                game_id,
                player,
                market,
                bookmaker,
            } => write!(
                f,
                "{} {} {} ({})",
                game_id,
                player,
                market.display_name(),
                bookmaker
            ),
        }
    }
}

/// 1-based position in the snapshot sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(pub u8);

impl Slot {
    pub const OPENING: Slot = Slot(1);
    pub const FINAL: Slot = Slot(2);

    pub fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "snapshot {}", self.0)
    }
}

/// One captured value for a slot.
///
/// Field meaning depends on the market:
/// - spread: home point, home price, away price
/// - total: total points, over price, under price
/// - moneyline: no line, home price, away price
/// - prop: over line, over price, under price
/// - anytime TD: no line, yes price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotValue {
    pub line: Option<f64>,
    pub price: Option<i32>, // American odds format (e.g., -110, +150)
    pub counter_price: Option<i32>,
    pub bookmaker: String,
    pub collected_at: DateTime<Utc>,
}

impl SlotValue {
    /// A value with nothing captured stands for "tried, got nothing" and never counts as collected
    pub fn is_placeholder(&self) -> bool {
        self.line.is_none() && self.price.is_none() && self.counter_price.is_none()
    }
}

/// A fetched value for one entity, ready to be written into its record
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub key: EntityKey,
    pub value: SlotValue,
}
