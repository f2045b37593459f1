//! Historical input tables. Ingestion lives outside this crate; these types mirror the
//! JSON artifacts the ingester writes per season under the data directory:
//! `games/{season}.json`, `stats/{season}.json`, `ratings_power/{season}.json`,
//! `ratings_srs/{season}.json` and `lines/{season}.json`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::file;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("missing table {path} for season {season}")]
    MissingTable { season: u16, path: PathBuf },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// A single game, immutable once scored. `home_points`/`away_points` are absent until
/// a final score arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub season: u16,
    pub week: u8,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub home_points: Option<i32>,
    pub away_points: Option<i32>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub neutral_site: bool,
}
impl GameRecord {
    pub fn is_scored(&self) -> bool {
        self.home_points.is_some() && self.away_points.is_some()
    }

    /// Home margin of victory; `None` until scored.
    pub fn home_margin(&self) -> Option<f64> {
        match (self.home_points, self.away_points) {
            (Some(home), Some(away)) => Some((home - away) as f64),
            _ => None,
        }
    }

    pub fn total_points(&self) -> Option<f64> {
        match (self.home_points, self.away_points) {
            (Some(home), Some(away)) => Some((home + away) as f64),
            _ => None,
        }
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }
}

/// Per-unit efficiency numbers from the advanced box score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub success_rate: f64,
    pub ppa: f64,
    pub explosiveness: f64,
    pub line_yards: f64,
    pub points_per_opportunity: f64,
    pub havoc: f64,
}
impl UnitStats {
    /// The neutral baseline used when a team lacks sufficient history.
    pub fn neutral() -> Self {
        Self {
            success_rate: 0.5,
            ppa: 0.0,
            explosiveness: 1.0,
            line_yards: 3.0,
            points_per_opportunity: 3.0,
            havoc: 0.0,
        }
    }
}

/// One team's advanced stats for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamGameStats {
    pub season: u16,
    pub week: u8,
    pub team: String,
    pub offense: UnitStats,
    pub defense: UnitStats,
}

/// An opaque composite team-strength score from an external rating system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRating {
    pub team: String,
    pub rating: f64,
}

/// A bookmaker's line for one game. Spread is from the home perspective: negative
/// means home favoured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketLine {
    pub season: u16,
    pub week: u8,
    pub home_team: String,
    pub away_team: String,
    pub provider: String,
    pub spread_home: Option<f64>,
    pub total: Option<f64>,
    pub moneyline_home: Option<f64>,
}

/// Per-game consensus across providers (median of each quoted component).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsensusLine {
    pub spread_home: Option<f64>,
    pub total: Option<f64>,
    pub moneyline_home: Option<f64>,
}

/// All raw tables for one season, loaded read-only.
#[derive(Debug, Default)]
pub struct SeasonTables {
    pub season: u16,
    pub games: Vec<GameRecord>,
    pub game_stats: Vec<TeamGameStats>,
    pub power_ratings: Vec<TeamRating>,
    pub srs_ratings: Vec<TeamRating>,
    pub lines: Vec<MarketLine>,
}
impl SeasonTables {
    /// Loads a season from `data_dir`. The games table is mandatory; the auxiliary
    /// tables degrade to empty when their files are absent.
    pub fn load(data_dir: impl AsRef<Path>, season: u16) -> Result<Self, DataError> {
        let data_dir = data_dir.as_ref();
        let games_path = data_dir.join("games").join(format!("{season}.json"));
        if !games_path.exists() {
            return Err(DataError::MissingTable {
                season,
                path: games_path,
            });
        }
        let games: Vec<GameRecord> = file::read_json(&games_path)?;
        let game_stats = read_optional(data_dir.join("stats").join(format!("{season}.json")))?;
        let power_ratings =
            read_optional(data_dir.join("ratings_power").join(format!("{season}.json")))?;
        let srs_ratings =
            read_optional(data_dir.join("ratings_srs").join(format!("{season}.json")))?;
        let lines = read_optional(data_dir.join("lines").join(format!("{season}.json")))?;
        debug!(
            "loaded season {season}: {} games, {} stat rows, {} lines",
            games.len(),
            game_stats.len(),
            lines.len()
        );
        Ok(Self {
            season,
            games,
            game_stats,
            power_ratings,
            srs_ratings,
            lines,
        })
    }

    pub fn rating(&self, team: &str) -> (Option<f64>, Option<f64>) {
        let power = self
            .power_ratings
            .iter()
            .find(|rating| rating.team == team)
            .map(|rating| rating.rating);
        let srs = self
            .srs_ratings
            .iter()
            .find(|rating| rating.team == team)
            .map(|rating| rating.rating);
        (power, srs)
    }

    /// Collapses provider quotes into one consensus line per (week, home, away).
    pub fn consensus_lines(&self) -> FxHashMap<(u8, String, String), ConsensusLine> {
        let mut grouped: FxHashMap<(u8, String, String), Vec<&MarketLine>> = FxHashMap::default();
        for line in &self.lines {
            grouped
                .entry((line.week, line.home_team.clone(), line.away_team.clone()))
                .or_default()
                .push(line);
        }
        grouped
            .into_iter()
            .map(|(key, quotes)| {
                let spreads: Vec<_> = quotes.iter().filter_map(|quote| quote.spread_home).collect();
                let totals: Vec<_> = quotes.iter().filter_map(|quote| quote.total).collect();
                let moneylines: Vec<_> = quotes
                    .iter()
                    .filter_map(|quote| quote.moneyline_home)
                    .collect();
                (
                    key,
                    ConsensusLine {
                        spread_home: median(spreads),
                        total: median(totals),
                        moneyline_home: median(moneylines),
                    },
                )
            })
            .collect()
    }
}

fn read_optional<D: serde::de::DeserializeOwned>(path: PathBuf) -> Result<Vec<D>, DataError> {
    if path.exists() {
        Ok(file::read_json(path)?)
    } else {
        Ok(vec![])
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
