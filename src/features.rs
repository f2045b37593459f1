//! Rolling per-team performance statistics and per-game feature engineering. Every
//! rolling input is drawn strictly from games earlier in chronological order than the
//! game being featurised, so feature rows are safe to train on without leakage.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::availability::AvailabilityRecord;
use crate::data::{ConsensusLine, GameRecord, SeasonTables, TeamGameStats, UnitStats};
use crate::file;

/// Rolling window sizes, in qualifying games.
pub const WINDOWS: [usize; 3] = [3, 5, 10];

const NEUTRAL_REST_DAYS: i64 = 7;

/// Basic rolling form over the last N qualifying games.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicWindowStats {
    pub win_pct: f64,
    pub points_for_avg: f64,
    pub points_against_avg: f64,
    pub point_diff_avg: f64,
    pub wins: u32,
    pub losses: u32,
}
impl BasicWindowStats {
    /// The fixed fallback when fewer than N qualifying games exist. Deliberately not a
    /// partial-window average: early-season small samples are noisier than a flat prior.
    pub fn neutral() -> Self {
        Self {
            win_pct: 0.5,
            points_for_avg: 0.0,
            points_against_avg: 0.0,
            point_diff_avg: 0.0,
            wins: 0,
            losses: 0,
        }
    }
}

/// Advanced efficiency form over the last N qualifying games, split by unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvancedWindowStats {
    pub offense: UnitStats,
    pub defense: UnitStats,
}
impl AdvancedWindowStats {
    pub fn neutral() -> Self {
        Self {
            offense: UnitStats::neutral(),
            defense: UnitStats::neutral(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestProfile {
    pub rest_days: i64,
    pub short_week: bool,
    pub bye_week: bool,
}
impl RestProfile {
    fn from_rest_days(rest_days: i64) -> Self {
        Self {
            rest_days,
            short_week: rest_days < 7,
            bye_week: rest_days >= 10,
        }
    }

    /// Assumed for a team with no prior game on record.
    pub fn neutral() -> Self {
        Self::from_rest_days(NEUTRAL_REST_DAYS)
    }
}

/// One engineered row per game: identifiers, training targets and the named feature
/// vector. Targets are absent until the game is scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub season: u16,
    pub week: u8,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub home_margin: Option<f64>,
    pub total_points: Option<f64>,
    pub market: ConsensusLine,
    pub features: Vec<(String, f64)>,
}
impl FeatureRow {
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features
            .iter()
            .find(|(feature_name, _)| feature_name == name)
            .map(|(_, value)| *value)
    }
}

#[inline]
fn strictly_earlier(candidate: &GameRecord, season: u16, week: u8) -> bool {
    candidate.season < season || (candidate.season == season && candidate.week < week)
}

/// Basic rolling stats for `team` as of (`season`, `week`). Only scored games qualify;
/// fewer than `window` qualifying games yields [`BasicWindowStats::neutral`].
pub fn rolling_stats(
    games: &[GameRecord],
    team: &str,
    window: usize,
    season: u16,
    week: u8,
) -> BasicWindowStats {
    let mut qualifying: Vec<&GameRecord> = games
        .iter()
        .filter(|game| {
            strictly_earlier(game, season, week) && game.involves(team) && game.is_scored()
        })
        .collect();
    if qualifying.len() < window {
        return BasicWindowStats::neutral();
    }
    qualifying.sort_by_key(|game| (game.season, game.week));
    let recent = &qualifying[qualifying.len() - window..];

    let mut wins = 0u32;
    let mut points_for = 0.0;
    let mut points_against = 0.0;
    for game in recent {
        let (team_points, opponent_points) = if game.home_team == team {
            (game.home_points.unwrap(), game.away_points.unwrap())
        } else {
            (game.away_points.unwrap(), game.home_points.unwrap())
        };
        if team_points > opponent_points {
            wins += 1;
        }
        points_for += team_points as f64;
        points_against += opponent_points as f64;
    }

    let count = recent.len() as f64;
    let points_for_avg = points_for / count;
    let points_against_avg = points_against / count;
    BasicWindowStats {
        win_pct: wins as f64 / count,
        points_for_avg,
        points_against_avg,
        point_diff_avg: points_for_avg - points_against_avg,
        wins,
        losses: recent.len() as u32 - wins,
    }
}

/// Advanced rolling stats for `team` as of week `week` of `season`. The advanced box
/// table is per-season, so the window only ever spans the current season. Fewer than
/// `window` prior rows yields [`AdvancedWindowStats::neutral`].
pub fn rolling_advanced_stats(
    game_stats: &[TeamGameStats],
    team: &str,
    window: usize,
    season: u16,
    week: u8,
) -> AdvancedWindowStats {
    let mut prior: Vec<&TeamGameStats> = game_stats
        .iter()
        .filter(|stats| stats.season == season && stats.week < week && stats.team == team)
        .collect();
    if prior.len() < window {
        return AdvancedWindowStats::neutral();
    }
    prior.sort_by_key(|stats| stats.week);
    let recent = &prior[prior.len() - window..];

    let mut offense = sum_units(recent.iter().map(|stats| &stats.offense));
    let mut defense = sum_units(recent.iter().map(|stats| &stats.defense));
    scale_unit(&mut offense, 1.0 / recent.len() as f64);
    scale_unit(&mut defense, 1.0 / recent.len() as f64);
    AdvancedWindowStats { offense, defense }
}

fn sum_units<'a>(units: impl Iterator<Item = &'a UnitStats>) -> UnitStats {
    let mut sum = UnitStats {
        success_rate: 0.0,
        ppa: 0.0,
        explosiveness: 0.0,
        line_yards: 0.0,
        points_per_opportunity: 0.0,
        havoc: 0.0,
    };
    for unit in units {
        sum.success_rate += unit.success_rate;
        sum.ppa += unit.ppa;
        sum.explosiveness += unit.explosiveness;
        sum.line_yards += unit.line_yards;
        sum.points_per_opportunity += unit.points_per_opportunity;
        sum.havoc += unit.havoc;
    }
    sum
}

fn scale_unit(unit: &mut UnitStats, factor: f64) {
    unit.success_rate *= factor;
    unit.ppa *= factor;
    unit.explosiveness *= factor;
    unit.line_yards *= factor;
    unit.points_per_opportunity *= factor;
    unit.havoc *= factor;
}

/// Days since `team`'s previous game, with short-week (<7) and bye (≥10) flags.
pub fn rest_profile(
    games: &[GameRecord],
    team: &str,
    season: u16,
    week: u8,
    kickoff: DateTime<Utc>,
) -> RestProfile {
    let previous = games
        .iter()
        .filter(|game| strictly_earlier(game, season, week) && game.involves(team))
        .max_by_key(|game| (game.season, game.week));
    match previous {
        None => RestProfile::neutral(),
        Some(previous) => RestProfile::from_rest_days((kickoff - previous.kickoff).num_days()),
    }
}

/// Builds one feature row per game of `tables.season`. `all_games` must contain every
/// loaded season's games (used for cross-season rolling form and rest lookups).
pub fn build_feature_rows(
    all_games: &[GameRecord],
    tables: &SeasonTables,
    availability: &FxHashMap<String, AvailabilityRecord>,
) -> Vec<FeatureRow> {
    let consensus = tables.consensus_lines();
    let mut rows = Vec::with_capacity(tables.games.len());
    for game in &tables.games {
        let market = consensus
            .get(&(
                game.week,
                game.home_team.clone(),
                game.away_team.clone(),
            ))
            .copied()
            .unwrap_or_default();
        rows.push(build_feature_row(all_games, tables, availability, game, market));
    }
    debug!(
        "built {} feature rows for season {}",
        rows.len(),
        tables.season
    );
    rows
}

fn build_feature_row(
    all_games: &[GameRecord],
    tables: &SeasonTables,
    availability: &FxHashMap<String, AvailabilityRecord>,
    game: &GameRecord,
    market: ConsensusLine,
) -> FeatureRow {
    let (season, week) = (game.season, game.week);
    let mut features: Vec<(String, f64)> = Vec::with_capacity(128);

    for (side, team) in [("home", &game.home_team), ("away", &game.away_team)] {
        for window in WINDOWS {
            let basic = rolling_stats(all_games, team, window, season, week);
            let advanced =
                rolling_advanced_stats(&tables.game_stats, team, window, season, week);
            push_window_features(&mut features, side, window, &basic, &advanced);
        }
    }

    // Offense-vs-defense matchup differentials over the short windows.
    for window in [3, 5] {
        let home = rolling_advanced_stats(&tables.game_stats, &game.home_team, window, season, week);
        let away = rolling_advanced_stats(&tables.game_stats, &game.away_team, window, season, week);
        features.push((
            format!("off_def_success_rate_diff_{window}"),
            home.offense.success_rate - away.defense.success_rate,
        ));
        features.push((
            format!("off_def_ppa_diff_{window}"),
            home.offense.ppa - away.defense.ppa,
        ));
        features.push((
            format!("away_off_home_def_success_rate_diff_{window}"),
            away.offense.success_rate - home.defense.success_rate,
        ));
        features.push((
            format!("away_off_home_def_ppa_diff_{window}"),
            away.offense.ppa - home.defense.ppa,
        ));
    }

    let (home_power, home_srs) = tables.rating(&game.home_team);
    let (away_power, away_srs) = tables.rating(&game.away_team);
    features.push(("home_power_rating".into(), home_power.unwrap_or(0.0)));
    features.push(("away_power_rating".into(), away_power.unwrap_or(0.0)));
    features.push(("home_srs".into(), home_srs.unwrap_or(0.0)));
    features.push(("away_srs".into(), away_srs.unwrap_or(0.0)));
    let power_diff = match (home_power, away_power) {
        (Some(home), Some(away)) => home - away,
        _ => 0.0,
    };
    let power_sum = match (home_power, away_power) {
        (Some(home), Some(away)) => home + away,
        _ => 0.0,
    };
    features.push(("power_rating_diff".into(), power_diff));
    features.push(("power_rating_sum".into(), power_sum));
    match (home_srs, away_srs) {
        (Some(home), Some(away)) => {
            features.push(("srs_diff".into(), home - away));
            features.push(("srs_sum".into(), home + away));
        }
        _ => {
            features.push(("srs_diff".into(), 0.0));
            features.push(("srs_sum".into(), 0.0));
        }
    }

    let home_rest = rest_profile(all_games, &game.home_team, season, week, game.kickoff);
    let away_rest = rest_profile(all_games, &game.away_team, season, week, game.kickoff);
    features.push(("home_rest_days".into(), home_rest.rest_days as f64));
    features.push(("away_rest_days".into(), away_rest.rest_days as f64));
    features.push(("home_short_week".into(), flag(home_rest.short_week)));
    features.push(("away_short_week".into(), flag(away_rest.short_week)));
    features.push(("home_bye_week".into(), flag(home_rest.bye_week)));
    features.push(("away_bye_week".into(), flag(away_rest.bye_week)));

    let rest_advantage = (home_rest.rest_days - away_rest.rest_days) as f64;
    features.push(("rest_advantage".into(), rest_advantage));
    features.push((
        "rest_advantage_weighted".into(),
        rest_advantage * power_diff.abs(),
    ));
    features.push((
        "home_field_composite".into(),
        flag(rest_advantage > 0.0) * power_diff,
    ));
    features.push((
        "rest_product".into(),
        (home_rest.rest_days * away_rest.rest_days) as f64,
    ));

    for (side, team) in [("home", &game.home_team), ("away", &game.away_team)] {
        let report = availability.get(team.as_str());
        features.push((
            format!("{side}_qb_out"),
            flag(report.map(|report| report.qb_out).unwrap_or(false)),
        ));
        features.push((
            format!("{side}_starters_out_off"),
            report
                .map(|report| report.starters_out_offense as f64)
                .unwrap_or(0.0),
        ));
        features.push((
            format!("{side}_starters_out_def"),
            report
                .map(|report| report.starters_out_defense as f64)
                .unwrap_or(0.0),
        ));
    }

    // The market spread doubles as a feature so the cover model sees its hurdle.
    features.push((
        "market_spread_home".into(),
        market.spread_home.unwrap_or(0.0),
    ));

    FeatureRow {
        season,
        week,
        home_team: game.home_team.clone(),
        away_team: game.away_team.clone(),
        kickoff: game.kickoff,
        home_margin: game.home_margin(),
        total_points: game.total_points(),
        market,
        features,
    }
}

fn push_window_features(
    features: &mut Vec<(String, f64)>,
    side: &str,
    window: usize,
    basic: &BasicWindowStats,
    advanced: &AdvancedWindowStats,
) {
    features.push((format!("{side}_win_pct_{window}"), basic.win_pct));
    features.push((
        format!("{side}_points_for_avg_{window}"),
        basic.points_for_avg,
    ));
    features.push((
        format!("{side}_points_against_avg_{window}"),
        basic.points_against_avg,
    ));
    features.push((
        format!("{side}_point_diff_avg_{window}"),
        basic.point_diff_avg,
    ));
    for (unit, stats) in [("off", &advanced.offense), ("def", &advanced.defense)] {
        features.push((
            format!("{side}_{unit}_success_rate_{window}"),
            stats.success_rate,
        ));
        features.push((format!("{side}_{unit}_ppa_{window}"), stats.ppa));
        features.push((
            format!("{side}_{unit}_explosiveness_{window}"),
            stats.explosiveness,
        ));
        features.push((format!("{side}_{unit}_line_yards_{window}"), stats.line_yards));
        features.push((
            format!("{side}_{unit}_points_per_opp_{window}"),
            stats.points_per_opportunity,
        ));
        features.push((format!("{side}_{unit}_havoc_{window}"), stats.havoc));
    }
}

#[inline]
fn flag(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

/// Per-season feature persistence. Rows are computed once per season and reused until
/// an explicit refresh; no hidden process-wide cache.
#[derive(Debug)]
pub struct FeatureCache {
    dir: PathBuf,
}
impl FeatureCache {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("features"),
        }
    }

    fn season_path(&self, season: u16) -> PathBuf {
        self.dir.join(format!("{season}.json"))
    }

    /// Returns the cached rows for `season`, building and persisting them via `build`
    /// when absent or when `refresh` is set.
    pub fn load_or_build(
        &self,
        season: u16,
        refresh: bool,
        build: impl FnOnce() -> Vec<FeatureRow>,
    ) -> Result<Vec<FeatureRow>, io::Error> {
        let path = self.season_path(season);
        if !refresh && path.exists() {
            info!("using cached features for {season}");
            return file::read_json(path);
        }
        let rows = build();
        file::write_json(&path, &rows)?;
        info!("cached {} feature rows for {season}", rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests;
