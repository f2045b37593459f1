//! Walk-forward backtesting: trains the model ensemble on each fold's history, prices
//! the fold's games, and scores calibration and accuracy per (season, week) slice.

use thiserror::Error;
use tracing::{debug, info};

use crate::confidence;
use crate::features::FeatureRow;
use crate::market::{
    self, american_to_prob, derive_fair_spread, margin_sigma, FairSpread, OverUnder, Side,
};
use crate::model::{train_season, GradientDescentConfig, ModelError, SeasonModels, TrainingMode};
use crate::split::{validate_no_leakage, walk_forward_splits, LeakageError};
use crate::staking::StakeConfig;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("leakage: {0}")]
    Leakage(#[from] LeakageError),

    #[error("model: {0}")]
    Model(#[from] ModelError),
}

/// A fully priced game: probabilities, fair lines, edges, and the sized picks.
#[derive(Debug, Clone, PartialEq)]
pub struct GamePrediction {
    pub season: u16,
    pub week: u8,
    pub home_team: String,
    pub away_team: String,
    pub p_home_covers: f64,
    pub p_home_win: f64,
    pub fair_total: f64,
    pub spread: FairSpread,
    pub spread_pick: Option<Side>,
    pub spread_stake: f64,
    pub spread_confidence: u8,
    pub total_edge: Option<f64>,
    pub total_pick: Option<OverUnder>,
    pub total_stake: f64,
    pub total_confidence: u8,
    pub moneyline_edge: Option<f64>,
    pub moneyline_stake: f64,
    pub moneyline_confidence: u8,
}

/// Prices one game with the given season's models. Missing market components degrade
/// to model-only signal; nothing here fails.
pub fn predict_game(
    models: &SeasonModels,
    stakes: &StakeConfig,
    row: &FeatureRow,
) -> GamePrediction {
    let p_home_win = models.win.predict_prob(row);
    let p_home_covers = models.cover.predict_prob(row);
    let fair_total = models.total.predict(row);

    let rating_gap = row.feature("power_rating_diff").unwrap_or(0.0);
    let sigma = margin_sigma(rating_gap);
    // A fallback-trained cover model emits win probabilities; route pricing through
    // the win-projection path rather than pretend it read the spread.
    let cover_prob = match models.cover_mode {
        TrainingMode::Standard => Some(p_home_covers),
        TrainingMode::WinFallback => None,
    };
    let spread = derive_fair_spread(cover_prob, p_home_win, row.market.spread_home, sigma);
    let spread_pick = spread.pick();
    // No pick, no bet: a sub-epsilon edge must not carry a residual stake.
    let spread_stake = match spread_pick {
        Some(_) => stakes.spread_total_stake(spread.edge.abs()),
        None => 0.0,
    };
    let spread_confidence = confidence::spread_confidence(spread.edge, row.market.spread_home);

    let total_edge = row.market.total.map(|market_total| fair_total - market_total);
    let total_pick = total_edge.and_then(market::total_pick);
    let total_stake = match (total_pick, total_edge) {
        (Some(_), Some(edge)) => stakes.spread_total_stake(edge.abs()),
        _ => 0.0,
    };
    let total_confidence = total_edge.map(confidence::total_confidence).unwrap_or(0);

    let moneyline_edge = row
        .market
        .moneyline_home
        .and_then(american_to_prob)
        .map(|implied| p_home_win - implied);
    let moneyline_stake = row
        .market
        .moneyline_home
        .map(|odds| stakes.moneyline_stake(p_home_win, odds))
        .unwrap_or(0.0);
    let moneyline_confidence = moneyline_edge
        .map(confidence::moneyline_confidence)
        .unwrap_or(0);

    GamePrediction {
        season: row.season,
        week: row.week,
        home_team: row.home_team.clone(),
        away_team: row.away_team.clone(),
        p_home_covers,
        p_home_win,
        fair_total,
        spread,
        spread_pick,
        spread_stake,
        spread_confidence,
        total_edge,
        total_pick,
        total_stake,
        total_confidence,
        moneyline_edge,
        moneyline_stake,
        moneyline_confidence,
    }
}

/// Scores for one (season, week) test slice.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceMetrics {
    pub season: u16,
    pub week: u8,
    pub games: usize,
    pub cover_brier: f64,
    pub cover_log_loss: f64,
    pub cover_hit_rate: f64,
    pub win_brier: f64,
    pub win_log_loss: f64,
    pub win_hit_rate: f64,
    pub total_mae_model: f64,
    pub total_mae_market: f64,
    pub over_under_hit_rate: f64,
}

#[derive(Debug, Default)]
pub struct BacktestReport {
    pub slices: Vec<SliceMetrics>,
}
impl BacktestReport {
    /// Game-weighted means across all slices.
    pub fn summary(&self) -> Option<SliceMetrics> {
        let games: usize = self.slices.iter().map(|slice| slice.games).sum();
        if games == 0 {
            return None;
        }
        let weighted = |extract: fn(&SliceMetrics) -> f64| {
            self.slices
                .iter()
                .map(|slice| extract(slice) * slice.games as f64)
                .sum::<f64>()
                / games as f64
        };
        let (first, last) = (&self.slices[0], &self.slices[self.slices.len() - 1]);
        Some(SliceMetrics {
            season: first.season,
            week: last.week,
            games,
            cover_brier: weighted(|slice| slice.cover_brier),
            cover_log_loss: weighted(|slice| slice.cover_log_loss),
            cover_hit_rate: weighted(|slice| slice.cover_hit_rate),
            win_brier: weighted(|slice| slice.win_brier),
            win_log_loss: weighted(|slice| slice.win_log_loss),
            win_hit_rate: weighted(|slice| slice.win_hit_rate),
            total_mae_model: weighted(|slice| slice.total_mae_model),
            total_mae_market: weighted(|slice| slice.total_mae_market),
            over_under_hit_rate: weighted(|slice| slice.over_under_hit_rate),
        })
    }
}

/// Runs the full walk-forward backtest: one model ensemble trained per fold, strictly
/// on that fold's history, then scored on the fold's week.
pub fn run(
    rows: &[FeatureRow],
    descent: &GradientDescentConfig,
) -> Result<BacktestReport, BacktestError> {
    let splits = walk_forward_splits(rows);
    info!("backtesting over {} folds", splits.len());
    let mut report = BacktestReport::default();
    for split in &splits {
        validate_no_leakage(rows, split)?;
        let train_rows: Vec<FeatureRow> = split
            .train
            .iter()
            .map(|&index| rows[index].clone())
            .collect();
        let test_rows: Vec<&FeatureRow> = split
            .test
            .iter()
            .map(|&index| &rows[index])
            .filter(|row| row.home_margin.is_some())
            .collect();
        if test_rows.is_empty() {
            debug!("fold ({}, {}): no scored test games", split.season, split.week);
            continue;
        }
        let models = train_season(&train_rows, split.season, descent)?;
        report
            .slices
            .push(score_slice(&models, &test_rows, split.season, split.week));
    }
    Ok(report)
}

fn score_slice(
    models: &SeasonModels,
    test_rows: &[&FeatureRow],
    season: u16,
    week: u8,
) -> SliceMetrics {
    let stakes = StakeConfig::default();
    let mut cover_probs = vec![];
    let mut cover_outcomes = vec![];
    let mut win_probs = vec![];
    let mut win_outcomes = vec![];
    let mut total_errors_model = vec![];
    let mut total_errors_market = vec![];
    let mut over_under_hits = vec![];

    for row in test_rows {
        let prediction = predict_game(models, &stakes, row);
        let margin = row.home_margin.unwrap();

        if margin != 0.0 {
            win_probs.push(prediction.p_home_win);
            win_outcomes.push(if margin > 0.0 { 1.0 } else { 0.0 });
        }

        if models.cover_mode == TrainingMode::Standard {
            if let Some(spread) = row.market.spread_home {
                let cover_margin = margin - spread;
                // Pushes carry no signal either way.
                if spread != 0.0 && cover_margin != 0.0 {
                    cover_probs.push(prediction.p_home_covers);
                    cover_outcomes.push(if cover_margin > 0.0 { 1.0 } else { 0.0 });
                }
            }
        }

        if let Some(total) = row.total_points {
            total_errors_model.push((prediction.fair_total - total).abs());
            if let Some(market_total) = row.market.total {
                total_errors_market.push((market_total - total).abs());
                if let Some(pick) = prediction.total_pick {
                    // Landing exactly on the number is a push.
                    if total != market_total {
                        let hit = match pick {
                            OverUnder::Over => total > market_total,
                            OverUnder::Under => total < market_total,
                        };
                        over_under_hits.push(if hit { 1.0 } else { 0.0 });
                    }
                }
            }
        }
    }

    let (cover_brier, cover_log_loss, cover_hit_rate) =
        classification_metrics(&cover_probs, &cover_outcomes);
    let (win_brier, win_log_loss, win_hit_rate) =
        classification_metrics(&win_probs, &win_outcomes);
    SliceMetrics {
        season,
        week,
        games: test_rows.len(),
        cover_brier,
        cover_log_loss,
        cover_hit_rate,
        win_brier,
        win_log_loss,
        win_hit_rate,
        total_mae_model: mean(&total_errors_model),
        total_mae_market: mean(&total_errors_market),
        over_under_hit_rate: mean(&over_under_hits),
    }
}

/// Brier score, log loss and hit rate. Log loss over a single-class slice is
/// reported as the 0.0 sentinel, matching its undefined normalisation.
fn classification_metrics(probs: &[f64], outcomes: &[f64]) -> (f64, f64, f64) {
    if probs.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let count = probs.len() as f64;
    let brier = probs
        .iter()
        .zip(outcomes.iter())
        .map(|(p, outcome)| (p - outcome).powi(2))
        .sum::<f64>()
        / count;
    let positives = outcomes.iter().sum::<f64>();
    let log_loss = if positives == 0.0 || positives == count {
        0.0
    } else {
        -probs
            .iter()
            .zip(outcomes.iter())
            .map(|(p, outcome)| {
                let clamped = p.clamp(1e-12, 1.0 - 1e-12);
                outcome * clamped.ln() + (1.0 - outcome) * (1.0 - clamped).ln()
            })
            .sum::<f64>()
            / count
    };
    let hits = probs
        .iter()
        .zip(outcomes.iter())
        .filter(|(p, outcome)| (**p > 0.5) == (**outcome == 1.0))
        .count() as f64;
    (brier, log_loss, hits / count)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests;
