use assert_float_eq::*;
use chrono::{TimeZone, Utc};

use crate::data::ConsensusLine;
use crate::market::PricingBasis;

use super::*;

fn row(
    season: u16,
    week: u8,
    x: f64,
    home_margin: Option<f64>,
    total_points: Option<f64>,
    market: ConsensusLine,
) -> FeatureRow {
    FeatureRow {
        season,
        week,
        home_team: format!("H{x}"),
        away_team: "Visitors".into(),
        kickoff: Utc.with_ymd_and_hms(season as i32, 9, 1, 0, 0, 0).unwrap(),
        home_margin,
        total_points,
        market,
        features: vec![
            ("x".into(), x),
            ("power_rating_diff".into(), x * x),
        ],
    }
}

fn quoted(spread: f64, total: f64) -> ConsensusLine {
    ConsensusLine {
        spread_home: Some(spread),
        total: Some(total),
        moneyline_home: Some(-110.0),
    }
}

fn season_rows() -> Vec<FeatureRow> {
    let mut rows = vec![];
    for week in 1..=6u8 {
        for game in 0..6 {
            let x = game as f64 - 2.5 + (week % 2) as f64 * 0.25;
            let margin = 3.0 * x + if game % 2 == 0 { 1.5 } else { -1.5 };
            let total = 45.0 + x;
            rows.push(row(
                2022,
                week,
                x,
                Some(margin),
                Some(total),
                quoted(-1.5, 44.0),
            ));
        }
    }
    rows
}

#[test]
fn metrics_known_values() {
    let (brier, log_loss, hit_rate) =
        classification_metrics(&[0.8, 0.3], &[1.0, 0.0]);
    assert_float_absolute_eq!((0.04 + 0.09) / 2.0, brier, 1e-12);
    assert_float_absolute_eq!(-(0.8f64.ln() + 0.7f64.ln()) / 2.0, log_loss, 1e-12);
    assert_float_absolute_eq!(1.0, hit_rate, 1e-12);
}

#[test]
fn single_class_slice_reports_sentinel_log_loss() {
    let (brier, log_loss, hit_rate) =
        classification_metrics(&[0.9, 0.6, 0.7], &[1.0, 1.0, 1.0]);
    assert!(brier > 0.0);
    assert_float_absolute_eq!(0.0, log_loss, 1e-12);
    assert_float_absolute_eq!(1.0, hit_rate, 1e-12);
}

#[test]
fn empty_slice_reports_zeros() {
    assert_eq!((0.0, 0.0, 0.0), classification_metrics(&[], &[]));
    assert_eq!(0.0, mean(&[]));
}

#[test]
fn walk_forward_backtest_scores_each_week() {
    let rows = season_rows();
    let report = run(&rows, &GradientDescentConfig::default()).unwrap();
    // Week 1 has no history to train on; weeks 2 through 6 are scored.
    assert_eq!(5, report.slices.len());
    for slice in &report.slices {
        assert_eq!(2022, slice.season);
        assert_eq!(6, slice.games);
        assert!(slice.cover_brier.is_finite());
        assert!(slice.win_brier.is_finite());
        assert!((0.0..=1.0).contains(&slice.win_hit_rate));
        assert!(slice.total_mae_model.is_finite());
        assert!(slice.total_mae_market > 0.0);
    }

    let summary = report.summary().unwrap();
    assert_eq!(30, summary.games);
    assert!((0.0..=1.0).contains(&summary.cover_hit_rate));
}

#[test]
fn summary_of_empty_report_is_none() {
    assert!(BacktestReport::default().summary().is_none());
}

#[test]
fn prediction_prices_all_markets() {
    let rows = season_rows();
    let models =
        train_season(&rows, 2022, &GradientDescentConfig::default()).unwrap();
    let upcoming = row(2022, 7, 2.0, None, None, quoted(-3.0, 46.0));
    let prediction = predict_game(&models, &StakeConfig::default(), &upcoming);

    assert_eq!(PricingBasis::MarketAnchored, prediction.spread.basis);
    assert!((0.0..=1.0).contains(&prediction.p_home_win));
    assert!(prediction.fair_total.is_finite());
    assert!(prediction.total_edge.is_some());
    assert!(prediction.moneyline_edge.is_some());
    assert!(prediction.spread_stake >= 0.0);
}

#[test]
fn prediction_degrades_without_market_data() {
    let rows = season_rows();
    let models =
        train_season(&rows, 2022, &GradientDescentConfig::default()).unwrap();
    let unquoted = row(2022, 7, 2.0, None, None, ConsensusLine::default());
    let prediction = predict_game(&models, &StakeConfig::default(), &unquoted);

    // Model-only signal: win projection for the spread, nothing for total/moneyline.
    assert_eq!(PricingBasis::WinProjection, prediction.spread.basis);
    assert_eq!(None, prediction.total_edge);
    assert_eq!(None, prediction.total_pick);
    assert_eq!(0, prediction.total_confidence);
    assert_eq!(None, prediction.moneyline_edge);
    assert_eq!(0.0, prediction.moneyline_stake);
    assert_eq!(0, prediction.moneyline_confidence);
}

#[test]
fn hairline_edges_stake_nothing() {
    let rows = season_rows();
    let models =
        train_season(&rows, 2022, &GradientDescentConfig::default()).unwrap();
    // Training totals are exactly 45 + x, so the regressor prices this game at 47
    // to within solver precision; quoting the market right there leaves an edge
    // far below the opinion threshold.
    let market = ConsensusLine {
        spread_home: Some(-3.0),
        total: Some(47.0),
        moneyline_home: None,
    };
    let upcoming = row(2022, 7, 2.0, None, None, market);
    let prediction = predict_game(&models, &StakeConfig::default(), &upcoming);

    assert!(prediction.total_edge.unwrap().abs() < crate::market::EDGE_EPSILON);
    assert_eq!(None, prediction.total_pick);
    assert_eq!(0.0, prediction.total_stake);
    assert_eq!(0, prediction.total_confidence);
    // The spread side abstains the same way.
    if prediction.spread_pick.is_none() {
        assert_eq!(0.0, prediction.spread_stake);
    }
}

#[test]
fn fallback_models_price_through_win_projection() {
    // Strip every quoted spread so cover training degrades.
    let rows: Vec<FeatureRow> = season_rows()
        .into_iter()
        .map(|mut row| {
            row.market = ConsensusLine::default();
            row
        })
        .collect();
    let models =
        train_season(&rows, 2022, &GradientDescentConfig::default()).unwrap();
    assert_eq!(TrainingMode::WinFallback, models.cover_mode);

    // Even with a quoted spread at serving time, pricing must not read the degraded
    // cover output as a cover probability.
    let upcoming = row(2022, 7, 2.0, None, None, quoted(-3.0, 46.0));
    let prediction = predict_game(&models, &StakeConfig::default(), &upcoming);
    assert_eq!(PricingBasis::WinProjection, prediction.spread.basis);
}
