//! Console rendering of predictions and backtest reports.

use stanza::style::{HAlign, Header, MinWidth, Separator, Styles};
use stanza::table::{Col, Row, Table};

use crate::backtest::{BacktestReport, GamePrediction, SliceMetrics};

fn header_row(labels: &[&str]) -> Row {
    Row::new(
        Styles::default().with(Header(true)),
        labels.iter().map(|&label| label.into()).collect(),
    )
}

fn numeric_cols(count: usize) -> Vec<Col> {
    (0..count)
        .map(|_| Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)))
        .collect()
}

pub fn tabulate_predictions(predictions: &[GamePrediction]) -> Table {
    let mut cols = vec![
        Col::new(Styles::default().with(MinWidth(4))),
        Col::new(Styles::default().with(MinWidth(16))),
        Col::new(Styles::default().with(MinWidth(16))),
    ];
    cols.append(&mut numeric_cols(9));
    let mut table = Table::default().with_cols(cols).with_row(header_row(&[
        "Week",
        "Home",
        "Away",
        "Market",
        "Fair",
        "Edge",
        "Pick",
        "Conf",
        "Stake",
        "P(win)",
        "Fair total",
        "O/U",
    ]));
    for prediction in predictions {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                format!("{}", prediction.week).into(),
                prediction.home_team.clone().into(),
                prediction.away_team.clone().into(),
                format!(
                    "{:.1}",
                    prediction.spread.edge - prediction.spread.fair_spread
                )
                .into(),
                format!("{:.1}", prediction.spread.fair_spread).into(),
                format!("{:+.1}", prediction.spread.edge).into(),
                prediction
                    .spread_pick
                    .map(|side| side.to_string())
                    .unwrap_or_else(|| "-".into())
                    .into(),
                format!("{}", prediction.spread_confidence).into(),
                format!("{:.3}", prediction.spread_stake).into(),
                format!("{:.3}", prediction.p_home_win).into(),
                format!("{:.1}", prediction.fair_total).into(),
                prediction
                    .total_pick
                    .map(|side| side.to_string())
                    .unwrap_or_else(|| "-".into())
                    .into(),
            ],
        ));
    }
    table
}

pub fn tabulate_backtest(report: &BacktestReport) -> Table {
    let mut cols = vec![
        Col::new(Styles::default().with(MinWidth(6))),
        Col::new(Styles::default().with(MinWidth(4))),
    ];
    cols.append(&mut numeric_cols(9));
    let mut table = Table::default().with_cols(cols).with_row(header_row(&[
        "Season",
        "Week",
        "Games",
        "Cov Brier",
        "Cov LL",
        "Cov hit",
        "Win Brier",
        "Win hit",
        "MAE mdl",
        "MAE mkt",
        "O/U hit",
    ]));
    for slice in &report.slices {
        table.push_row(metrics_row(slice, format!("{}", slice.season)));
    }
    if let Some(summary) = report.summary() {
        table.push_row(Row::new(Styles::default().with(Separator(true)), vec![]));
        table.push_row(metrics_row(&summary, "all".into()));
    }
    table
}

fn metrics_row(slice: &SliceMetrics, label: String) -> Row {
    Row::new(
        Styles::default(),
        vec![
            label.into(),
            format!("{}", slice.week).into(),
            format!("{}", slice.games).into(),
            format!("{:.4}", slice.cover_brier).into(),
            format!("{:.4}", slice.cover_log_loss).into(),
            format!("{:.3}", slice.cover_hit_rate).into(),
            format!("{:.4}", slice.win_brier).into(),
            format!("{:.3}", slice.win_hit_rate).into(),
            format!("{:.2}", slice.total_mae_model).into(),
            format!("{:.2}", slice.total_mae_market).into(),
            format!("{:.3}", slice.over_under_hit_rate).into(),
        ],
    )
}
