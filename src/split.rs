//! Walk-forward splitting of feature rows by (season, week). Each split trains on
//! strictly earlier scored rows and tests on exactly one week, so no model ever sees
//! a game from its own week or later.

use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::debug;

use crate::features::FeatureRow;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeakageError {
    #[error("train row ({train_season}, {train_week}) is not strictly before test week ({test_season}, {test_week})")]
    TrainRowNotEarlier {
        train_season: u16,
        train_week: u8,
        test_season: u16,
        test_week: u8,
    },

    #[error("test row ({row_season}, {row_week}) does not belong to test week ({test_season}, {test_week})")]
    TestRowMisplaced {
        row_season: u16,
        row_week: u8,
        test_season: u16,
        test_week: u8,
    },

    #[error("row {index} appears on both sides of the split")]
    RowOnBothSides { index: usize },
}

/// One evaluation fold: indices into the row slice it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub season: u16,
    pub week: u8,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Enumerates every distinct (season, week) in ascending order and emits one split per
/// week. Train rows must be scored (their targets exist); folds with an empty train or
/// test side are skipped.
pub fn walk_forward_splits(rows: &[FeatureRow]) -> Vec<Split> {
    let mut weeks: Vec<(u16, u8)> = rows.iter().map(|row| (row.season, row.week)).collect();
    weeks.sort_unstable();
    weeks.dedup();

    let mut splits = Vec::with_capacity(weeks.len());
    for (season, week) in weeks {
        let train: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                (row.season < season || (row.season == season && row.week < week))
                    && row.home_margin.is_some()
            })
            .map(|(index, _)| index)
            .collect();
        let test: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.season == season && row.week == week)
            .map(|(index, _)| index)
            .collect();
        if train.is_empty() || test.is_empty() {
            debug!("skipping fold ({season}, {week}): train={}, test={}", train.len(), test.len());
            continue;
        }
        splits.push(Split {
            season,
            week,
            train,
            test,
        });
    }
    splits
}

/// Re-checks a split against the rows it indexes. Belt and braces around
/// [`walk_forward_splits`]; also guards hand-built splits.
pub fn validate_no_leakage(rows: &[FeatureRow], split: &Split) -> Result<(), LeakageError> {
    let train_set: FxHashSet<usize> = split.train.iter().copied().collect();
    for &index in &split.test {
        if train_set.contains(&index) {
            return Err(LeakageError::RowOnBothSides { index });
        }
        let row = &rows[index];
        if row.season != split.season || row.week != split.week {
            return Err(LeakageError::TestRowMisplaced {
                row_season: row.season,
                row_week: row.week,
                test_season: split.season,
                test_week: split.week,
            });
        }
    }
    for &index in &split.train {
        let row = &rows[index];
        let earlier = row.season < split.season
            || (row.season == split.season && row.week < split.week);
        if !earlier {
            return Err(LeakageError::TrainRowNotEarlier {
                train_season: row.season,
                train_week: row.week,
                test_season: split.season,
                test_week: split.week,
            });
        }
    }
    Ok(())
}
