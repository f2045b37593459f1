//! Probability calibration by binned isotonic regression. Raw classifier scores are
//! pooled into bins and the bin means are made monotone by the pool-adjacent-violators
//! algorithm; serving interpolates between pooled points.

use serde::{Deserialize, Serialize};

const DEFAULT_BINS: usize = 10;
const MIN_SAMPLES: usize = 10;

/// A fitted monotone mapping from raw score to calibrated probability. The points are
/// (mean score, pooled outcome rate) pairs in ascending score order; an empty point
/// set is the identity mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotonicCalibrator {
    points: Vec<(f64, f64)>,
}
impl IsotonicCalibrator {
    pub fn identity() -> Self {
        Self { points: vec![] }
    }

    /// Fits against raw scores and binary outcomes. Degenerate inputs (mismatched or
    /// tiny samples) fall back to the identity mapping rather than a misleading fit.
    pub fn fit(scores: &[f64], outcomes: &[f64]) -> Self {
        Self::fit_binned(scores, outcomes, DEFAULT_BINS)
    }

    pub fn fit_binned(scores: &[f64], outcomes: &[f64], bins: usize) -> Self {
        if scores.len() != outcomes.len() || scores.len() < MIN_SAMPLES || bins == 0 {
            return Self::identity();
        }

        let mut bin_weight = vec![0.0f64; bins];
        let mut bin_score_sum = vec![0.0f64; bins];
        let mut bin_outcome_sum = vec![0.0f64; bins];
        for (&score, &outcome) in scores.iter().zip(outcomes.iter()) {
            let bin = ((score.clamp(0.0, 1.0) * bins as f64) as usize).min(bins - 1);
            bin_weight[bin] += 1.0;
            bin_score_sum[bin] += score;
            bin_outcome_sum[bin] += outcome;
        }

        let mut points: Vec<(f64, f64, f64)> = (0..bins)
            .filter(|&bin| bin_weight[bin] > 0.0)
            .map(|bin| {
                (
                    bin_score_sum[bin] / bin_weight[bin],
                    bin_outcome_sum[bin] / bin_weight[bin],
                    bin_weight[bin],
                )
            })
            .collect();

        pava(&mut points);
        Self {
            points: points.into_iter().map(|(x, y, _)| (x, y)).collect(),
        }
    }

    /// Maps a raw score through the fitted curve, interpolating between pooled points
    /// and clamping beyond the outermost ones.
    pub fn apply(&self, score: f64) -> f64 {
        if self.points.is_empty() {
            return score;
        }
        let first = self.points[0];
        if score <= first.0 {
            return first.1;
        }
        let last = self.points[self.points.len() - 1];
        if score >= last.0 {
            return last.1;
        }
        for window in self.points.windows(2) {
            let (x0, y0) = window[0];
            let (x1, y1) = window[1];
            if score <= x1 {
                if x1 == x0 {
                    return y1;
                }
                let t = (score - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        last.1
    }

    pub fn is_identity(&self) -> bool {
        self.points.is_empty()
    }
}

/// Weighted pool-adjacent-violators: merges neighbouring points until the y values are
/// non-decreasing.
fn pava(points: &mut Vec<(f64, f64, f64)>) {
    let mut index = 0;
    while index + 1 < points.len() {
        if points[index].1 > points[index + 1].1 {
            let (x0, y0, w0) = points[index];
            let (x1, y1, w1) = points[index + 1];
            let weight = w0 + w1;
            points[index] = (
                (x0 * w0 + x1 * w1) / weight,
                (y0 * w0 + y1 * w1) / weight,
                weight,
            );
            points.remove(index + 1);
            index = index.saturating_sub(1);
        } else {
            index += 1;
        }
    }
}
