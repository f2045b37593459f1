//! Per-season market models: a cover classifier and win classifier (regularised
//! logistic regression, isotonically calibrated) and a totals regressor (OLS). A
//! model is pinned to the feature schema it was trained on; every prediction path
//! reconciles incoming rows against that schema before scoring.

use std::path::Path;

use anyhow::bail;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::features::FeatureRow;
use crate::file;
use crate::linear::regression::{Predictor, RegressionModel};
use crate::linear::Matrix;
use crate::model::calibrate::IsotonicCalibrator;

pub mod calibrate;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no trained model at or before season {season}")]
    NoTrainedModel { season: u16 },

    #[error("no training rows for the {market} model in season {season}")]
    NoTrainingRows { market: &'static str, season: u16 },

    #[error(transparent)]
    Fit(#[from] anyhow::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// The ordered feature names a model was trained on. Pinned at fit time and never
/// mutated; serving rows are reconciled against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}
impl FeatureSchema {
    pub fn pin(row: &FeatureRow) -> Self {
        Self {
            names: row.features.iter().map(|(name, _)| name.clone()).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Projects a row onto the pinned schema: missing features become 0, extra
    /// features are dropped, and the output order always matches the pinned order.
    /// Every predict path goes through here; there is no unreconciled scoring.
    pub fn reconcile(&self, row: &FeatureRow) -> Vec<f64> {
        let by_name: FxHashMap<&str, f64> = row
            .features
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect();
        self.names
            .iter()
            .map(|name| by_name.get(name.as_str()).copied().unwrap_or(0.0))
            .collect()
    }

    fn matrix(&self, rows: &[&FeatureRow]) -> Matrix {
        let mut matrix = Matrix::allocate(rows.len(), self.len());
        for (row_index, row) in rows.iter().enumerate() {
            matrix
                .row_slice_mut(row_index)
                .clone_from_slice(&self.reconcile(row));
        }
        matrix
    }
}

/// Per-column affine normalisation fitted on the training matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    means: Vec<f64>,
    stds: Vec<f64>,
}
impl Standardizer {
    fn fit(data: &Matrix) -> Self {
        let rows = data.rows().max(1) as f64;
        let mut means = vec![0.0; data.cols()];
        for row in data.row_iter() {
            for (col, &value) in row.iter().enumerate() {
                means[col] += value;
            }
        }
        for mean in &mut means {
            *mean /= rows;
        }
        let mut stds = vec![0.0; data.cols()];
        for row in data.row_iter() {
            for (col, &value) in row.iter().enumerate() {
                stds[col] += (value - means[col]).powi(2);
            }
        }
        for std in &mut stds {
            *std = (*std / rows).sqrt();
            // Constant columns pass through unscaled.
            if *std == 0.0 {
                *std = 1.0;
            }
        }
        Self { means, stds }
    }

    fn transform(&self, values: &mut [f64]) {
        for (col, value) in values.iter_mut().enumerate() {
            *value = (*value - self.means[col]) / self.stds[col];
        }
    }
}

#[derive(Clone, Debug)]
pub struct GradientDescentConfig {
    pub learning_rate: f64,
    pub max_epochs: u64,
    pub l2: f64,
    pub acceptable_loss_delta: f64,
}
impl Default for GradientDescentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_epochs: 500,
            l2: 1e-3,
            acceptable_loss_delta: 1e-7,
        }
    }
}
impl GradientDescentConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.learning_rate <= 0.0 {
            bail!("learning rate must be positive");
        }
        if self.max_epochs == 0 {
            bail!("at least one epoch must be specified");
        }
        if self.l2 < 0.0 {
            bail!("L2 penalty must be non-negative");
        }
        if self.acceptable_loss_delta < 0.0 {
            bail!("acceptable loss delta must be non-negative");
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct LogisticFitOutcome {
    pub epochs: u64,
    pub loss: f64,
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Batch gradient descent on the L2-penalised log loss. `labels` are 0/1 and `data`
/// is assumed standardized.
fn fit_logistic(
    config: &GradientDescentConfig,
    labels: &[f64],
    data: &Matrix,
) -> Result<(Vec<f64>, f64, LogisticFitOutcome), anyhow::Error> {
    config.validate()?;
    if labels.len() != data.rows() {
        bail!(
            "{} labels given for a matrix of {} rows",
            labels.len(),
            data.rows()
        );
    }

    let samples = data.rows() as f64;
    let mut weights = vec![0.0; data.cols()];
    let mut intercept = 0.0;
    let mut previous_loss = f64::INFINITY;
    let mut epochs = 0;
    let mut loss = f64::INFINITY;
    while epochs < config.max_epochs {
        epochs += 1;
        let mut weight_grads = vec![0.0; data.cols()];
        let mut intercept_grad = 0.0;
        loss = 0.0;
        for (row_index, row) in data.row_iter().enumerate() {
            let z = intercept
                + weights
                    .iter()
                    .zip(row.iter())
                    .map(|(weight, value)| weight * value)
                    .sum::<f64>();
            let predicted = sigmoid(z);
            let error = predicted - labels[row_index];
            intercept_grad += error;
            for (col, &value) in row.iter().enumerate() {
                weight_grads[col] += error * value;
            }
            let clamped = predicted.clamp(1e-12, 1.0 - 1e-12);
            loss -= labels[row_index] * clamped.ln() + (1.0 - labels[row_index]) * (1.0 - clamped).ln();
        }
        loss /= samples;
        loss += config.l2 / 2.0 * weights.iter().map(|weight| weight * weight).sum::<f64>();

        intercept -= config.learning_rate * intercept_grad / samples;
        for (col, weight) in weights.iter_mut().enumerate() {
            *weight -=
                config.learning_rate * (weight_grads[col] / samples + config.l2 * *weight);
        }

        if (previous_loss - loss).abs() < config.acceptable_loss_delta {
            break;
        }
        previous_loss = loss;
    }
    Ok((weights, intercept, LogisticFitOutcome { epochs, loss }))
}

/// A calibrated binary classifier over the pinned schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classifier {
    pub schema: FeatureSchema,
    standardizer: Standardizer,
    weights: Vec<f64>,
    intercept: f64,
    calibrator: IsotonicCalibrator,
}
impl Classifier {
    fn fit(
        rows: &[&FeatureRow],
        labels: &[f64],
        config: &GradientDescentConfig,
    ) -> Result<Self, ModelError> {
        let schema = FeatureSchema::pin(rows[0]);
        let mut data = schema.matrix(rows);
        let standardizer = Standardizer::fit(&data);
        for row_index in 0..data.rows() {
            standardizer.transform(data.row_slice_mut(row_index));
        }
        let (weights, intercept, outcome) = fit_logistic(config, labels, &data)?;
        debug!(
            "logistic fit over {} rows converged in {} epochs, loss {:.6}",
            rows.len(),
            outcome.epochs,
            outcome.loss
        );

        let mut classifier = Self {
            schema,
            standardizer,
            weights,
            intercept,
            calibrator: IsotonicCalibrator::identity(),
        };
        let raw_scores: Vec<f64> = rows.iter().map(|row| classifier.raw_score(row)).collect();
        classifier.calibrator = IsotonicCalibrator::fit(&raw_scores, labels);
        Ok(classifier)
    }

    /// Uncalibrated sigmoid score.
    pub fn raw_score(&self, row: &FeatureRow) -> f64 {
        let mut input = self.schema.reconcile(row);
        self.standardizer.transform(&mut input);
        let z = self.intercept
            + self
                .weights
                .iter()
                .zip(input.iter())
                .map(|(weight, value)| weight * value)
                .sum::<f64>();
        sigmoid(z)
    }

    /// Calibrated probability of the positive class.
    pub fn predict_prob(&self, row: &FeatureRow) -> f64 {
        self.calibrator.apply(self.raw_score(row))
    }
}

/// Points-total regressor over the pinned schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalModel {
    pub schema: FeatureSchema,
    pub predictor: Predictor,
}
impl TotalModel {
    fn fit(rows: &[&FeatureRow], response: &[f64]) -> Result<Self, ModelError> {
        let schema = FeatureSchema::pin(rows[0]);
        let data = schema.matrix(rows);
        let model = RegressionModel::fit(response, schema.names().to_vec(), &data)?;
        Ok(Self {
            schema,
            predictor: model.predictor,
        })
    }

    pub fn predict(&self, row: &FeatureRow) -> f64 {
        self.predictor.predict(&self.schema.reconcile(row))
    }
}

/// How the cover classifier was trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingMode {
    /// Trained on cover outcomes against quoted spreads.
    Standard,
    /// No quoted spreads existed in the training slice; the classifier was trained on
    /// straight-up win outcomes instead, and its output must be read as a win
    /// probability.
    WinFallback,
}

/// All three market models for one serving season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonModels {
    pub season: u16,
    pub cover: Classifier,
    pub cover_mode: TrainingMode,
    pub win: Classifier,
    pub total: TotalModel,
}

fn win_label(row: &FeatureRow) -> Option<f64> {
    let margin = row.home_margin?;
    if margin == 0.0 {
        return None;
    }
    Some(if margin > 0.0 { 1.0 } else { 0.0 })
}

fn cover_label(row: &FeatureRow) -> Option<f64> {
    let margin = row.home_margin?;
    let spread = row.market.spread_home?;
    if spread == 0.0 {
        return None;
    }
    let cover_margin = margin - spread;
    // Pushes carry no signal either way.
    if cover_margin == 0.0 {
        return None;
    }
    Some(if cover_margin > 0.0 { 1.0 } else { 0.0 })
}

fn labelled<'a>(
    rows: &'a [FeatureRow],
    label: impl Fn(&FeatureRow) -> Option<f64>,
) -> (Vec<&'a FeatureRow>, Vec<f64>) {
    let mut kept = vec![];
    let mut labels = vec![];
    for row in rows {
        if let Some(value) = label(row) {
            kept.push(row);
            labels.push(value);
        }
    }
    (kept, labels)
}

/// Trains the three market models for `season` from the given training rows.
///
/// The cover classifier trains only on rows with a quoted, non-zero spread. When the
/// slice has none at all, it widens to straight-up win outcomes and flags the model
/// [`TrainingMode::WinFallback`] so downstream pricing knows the output is a win
/// probability, not a cover probability.
pub fn train_season(
    rows: &[FeatureRow],
    season: u16,
    config: &GradientDescentConfig,
) -> Result<SeasonModels, ModelError> {
    let (win_rows, win_labels) = labelled(rows, win_label);
    if win_rows.is_empty() {
        return Err(ModelError::NoTrainingRows {
            market: "win",
            season,
        });
    }
    let win = Classifier::fit(&win_rows, &win_labels, config)?;

    let (cover_rows, cover_labels) = labelled(rows, cover_label);
    let (cover, cover_mode) = if cover_rows.is_empty() {
        warn!(
            "season {season}: no spread-quoted training rows; cover model degrades to \
             win outcomes"
        );
        (
            Classifier::fit(&win_rows, &win_labels, config)?,
            TrainingMode::WinFallback,
        )
    } else {
        (
            Classifier::fit(&cover_rows, &cover_labels, config)?,
            TrainingMode::Standard,
        )
    };

    let (total_rows, total_response): (Vec<&FeatureRow>, Vec<f64>) =
        labelled(rows, |row| row.total_points);
    if total_rows.is_empty() {
        return Err(ModelError::NoTrainingRows {
            market: "total",
            season,
        });
    }
    let total = TotalModel::fit(&total_rows, &total_response)?;

    info!(
        "trained season {season} models: win on {} rows, cover on {} rows ({cover_mode:?}), \
         total on {} rows",
        win_rows.len(),
        if cover_rows.is_empty() {
            win_rows.len()
        } else {
            cover_rows.len()
        },
        total_rows.len()
    );
    Ok(SeasonModels {
        season,
        cover,
        cover_mode,
        win,
        total,
    })
}

/// Trained models keyed by serving season, held in ascending season order.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStore {
    models: Vec<SeasonModels>,
}
impl ModelStore {
    pub fn insert(&mut self, models: SeasonModels) {
        self.models.retain(|existing| existing.season != models.season);
        self.models.push(models);
        self.models.sort_by_key(|models| models.season);
    }

    pub fn seasons(&self) -> Vec<u16> {
        self.models.iter().map(|models| models.season).collect()
    }

    /// Models for `season`, falling back to the nearest earlier season. Serving a
    /// later season's models would leak future information, so there is no forward
    /// fallback.
    pub fn for_season(&self, season: u16) -> Result<&SeasonModels, ModelError> {
        self.models
            .iter()
            .rev()
            .find(|models| models.season <= season)
            .ok_or(ModelError::NoTrainedModel { season })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        file::write_json(path, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        Ok(file::read_json(path)?)
    }
}
