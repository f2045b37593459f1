//! Ordinary least squares over a feature matrix with named columns.

use std::ops::Range;

use anyhow::bail;
use linregress::fit_low_level_regression_model;
use serde::{Deserialize, Serialize};
use stanza::style::{HAlign, Header, MinWidth, Styles};
use stanza::table::{Col, Row, Table};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::linear::Matrix;

/// A fitted linear predictor. The regressor names are pinned in the order the
/// coefficients were fitted; `predict` expects its input slice in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictor {
    pub regressors: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}
impl Predictor {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.regressors.is_empty() {
            bail!("at least one regressor must be present");
        }
        if self.regressors.len() != self.coefficients.len() {
            bail!("exactly one coefficient must be specified for each regressor");
        }
        Ok(())
    }

    pub fn predict(&self, input: &[f64]) -> f64 {
        debug_assert_eq!(
            self.coefficients.len(),
            input.len(),
            "input width {} does not match {} fitted coefficients",
            input.len(),
            self.coefficients.len()
        );
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(input.iter())
                .map(|(coefficient, value)| coefficient * value)
                .sum::<f64>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionModel {
    pub predictor: Predictor,
    pub std_errors: Vec<f64>,
    pub p_values: Vec<f64>,
    pub r_squared: f64,
    pub r_squared_adj: f64,
}
impl RegressionModel {
    /// Fits `response` against the given `data`, one row per observation, with
    /// `regressors` naming the columns of `data` in order. An intercept is always
    /// included.
    pub fn fit(
        response: &[f64],
        regressors: Vec<String>,
        data: &Matrix,
    ) -> Result<Self, anyhow::Error> {
        if regressors.is_empty() {
            bail!("at least one regressor must be present");
        }
        if regressors.len() != data.cols() {
            bail!(
                "{} regressor names given for a matrix of {} columns",
                regressors.len(),
                data.cols()
            );
        }
        if response.len() != data.rows() {
            bail!(
                "{} responses given for a matrix of {} rows",
                response.len(),
                data.rows()
            );
        }

        // linregress low-level layout: response first, then an all-ones intercept
        // column, then the regressors.
        let mut subset = Matrix::allocate(data.rows(), 2 + regressors.len());
        for (row_index, row_data) in data.row_iter().enumerate() {
            subset[(row_index, 0)] = response[row_index];
            subset[(row_index, 1)] = 1.0;
            for (regressor_index, &value) in row_data.iter().enumerate() {
                subset[(row_index, 2 + regressor_index)] = value;
            }
        }

        let model = fit_low_level_regression_model(subset.flatten(), subset.rows(), subset.cols())?;
        let mut coefficients = model.parameters().to_vec();
        let intercept = coefficients.remove(0);
        let std_errors = model.se().to_vec();
        let p_values = model.p_values().to_vec();
        let r_squared = model.rsquared();
        let r_squared_adj = model.rsquared_adj();
        Ok(RegressionModel {
            predictor: Predictor {
                regressors,
                coefficients,
                intercept,
            },
            std_errors,
            p_values,
            r_squared,
            r_squared_adj,
        })
    }

    pub fn tabulate(&self) -> Table {
        let mut table = Table::default()
            .with_cols(vec![
                Col::new(Styles::default()),
                Col::new(Styles::default().with(MinWidth(12)).with(HAlign::Right)),
                Col::new(Styles::default().with(MinWidth(11)).with(HAlign::Right)),
                Col::new(Styles::default().with(MinWidth(9)).with(HAlign::Right)),
                Col::new(Styles::default().with(MinWidth(5))),
            ])
            .with_row(Row::new(
                Styles::default().with(Header(true)),
                vec![
                    "Regressor".into(),
                    "Coefficient".into(),
                    "Std. error".into(),
                    "P-value".into(),
                    "".into(),
                ],
            ));
        table.push_row(Row::new(
            Styles::default(),
            vec![
                "(intercept)".into(),
                format!("{:.8}", self.predictor.intercept).into(),
                format!("{:.6}", self.std_errors[0]).into(),
                format!("{:.6}", self.p_values[0]).into(),
                Significance::lookup(self.p_values[0]).label().into(),
            ],
        ));
        for (regressor_index, regressor) in self.predictor.regressors.iter().enumerate() {
            table.push_row(Row::new(
                Styles::default(),
                vec![
                    regressor.clone().into(),
                    format!("{:.8}", self.predictor.coefficients[regressor_index]).into(),
                    format!("{:.6}", self.std_errors[regressor_index + 1]).into(),
                    format!("{:.6}", self.p_values[regressor_index + 1]).into(),
                    Significance::lookup(self.p_values[regressor_index + 1])
                        .label()
                        .into(),
                ],
            ));
        }

        table
    }
}

#[derive(Debug, Clone, PartialEq, Display, EnumIter)]
pub enum Significance {
    A,
    B,
    C,
    D,
    E,
}
impl Significance {
    pub fn label(&self) -> &'static str {
        match self {
            Significance::A => "***",
            Significance::B => "**",
            Significance::C => "*",
            Significance::D => ".",
            Significance::E => "",
        }
    }

    pub fn range(&self) -> Range<f64> {
        match self {
            Significance::A => 0.0..0.001,
            Significance::B => 0.001..0.01,
            Significance::C => 0.01..0.05,
            Significance::D => 0.05..0.1,
            Significance::E => 0.1..1.0 + f64::EPSILON,
        }
    }

    pub fn lookup(p_value: f64) -> Self {
        for sig in Self::iter() {
            if sig.range().contains(&p_value) {
                return sig;
            }
        }
        unreachable!()
    }
}
