//! A walk-forward model of college football betting markets. Builds leakage-free
//! training data from historical game tables, fits calibrated per-season models for
//! spread cover, outright win and total points, and converts probabilities into
//! betting-comparable fair lines, Kelly stakes and confidence tiers.

pub mod availability;
pub mod backtest;
pub mod confidence;
pub mod data;
pub mod dist;
pub mod features;
pub mod file;
pub mod linear;
pub mod market;
pub mod model;
pub mod print;
pub mod split;
pub mod staking;

#[cfg(test)]
pub(crate) mod testing;

#[doc = include_str!("../README.md")]
#[cfg(doc)]
fn readme() {}
