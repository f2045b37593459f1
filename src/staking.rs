//! Kelly-criterion stake sizing. Moneyline stakes use the closed-form Kelly fraction
//! against the quoted payout; spread and total markets have no fixed payout, so they
//! use a rate-per-point heuristic. All stakes are fractional-Kelly scaled and clamped.

use anyhow::bail;

#[derive(Clone, Debug)]
pub struct StakeConfig {
    /// Bankroll fraction per point of edge for spread/total markets.
    pub edge_rate: f64,
    /// Hard cap on any single stake.
    pub max_fraction: f64,
    /// Fractional-Kelly multiplier, below 1 to damp estimation error.
    pub kelly_multiplier: f64,
}
impl Default for StakeConfig {
    fn default() -> Self {
        Self {
            edge_rate: 0.005,
            max_fraction: 0.05,
            kelly_multiplier: 0.25,
        }
    }
}
impl StakeConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.edge_rate <= 0.0 {
            bail!("edge rate must be positive");
        }
        if !(0.0..=1.0).contains(&self.max_fraction) {
            bail!("max fraction must lie in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.kelly_multiplier) {
            bail!("Kelly multiplier must lie in [0, 1]");
        }
        Ok(())
    }

    /// Kelly stake for a moneyline bet at `american_odds` given model win probability
    /// `p`. Zero whenever the model holds no advantage over the implied probability,
    /// or when `p` or the odds are unusable.
    pub fn moneyline_stake(&self, p: f64, american_odds: f64) -> f64 {
        if !(p > 0.0 && p < 1.0) || american_odds == 0.0 || american_odds.is_nan() {
            return 0.0;
        }
        let payout = if american_odds > 0.0 {
            american_odds / 100.0
        } else {
            100.0 / -american_odds
        };
        let kelly = (payout * p - (1.0 - p)) / payout;
        if kelly <= 0.0 {
            return 0.0;
        }
        (kelly * self.kelly_multiplier).clamp(0.0, self.max_fraction)
    }

    /// Heuristic stake for a spread or total bet, proportional to the edge in points.
    /// `edge_points` is signed in favour of the picked side; no edge, no bet.
    pub fn spread_total_stake(&self, edge_points: f64) -> f64 {
        if edge_points <= 0.0 || edge_points.is_nan() {
            return 0.0;
        }
        let raw = (edge_points * self.edge_rate).min(self.max_fraction);
        (raw * self.kelly_multiplier).clamp(0.0, self.max_fraction)
    }
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;

    use crate::market::american_to_prob;

    use super::*;

    fn full_kelly() -> StakeConfig {
        StakeConfig {
            kelly_multiplier: 1.0,
            max_fraction: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn moneyline_kelly_known_value() {
        // Even payout, 60% win probability: f = (1*0.6 - 0.4)/1 = 0.2.
        assert_float_absolute_eq!(0.2, full_kelly().moneyline_stake(0.6, 100.0), 1e-12);
        // Quarter-Kelly of the same spot.
        let config = StakeConfig {
            kelly_multiplier: 0.25,
            max_fraction: 1.0,
            ..Default::default()
        };
        assert_float_absolute_eq!(0.05, config.moneyline_stake(0.6, 100.0), 1e-12);
    }

    #[test]
    fn moneyline_zero_without_advantage() {
        let config = full_kelly();
        for odds in [-250.0, -110.0, 140.0] {
            let implied = american_to_prob(odds).unwrap();
            assert_eq!(0.0, config.moneyline_stake(implied, odds));
            assert_eq!(0.0, config.moneyline_stake(implied - 0.05, odds));
            assert!(config.moneyline_stake(implied + 0.05, odds) > 0.0);
        }
    }

    #[test]
    fn moneyline_invalid_inputs_stake_nothing() {
        let config = full_kelly();
        assert_eq!(0.0, config.moneyline_stake(0.0, 100.0));
        assert_eq!(0.0, config.moneyline_stake(1.0, 100.0));
        assert_eq!(0.0, config.moneyline_stake(1.2, 100.0));
        assert_eq!(0.0, config.moneyline_stake(0.6, 0.0));
    }

    #[test]
    fn moneyline_clamped_to_max() {
        let config = StakeConfig {
            kelly_multiplier: 1.0,
            max_fraction: 0.05,
            ..Default::default()
        };
        assert_float_absolute_eq!(0.05, config.moneyline_stake(0.9, 100.0), 1e-12);
    }

    #[test]
    fn spread_stake_proportional_and_capped() {
        let config = StakeConfig {
            edge_rate: 0.01,
            max_fraction: 0.05,
            kelly_multiplier: 1.0,
        };
        assert_float_absolute_eq!(0.02, config.spread_total_stake(2.0), 1e-12);
        assert_float_absolute_eq!(0.05, config.spread_total_stake(40.0), 1e-12);
        assert_eq!(0.0, config.spread_total_stake(0.0));
        assert_eq!(0.0, config.spread_total_stake(-3.0));
        assert_eq!(0.0, config.spread_total_stake(f64::NAN));
    }

    #[test]
    fn config_validation() {
        assert!(StakeConfig::default().validate().is_ok());
        assert!(StakeConfig {
            edge_rate: 0.0,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(StakeConfig {
            max_fraction: 1.5,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(StakeConfig {
            kelly_multiplier: -0.1,
            ..Default::default()
        }
        .validate()
        .is_err());
    }
}
