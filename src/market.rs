//! Odds-space conversions: American odds to implied probability, model probability to
//! a market-comparable fair spread, and the pick derived from the resulting edge.
//!
//! Spread sign convention throughout: home perspective, negative means home favoured.

use strum_macros::Display;

use crate::dist::inv_norm_cdf;

/// Smallest edge treated as an opinion; below this the model abstains.
pub const EDGE_EPSILON: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OverUnder {
    Over,
    Under,
}

/// The total-market pick implied by a fair-vs-market total edge, if any. Positive
/// edge favours the over.
pub fn total_pick(edge: f64) -> Option<OverUnder> {
    if edge > EDGE_EPSILON {
        Some(OverUnder::Over)
    } else if edge < -EDGE_EPSILON {
        Some(OverUnder::Under)
    } else {
        None
    }
}

/// Implied win probability of American odds, vig included. Zero odds are unquotable.
pub fn american_to_prob(odds: f64) -> Option<f64> {
    if odds == 0.0 || odds.is_nan() {
        return None;
    }
    if odds > 0.0 {
        Some(100.0 / (odds + 100.0))
    } else {
        Some(-odds / (-odds + 100.0))
    }
}

/// American odds quoting a probability; `p` outside (0, 1) is unquotable.
pub fn prob_to_american(p: f64) -> Option<f64> {
    if !(p > 0.0 && p < 1.0) {
        return None;
    }
    if p >= 0.5 {
        Some(-100.0 * p / (1.0 - p))
    } else {
        Some(100.0 * (1.0 - p) / p)
    }
}

/// Standard deviation of the home margin, stepped on the absolute rating gap. Larger
/// gaps mean more predictable games, hence lower variance.
pub fn margin_sigma(rating_gap: f64) -> f64 {
    let gap = rating_gap.abs();
    if gap > 30.0 {
        10.0
    } else if gap > 20.0 {
        11.0
    } else if gap > 10.0 {
        12.0
    } else if gap > 5.0 {
        12.5
    } else {
        13.0
    }
}

/// Which probability anchored the fair spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingBasis {
    /// Cover probability applied as an offset to the quoted market spread.
    MarketAnchored,
    /// Win probability projected from scratch; used when no spread is quoted or the
    /// cover model is degraded to win semantics.
    WinProjection,
}

/// A fair spread and its edge against the market.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FairSpread {
    pub fair_spread: f64,
    pub edge: f64,
    pub basis: PricingBasis,
}
impl FairSpread {
    /// The side the edge favours, if any. Positive edge favours home.
    pub fn pick(&self) -> Option<Side> {
        if self.edge > EDGE_EPSILON {
            Some(Side::Home)
        } else if self.edge < -EDGE_EPSILON {
            Some(Side::Away)
        } else {
            None
        }
    }
}

/// Derives the fair spread from model probabilities.
///
/// With a quoted spread and a usable cover probability, the market line is the hurdle:
/// `fair = market + invNormCdf(p_cover) * sigma`. Without either, the win probability
/// projects a line from scratch: `fair = invNormCdf(p_win) * sigma`. A degenerate
/// probability (at or beyond 0/1) prices flat at 0 rather than blowing out to
/// infinity. Edge is `fair + market`, positive favouring home.
pub fn derive_fair_spread(
    cover_prob: Option<f64>,
    win_prob: f64,
    market_spread: Option<f64>,
    sigma: f64,
) -> FairSpread {
    let (fair_spread, basis) = match (market_spread, cover_prob) {
        (Some(market), Some(p_cover)) => {
            let z = inv_norm_cdf(p_cover);
            let fair = if z.is_finite() { market + z * sigma } else { 0.0 };
            (fair, PricingBasis::MarketAnchored)
        }
        _ => {
            let z = inv_norm_cdf(win_prob);
            let fair = if z.is_finite() { z * sigma } else { 0.0 };
            (fair, PricingBasis::WinProjection)
        }
    };
    FairSpread {
        fair_spread,
        edge: fair_spread + market_spread.unwrap_or(0.0),
        basis,
    }
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;

    use super::*;

    #[test]
    fn implied_probability() {
        assert_float_absolute_eq!(0.4, american_to_prob(150.0).unwrap(), 1e-12);
        assert_float_absolute_eq!(0.6, american_to_prob(-150.0).unwrap(), 1e-12);
        assert_float_absolute_eq!(110.0 / 210.0, american_to_prob(-110.0).unwrap(), 1e-12);
        assert_eq!(None, american_to_prob(0.0));
        assert_eq!(None, american_to_prob(f64::NAN));
    }

    #[test]
    fn odds_round_trip() {
        for odds in [-340.0, -110.0, -100.0, 120.0, 475.0] {
            let p = american_to_prob(odds).unwrap();
            assert_float_absolute_eq!(odds, prob_to_american(p).unwrap(), 1e-9);
        }
        assert_eq!(None, prob_to_american(0.0));
        assert_eq!(None, prob_to_american(1.0));
    }

    #[test]
    fn sigma_steps() {
        assert_float_absolute_eq!(10.0, margin_sigma(31.0), 1e-12);
        assert_float_absolute_eq!(11.0, margin_sigma(25.0), 1e-12);
        assert_float_absolute_eq!(12.0, margin_sigma(-15.0), 1e-12);
        assert_float_absolute_eq!(12.5, margin_sigma(7.5), 1e-12);
        assert_float_absolute_eq!(13.0, margin_sigma(5.0), 1e-12);
        assert_float_absolute_eq!(13.0, margin_sigma(0.0), 1e-12);
    }

    #[test]
    fn even_cover_prob_prices_at_market() {
        // Exact, not approximate: the quantile is exactly 0 at p = 0.5.
        let priced = derive_fair_spread(Some(0.5), 0.5, Some(-7.0), 12.0);
        assert_eq!(PricingBasis::MarketAnchored, priced.basis);
        assert_eq!(-7.0, priced.fair_spread);
    }

    #[test]
    fn fair_spread_increases_with_cover_prob() {
        let mut previous = f64::NEG_INFINITY;
        for p in [0.1, 0.3, 0.5, 0.7, 0.9] {
            let priced = derive_fair_spread(Some(p), 0.5, Some(-7.0), 12.0);
            assert!(priced.fair_spread > previous);
            previous = priced.fair_spread;
        }
    }

    #[test]
    fn seven_point_favourite_scenario() {
        // Home favoured by 7, model has it covering 70% of the time at sigma 12.
        let priced = derive_fair_spread(Some(0.7), 0.6, Some(-7.0), 12.0);
        assert_float_absolute_eq!(-0.707, priced.fair_spread, 0.01);
        assert_float_absolute_eq!(-7.707, priced.edge, 0.01);
        assert_eq!(Some(Side::Away), priced.pick());
    }

    #[test]
    fn no_market_spread_projects_from_win_prob() {
        let priced = derive_fair_spread(Some(0.7), 0.5, None, 13.0);
        assert_eq!(PricingBasis::WinProjection, priced.basis);
        // Pick'em at any sigma, exactly.
        assert_eq!(0.0, priced.fair_spread);
        assert_eq!(0.0, priced.edge);
        assert_eq!(None, priced.pick());
    }

    #[test]
    fn degraded_cover_prob_projects_from_win_prob() {
        let priced = derive_fair_spread(None, 0.7, Some(-3.0), 13.0);
        assert_eq!(PricingBasis::WinProjection, priced.basis);
        assert_float_absolute_eq!(0.5244005127080407 * 13.0, priced.fair_spread, 1e-6);
    }

    #[test]
    fn degenerate_probability_prices_flat() {
        for p in [0.0, 1.0, -0.5, 1.5] {
            let priced = derive_fair_spread(Some(p), 0.5, Some(-7.0), 12.0);
            assert_float_absolute_eq!(0.0, priced.fair_spread, 1e-12);
            let projected = derive_fair_spread(None, p, None, 12.0);
            assert_float_absolute_eq!(0.0, projected.fair_spread, 1e-12);
        }
    }
}
