//! Edge-to-confidence tiering. Each market maps its absolute edge onto a discrete
//! 0-10 tier through piecewise breakpoints tuned against historical hit rates. Tier 0
//! means no opinion.

use crate::market::EDGE_EPSILON;

/// Tier for a point-denominated edge (spread and total markets share the curve).
fn points_tier(edge: f64) -> u8 {
    let edge = edge.abs();
    if edge < EDGE_EPSILON {
        0
    } else if edge < 0.5 {
        1
    } else if edge < 1.5 {
        2
    } else if edge < 3.0 {
        3
    } else if edge < 5.0 {
        4 + ((edge - 3.0) / 2.0) as u8
    } else if edge < 8.0 {
        6 + ((edge - 5.0) / 3.0) as u8
    } else if edge < 12.0 {
        8
    } else if edge < 18.0 {
        9
    } else {
        10
    }
}

/// Spread confidence, discounted when the market line itself is a blowout. Big
/// spreads price high-variance games; the discount floors at tier 1 so a genuine
/// opinion is never erased.
pub fn spread_confidence(edge_points: f64, market_spread: Option<f64>) -> u8 {
    let tier = points_tier(edge_points);
    if tier == 0 {
        return 0;
    }
    let discount = match market_spread.map(f64::abs) {
        Some(spread) if spread >= 20.0 => 2,
        Some(spread) if spread >= 15.0 => 1,
        _ => 0,
    };
    tier.saturating_sub(discount).max(1)
}

pub fn total_confidence(edge_points: f64) -> u8 {
    points_tier(edge_points)
}

/// Moneyline confidence; the edge here is in probability units (model minus implied).
pub fn moneyline_confidence(edge_prob: f64) -> u8 {
    let edge = edge_prob.abs();
    if edge < EDGE_EPSILON {
        0
    } else if edge < 0.04 {
        1
    } else if edge < 0.06 {
        2
    } else if edge < 0.09 {
        3
    } else if edge < 0.12 {
        4
    } else if edge < 0.15 {
        5
    } else if edge < 0.18 {
        6
    } else if edge < 0.22 {
        7
    } else if edge < 0.25 {
        8
    } else if edge < 0.30 {
        9
    } else {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_edge_means_no_opinion() {
        assert_eq!(0, spread_confidence(0.0, Some(-7.0)));
        assert_eq!(0, total_confidence(0.0005));
        assert_eq!(0, moneyline_confidence(-0.0001));
    }

    #[test]
    fn points_tiers() {
        assert_eq!(1, total_confidence(0.3));
        assert_eq!(2, total_confidence(1.0));
        assert_eq!(3, total_confidence(2.0));
        assert_eq!(4, total_confidence(3.5));
        assert_eq!(4, total_confidence(4.9));
        assert_eq!(6, total_confidence(5.5));
        assert_eq!(6, total_confidence(7.9));
        assert_eq!(8, total_confidence(9.0));
        assert_eq!(9, total_confidence(15.0));
        assert_eq!(10, total_confidence(25.0));
        // Sign never matters.
        assert_eq!(total_confidence(6.0), total_confidence(-6.0));
    }

    #[test]
    fn points_tiers_non_decreasing() {
        let mut previous = 0;
        for step in 0..400 {
            let tier = total_confidence(step as f64 * 0.05);
            assert!(tier >= previous, "tier dropped at edge {}", step as f64 * 0.05);
            previous = tier;
        }
    }

    #[test]
    fn moneyline_tiers() {
        assert_eq!(1, moneyline_confidence(0.02));
        assert_eq!(2, moneyline_confidence(0.05));
        assert_eq!(3, moneyline_confidence(0.07));
        assert_eq!(4, moneyline_confidence(0.10));
        assert_eq!(5, moneyline_confidence(0.13));
        assert_eq!(6, moneyline_confidence(0.16));
        assert_eq!(7, moneyline_confidence(0.20));
        assert_eq!(8, moneyline_confidence(0.23));
        assert_eq!(9, moneyline_confidence(0.27));
        assert_eq!(10, moneyline_confidence(0.35));
    }

    #[test]
    fn moneyline_tiers_non_decreasing() {
        let mut previous = 0;
        for step in 0..100 {
            let tier = moneyline_confidence(step as f64 * 0.005);
            assert!(tier >= previous);
            previous = tier;
        }
    }

    #[test]
    fn blowout_spreads_discount_confidence() {
        assert_eq!(8, spread_confidence(9.0, Some(-7.0)));
        assert_eq!(7, spread_confidence(9.0, Some(-15.0)));
        assert_eq!(6, spread_confidence(9.0, Some(20.5)));
        assert_eq!(8, spread_confidence(9.0, None));
        // Floored at 1, never discounted to silence.
        assert_eq!(1, spread_confidence(0.3, Some(-21.0)));
        assert_eq!(1, spread_confidence(1.0, Some(-24.0)));
    }
}
