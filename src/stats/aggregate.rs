//! Trade-performance aggregation.
//! All functions are pure -- they take closed operations and return computed values.
//! A ratio with a zero denominator is `None`, never infinity.

use crate::api::types::{Direction, TradeRecord};

/// One metric split by trade direction. `None` serializes as `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct Breakdown {
    pub total: Option<f64>,
    pub long: Option<f64>,
    pub short: Option<f64>,
}

/// Both breakdowns, as served to the rendering layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct TradeMetrics {
    pub profit_factors: Breakdown,
    pub win_rates: Breakdown,
}

impl TradeMetrics {
    pub fn compute(operations: &[TradeRecord]) -> Self {
        Self {
            profit_factors: profit_factors(operations),
            win_rates: win_rates(operations),
        }
    }
}

#[inline]
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[derive(Default)]
struct PnlSums {
    profit: f64,
    loss: f64,
}

impl PnlSums {
    #[inline]
    fn add(&mut self, pnl: f64) {
        if pnl > 0.0 {
            self.profit += pnl;
        } else if pnl < 0.0 {
            self.loss += pnl.abs();
        }
    }

    #[inline]
    fn factor(&self) -> Option<f64> {
        (self.loss > 0.0).then(|| round_to(self.profit / self.loss, 2))
    }
}

/// Gross profit over gross absolute loss, rounded to 2 decimals.
/// Zero-pnl records land in neither sum.
pub fn profit_factors(operations: &[TradeRecord]) -> Breakdown {
    let mut total = PnlSums::default();
    let mut long = PnlSums::default();
    let mut short = PnlSums::default();

    for op in operations {
        let pnl = op.pnl_value();
        total.add(pnl);
        match op.direction() {
            Some(Direction::Long) => long.add(pnl),
            Some(Direction::Short) => short.add(pnl),
            None => {}
        }
    }

    Breakdown {
        total: total.factor(),
        long: long.factor(),
        short: short.factor(),
    }
}

#[derive(Default)]
struct WinCount {
    trades: u64,
    wins: u64,
}

impl WinCount {
    #[inline]
    fn add(&mut self, pnl: f64) {
        self.trades += 1;
        if pnl > 0.0 {
            self.wins += 1;
        }
    }

    #[inline]
    fn rate(&self) -> Option<f64> {
        (self.trades > 0).then(|| round_to(self.wins as f64 / self.trades as f64 * 100.0, 1))
    }
}

/// Percentage of trades with strictly positive pnl, rounded to 1 decimal.
/// Zero-pnl records still count as trades.
pub fn win_rates(operations: &[TradeRecord]) -> Breakdown {
    let mut total = WinCount::default();
    let mut long = WinCount::default();
    let mut short = WinCount::default();

    for op in operations {
        let pnl = op.pnl_value();
        total.add(pnl);
        match op.direction() {
            Some(Direction::Long) => long.add(pnl),
            Some(Direction::Short) => short.add(pnl),
            None => {}
        }
    }

    Breakdown {
        total: total.rate(),
        long: long.rate(),
        short: short.rate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ops(values: serde_json::Value) -> Vec<TradeRecord> {
        serde_json::from_value(values).unwrap()
    }

    #[test]
    fn test_empty_input_all_null() {
        let empty = profit_factors(&[]);
        assert_eq!(empty, Breakdown::default());
        assert_eq!(win_rates(&[]), Breakdown::default());

        let serialized = serde_json::to_value(empty).unwrap();
        assert_eq!(serialized, json!({ "total": null, "long": null, "short": null }));
    }

    #[test]
    fn test_profit_factor_by_direction() {
        let operations = ops(json!([
            { "pnl": 100, "side": "LONG" },
            { "pnl": -50, "side": "LONG" },
            { "pnl": 75, "side": "SHORT" },
            { "pnl": -25, "side": "SHORT" }
        ]));
        let pf = profit_factors(&operations);
        assert_eq!(pf.total, Some(2.33));
        assert_eq!(pf.long, Some(2.0));
        assert_eq!(pf.short, Some(3.0));
    }

    #[test]
    fn test_no_losses_is_null() {
        let operations = ops(json!([
            { "pnl": 10, "side": "LONG" },
            { "pnl": 20, "side": "SHORT" },
            { "pnl": -5, "side": "SHORT" }
        ]));
        let pf = profit_factors(&operations);
        assert_eq!(pf.long, None, "long has no losses");
        assert_eq!(pf.short, Some(4.0));
        assert_eq!(pf.total, Some(6.0));

        let winners = ops(json!([{ "pnl": 10 }, { "pnl": "5" }]));
        assert_eq!(profit_factors(&winners).total, None);
    }

    #[test]
    fn test_missing_side_only_totals() {
        let operations = ops(json!([
            { "pnl": 30 },
            { "pnl": -10 },
            { "pnl": 0 }
        ]));
        let pf = profit_factors(&operations);
        assert_eq!(pf.total, Some(3.0));
        assert_eq!(pf.long, None);
        assert_eq!(pf.short, None);

        let wr = win_rates(&operations);
        assert_eq!(wr.total, Some(33.3));
        assert_eq!(wr.long, None);
        assert_eq!(wr.short, None);
    }

    #[test]
    fn test_win_rates_by_direction() {
        let operations = ops(json!([
            { "pnl": 10, "side": "long" },
            { "pnl": 20, "side": "Long position" },
            { "pnl": -5, "side": "LONG" },
            { "pnl": 15, "positionSide": "SHORT" },
            { "pnl": -5, "side": "short" },
            { "pnl": -8, "side": "SHORT" }
        ]));
        let wr = win_rates(&operations);
        assert_eq!(wr.total, Some(50.0));
        assert_eq!(wr.long, Some(66.7));
        assert_eq!(wr.short, Some(33.3));
    }

    #[test]
    fn test_zero_pnl_counts_as_trade_not_win() {
        let operations = ops(json!([
            { "pnl": 0, "side": "LONG" },
            { "pnl": 10, "side": "LONG" }
        ]));
        assert_eq!(win_rates(&operations).long, Some(50.0));
        // Zero pnl contributes no loss, so the factor stays undefined.
        assert_eq!(profit_factors(&operations).long, None);
    }

    #[test]
    fn test_malformed_pnl_coerces_to_zero() {
        let operations = ops(json!([
            { "pnl": "garbage", "side": "LONG" },
            { "pnl": null, "side": "LONG" },
            { "pnl": "-4", "side": "LONG" },
            { "pnl": "8.0", "side": "LONG" }
        ]));
        assert_eq!(profit_factors(&operations).long, Some(2.0));
        assert_eq!(win_rates(&operations).long, Some(25.0));
    }

    #[test]
    fn test_bounds_and_precision() {
        let operations = ops(json!([
            { "pnl": 1, "side": "LONG" },
            { "pnl": 1, "side": "LONG" },
            { "pnl": -3, "side": "SHORT" },
            { "pnl": 7.777, "side": "SHORT" },
            { "pnl": -0.001, "side": "LONG" },
            { "pnl": 2, "side": "LONG" }
        ]));
        let wr = win_rates(&operations);
        let pf = profit_factors(&operations);

        for rate in [wr.total, wr.long, wr.short].into_iter().flatten() {
            assert!((0.0..=100.0).contains(&rate));
            assert_eq!(rate, (rate * 10.0).round() / 10.0);
        }
        for factor in [pf.total, pf.long, pf.short].into_iter().flatten() {
            assert!(factor >= 0.0);
            assert_eq!(factor, (factor * 100.0).round() / 100.0);
        }
    }

    #[test]
    fn test_trade_metrics_bundle() {
        let operations = ops(json!([
            { "pnl": 100, "side": "LONG" },
            { "pnl": -50, "side": "LONG" }
        ]));
        let metrics = TradeMetrics::compute(&operations);
        assert_eq!(metrics.profit_factors.long, Some(2.0));
        assert_eq!(metrics.win_rates.long, Some(50.0));
        assert_eq!(metrics.win_rates.short, None);
    }
}
