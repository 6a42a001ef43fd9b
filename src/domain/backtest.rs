//! Backtest result for one instrument.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::position::{OpenPosition, Trade};

/// One date-aligned sample of a result curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Everything a simulation produces for one instrument. Built once by the
/// simulator and only read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub instrument_id: String,
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub win_rate: f64,
    /// Closed round trips only.
    pub trade_count: usize,
    pub avg_holding_duration: f64,
    pub final_capital: f64,
    pub initial_capital: f64,
    pub equity_curve: Vec<CurvePoint>,
    pub drawdown_curve: Vec<CurvePoint>,
    pub cumulative_return_curve: Vec<CurvePoint>,
    pub trades: Vec<Trade>,
    pub open_position: Option<OpenPosition>,
    pub extended_stats: BTreeMap<String, f64>,
}

impl BacktestResult {
    pub fn stat(&self, name: &str) -> Option<f64> {
        self.extended_stats.get(name).copied()
    }

    pub fn has_open_position(&self) -> bool {
        self.open_position.is_some()
    }

    pub fn bar_count(&self) -> usize {
        self.equity_curve.len()
    }
}
