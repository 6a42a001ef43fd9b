//! Portfolio state and equity tracking for a single-instrument simulation.

use chrono::NaiveDate;

use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub position: Option<Position>,
    pub closed_trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub total_fees: f64,
    /// Bars on which a position was held at the close.
    pub bars_in_market: usize,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            position: None,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
            total_fees: 0.0,
            bars_in_market: 0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.closed_trades.push(trade);
    }

    /// Cash plus the open position marked at `close`.
    pub fn total_equity(&self, close: f64) -> f64 {
        let position_value = self
            .position
            .as_ref()
            .map_or(0.0, |pos| pos.market_value(close));
        self.cash + position_value
    }

    pub fn record_equity(&mut self, date: NaiveDate, close: f64) {
        if self.position.is_some() {
            self.bars_in_market += 1;
        }
        let equity = self.total_equity(close);
        self.equity_curve.push(EquityPoint { date, equity });
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }
}
