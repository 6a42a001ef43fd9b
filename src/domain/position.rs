//! Open position and closed trade records.

use chrono::NaiveDate;

/// The single long position a simulation may hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_index: usize,
    pub entry_date: NaiveDate,
    /// Fill price after slippage.
    pub entry_price: f64,
    pub shares: f64,
    /// Cash spent on entry: units at the fill price plus commission.
    pub entry_cost: f64,
    pub entry_commission: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.market_value(price) - self.entry_cost
    }
}

/// A closed round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: f64,
    /// Net of both commissions.
    pub pnl: f64,
    /// `pnl / entry_cost`.
    pub return_pct: f64,
    pub duration_bars: usize,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

/// A position still open when the data ends, marked to the last close.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
}

impl OpenPosition {
    pub fn mark(position: &Position, last_close: f64) -> Self {
        OpenPosition {
            entry_date: position.entry_date,
            entry_price: position.entry_price,
            shares: position.shares,
            market_value: position.market_value(last_close),
            unrealized_pnl: position.unrealized_pnl(last_close),
        }
    }
}
