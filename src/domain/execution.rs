//! Trade execution and fill simulation.
//!
//! Implements entry/exit fills with slippage, position sizing and
//! proportional commissions for a long-only, single-position account.

use chrono::NaiveDate;

use super::error::RankbtError;
use super::portfolio::Portfolio;
use super::position::{Position, Trade};

/// How much capital an entry commits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sizing {
    /// Fraction of current equity, in (0, 1].
    PercentOfEquity(f64),
    /// Fixed currency amount, capped at available cash.
    FixedAmount(f64),
}

impl Default for Sizing {
    fn default() -> Self {
        Sizing::PercentOfEquity(1.0)
    }
}

/// Simulation parameters. Rates are fractions (0.001 = 0.1%).
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub initial_capital: f64,
    pub commission_rate: f64,
    pub slippage_rate: f64,
    pub sizing: Sizing,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            initial_capital: 100_000.0,
            commission_rate: 0.001,
            slippage_rate: 0.001,
            sizing: Sizing::default(),
        }
    }
}

impl SimulationConfig {
    /// Defaults used when ranking a whole universe.
    pub fn batch_default() -> Self {
        SimulationConfig {
            initial_capital: 10_000.0,
            commission_rate: 0.0001,
            slippage_rate: 0.0001,
            sizing: Sizing::default(),
        }
    }

    pub fn validate(&self) -> Result<(), RankbtError> {
        let invalid = |reason: String| Err(RankbtError::InvalidSimulation { reason });

        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return invalid(format!(
                "initial_capital must be positive (got {})",
                self.initial_capital
            ));
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            return invalid(format!(
                "commission_rate must be in [0, 1) (got {})",
                self.commission_rate
            ));
        }
        if !(0.0..1.0).contains(&self.slippage_rate) {
            return invalid(format!(
                "slippage_rate must be in [0, 1) (got {})",
                self.slippage_rate
            ));
        }
        match self.sizing {
            Sizing::PercentOfEquity(pct) if !(pct > 0.0 && pct <= 1.0) => {
                invalid(format!("percent sizing must be in (0, 1] (got {pct})"))
            }
            Sizing::FixedAmount(amount) if !(amount.is_finite() && amount > 0.0) => {
                invalid(format!("fixed sizing must be positive (got {amount})"))
            }
            _ => Ok(()),
        }
    }
}

/// commission = trade_value * rate
pub fn calculate_commission(trade_value: f64, rate: f64) -> f64 {
    trade_value * rate
}

/// Buy fill: market_price * (1 + slippage)
pub fn apply_slippage_entry(market_price: f64, slippage_rate: f64) -> f64 {
    market_price * (1.0 + slippage_rate)
}

/// Sell fill: market_price * (1 - slippage)
pub fn apply_slippage_exit(market_price: f64, slippage_rate: f64) -> f64 {
    market_price * (1.0 - slippage_rate)
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        shares: f64,
        execution_price: f64,
        cost: f64,
        commission: f64,
    },
    AlreadyHolding,
    InsufficientCapital,
}

/// Enter a long position at bar `index`.
///
/// 1. Apply slippage to the close.
/// 2. Budget from the sizing policy (equity equals cash while flat).
/// 3. Units = budget / (fill * (1 + commission)), fractional.
/// 4. Deduct the whole budget: units at the fill price plus commission.
pub fn enter_long(
    portfolio: &mut Portfolio,
    index: usize,
    date: NaiveDate,
    market_price: f64,
    config: &SimulationConfig,
) -> EntryResult {
    if portfolio.position.is_some() {
        return EntryResult::AlreadyHolding;
    }

    let execution_price = apply_slippage_entry(market_price, config.slippage_rate);

    let budget = match config.sizing {
        Sizing::PercentOfEquity(pct) => portfolio.cash * pct,
        Sizing::FixedAmount(amount) => amount.min(portfolio.cash),
    };

    let shares = budget / (execution_price * (1.0 + config.commission_rate));
    if !(shares.is_finite() && shares > 0.0) {
        return EntryResult::InsufficientCapital;
    }

    let cost = shares * execution_price;
    let commission = budget - cost;

    portfolio.cash -= budget;
    portfolio.total_fees += commission;
    portfolio.position = Some(Position {
        entry_index: index,
        entry_date: date,
        entry_price: execution_price,
        shares,
        entry_cost: budget,
        entry_commission: commission,
    });

    EntryResult::Entered {
        shares,
        execution_price,
        cost,
        commission,
    }
}

/// Close the open position at bar `index`, recording and returning the trade.
pub fn exit_position(
    portfolio: &mut Portfolio,
    index: usize,
    date: NaiveDate,
    market_price: f64,
    config: &SimulationConfig,
) -> Option<Trade> {
    let position = portfolio.position.take()?;

    let exit_price = apply_slippage_exit(market_price, config.slippage_rate);
    let proceeds = position.shares * exit_price;
    let commission = calculate_commission(proceeds, config.commission_rate);
    let net_proceeds = proceeds - commission;

    portfolio.cash += net_proceeds;
    portfolio.total_fees += commission;

    let pnl = net_proceeds - position.entry_cost;
    let trade = Trade {
        entry_date: position.entry_date,
        exit_date: date,
        entry_price: position.entry_price,
        exit_price,
        shares: position.shares,
        pnl,
        return_pct: pnl / position.entry_cost,
        duration_bars: index - position.entry_index,
    };

    portfolio.record_trade(trade.clone());
    Some(trade)
}
