//! Single-instrument portfolio simulation.
//!
//! Replays a [`SignalSeries`] against a [`PriceHistory`] bar by bar: an entry
//! while flat opens a position at the slipped close, an exit while holding
//! closes it, and equity is marked at every close. A position still open at
//! the last bar is valued at the final close and reported as
//! [`BacktestResult::open_position`], not as a closed trade.

use std::collections::BTreeMap;

use super::backtest::{BacktestResult, CurvePoint};
use super::error::RankbtError;
use super::execution::{EntryResult, SimulationConfig, enter_long, exit_position};
use super::metrics::{Metrics, drawdown_series};
use super::portfolio::Portfolio;
use super::position::OpenPosition;
use super::price_history::PriceHistory;
use super::signal::SignalSeries;

pub fn simulate(
    history: &PriceHistory,
    signals: &SignalSeries,
    config: &SimulationConfig,
) -> Result<BacktestResult, RankbtError> {
    config.validate()?;

    if signals.entries.len() != history.len() || signals.exits.len() != history.len() {
        return Err(RankbtError::InvalidSignals {
            reason: format!(
                "{}: signal length {}/{} does not match {} bars",
                history.instrument_id(),
                signals.entries.len(),
                signals.exits.len(),
                history.len()
            ),
        });
    }

    let mut portfolio = Portfolio::new(config.initial_capital);

    for (i, bar) in history.bars().iter().enumerate() {
        if portfolio.is_flat() {
            if signals.entries[i] {
                match enter_long(&mut portfolio, i, bar.date, bar.close, config) {
                    EntryResult::Entered { .. } | EntryResult::AlreadyHolding => {}
                    EntryResult::InsufficientCapital => log::debug!(
                        "{}: entry on {} skipped, insufficient capital",
                        history.instrument_id(),
                        bar.date
                    ),
                }
            }
        } else if signals.exits[i] {
            exit_position(&mut portfolio, i, bar.date, bar.close, config);
        }
        portfolio.record_equity(bar.date, bar.close);
    }

    Ok(build_result(history, portfolio))
}

fn build_result(history: &PriceHistory, portfolio: Portfolio) -> BacktestResult {
    let initial_capital = portfolio.initial_capital;
    let equity: Vec<f64> = portfolio.equity_curve.iter().map(|p| p.equity).collect();
    let metrics = Metrics::compute(&equity, &portfolio.closed_trades, initial_capital);
    let final_capital = portfolio.final_equity();

    let equity_curve: Vec<CurvePoint> = portfolio
        .equity_curve
        .iter()
        .map(|p| CurvePoint {
            date: p.date,
            value: p.equity,
        })
        .collect();

    let drawdown_curve = equity_curve
        .iter()
        .zip(drawdown_series(&equity))
        .map(|(p, dd)| CurvePoint {
            date: p.date,
            value: dd,
        })
        .collect();

    let cumulative_return_curve = equity_curve
        .iter()
        .map(|p| CurvePoint {
            date: p.date,
            value: p.value / initial_capital - 1.0,
        })
        .collect();

    let last_close = history.bars().last().map_or(0.0, |b| b.close);
    let open_position = portfolio
        .position
        .as_ref()
        .map(|pos| OpenPosition::mark(pos, last_close));

    let closes = history.closes();
    let benchmark_return = match (closes.first(), closes.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => last / first - 1.0,
        _ => 0.0,
    };

    let bars = equity.len().max(1) as f64;
    let open_trade_count = usize::from(open_position.is_some());

    let extended_stats = BTreeMap::from([
        ("start_value".to_string(), initial_capital),
        ("end_value".to_string(), final_capital),
        ("total_fees_paid".to_string(), portfolio.total_fees),
        ("benchmark_return".to_string(), benchmark_return),
        (
            "max_drawdown_duration".to_string(),
            metrics.max_drawdown_duration as f64,
        ),
        ("sortino_ratio".to_string(), metrics.sortino_ratio),
        ("calmar_ratio".to_string(), metrics.calmar_ratio),
        ("profit_factor".to_string(), metrics.profit_factor),
        ("best_trade_return".to_string(), metrics.best_trade_return),
        ("worst_trade_return".to_string(), metrics.worst_trade_return),
        ("avg_win".to_string(), metrics.avg_win),
        ("avg_loss".to_string(), metrics.avg_loss),
        (
            "exposure".to_string(),
            portfolio.bars_in_market as f64 / bars,
        ),
        ("open_trade_count".to_string(), open_trade_count as f64),
        (
            "total_trades".to_string(),
            (portfolio.closed_trades.len() + open_trade_count) as f64,
        ),
    ]);

    BacktestResult {
        instrument_id: history.instrument_id().to_string(),
        total_return: metrics.total_return,
        annualized_return: metrics.annualized_return,
        max_drawdown: metrics.max_drawdown,
        sharpe_ratio: metrics.sharpe_ratio,
        win_rate: metrics.win_rate,
        trade_count: portfolio.closed_trades.len(),
        avg_holding_duration: metrics.avg_holding_duration,
        final_capital,
        initial_capital,
        equity_curve,
        drawdown_curve,
        cumulative_return_curve,
        trades: portfolio.closed_trades,
        open_position,
        extended_stats,
    }
}
