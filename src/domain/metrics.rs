//! Performance metrics and statistics.
//!
//! Ratios are plain fractions (0.05 = 5%). Drawdowns are negative fractions.

use super::position::Trade;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub best_trade_return: f64,
    pub worst_trade_return: f64,
    pub avg_holding_duration: f64,
}

impl Metrics {
    pub fn compute(equity: &[f64], trades: &[Trade], initial_capital: f64) -> Self {
        let final_equity = equity.last().copied().unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            final_equity / initial_capital - 1.0
        } else {
            0.0
        };

        let annualized_return = annualize(total_return, equity.len());
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity);
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity);

        let calmar_ratio = if max_drawdown < 0.0 {
            annualized_return / max_drawdown.abs()
        } else {
            0.0
        };

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut total_duration = 0usize;

        for trade in trades {
            if trade.is_win() {
                trades_won += 1;
                total_wins += trade.pnl;
            } else if trade.pnl < 0.0 {
                trades_lost += 1;
                total_losses += trade.pnl.abs();
            } else {
                trades_breakeven += 1;
            }
            total_duration += trade.duration_bars;
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let avg_holding_duration = if total_trades > 0 {
            total_duration as f64 / total_trades as f64
        } else {
            0.0
        };

        let best_trade_return = trades
            .iter()
            .map(|t| t.return_pct)
            .reduce(f64::max)
            .unwrap_or(0.0);
        let worst_trade_return = trades
            .iter()
            .map(|t| t.return_pct)
            .reduce(f64::min)
            .unwrap_or(0.0);

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            max_drawdown,
            max_drawdown_duration,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            best_trade_return,
            worst_trade_return,
            avg_holding_duration,
        }
    }
}

/// Compound `total_return` over `bars` trading days to an annual rate.
pub fn annualize(total_return: f64, bars: usize) -> f64 {
    if bars == 0 || !total_return.is_finite() {
        return 0.0;
    }
    if total_return <= -1.0 {
        return -1.0;
    }
    let years = bars as f64 / TRADING_DAYS_PER_YEAR;
    (1.0 + total_return).powf(1.0 / years) - 1.0
}

/// `equity[t] / running_max - 1` for every bar; each value is `<= 0`.
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&value| {
            peak = peak.max(value);
            if peak > 0.0 {
                (value / peak - 1.0).min(0.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// Deepest drawdown (negative fraction) and the longest run of bars spent
/// below a prior peak.
fn compute_drawdown(equity: &[f64]) -> (f64, usize) {
    let series = drawdown_series(equity);
    let max_dd = series.iter().copied().fold(0.0_f64, f64::min);

    let mut longest = 0usize;
    let mut current = 0usize;
    for &dd in &series {
        if dd < 0.0 {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }

    (max_dd, longest)
}

fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Annualized Sharpe and Sortino ratios of bar-to-bar returns. Sharpe uses
/// the sample standard deviation; both are 0 when the deviation is 0.
fn compute_risk_adjusted(equity: &[f64]) -> (f64, f64) {
    let returns = period_returns(equity);
    if returns.len() < 2 {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();

    let sharpe = if stddev > 0.0 {
        mean / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside_variance = returns.iter().map(|r| r.min(0.0).powi(2)).sum::<f64>() / n;
    let downside_stddev = downside_variance.sqrt();

    let sortino = if downside_stddev > 0.0 {
        mean / downside_stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn make_trade(pnl: f64, duration_bars: usize) -> Trade {
        let entry_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Trade {
            entry_date,
            exit_date: entry_date + chrono::Duration::days(duration_bars as i64),
            entry_price: 100.0,
            exit_price: 100.0 + pnl / 100.0,
            shares: 100.0,
            pnl,
            return_pct: pnl / 10_000.0,
            duration_bars,
        }
    }

    #[test]
    fn metrics_empty_curve() {
        let metrics = Metrics::compute(&[], &[], 100_000.0);
        assert_eq!(metrics.total_return, 0.0);
        assert_eq!(metrics.annualized_return, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
    }

    #[test]
    fn metrics_total_return() {
        let up = Metrics::compute(&[100_000.0, 110_000.0], &[], 100_000.0);
        assert_abs_diff_eq!(up.total_return, 0.10, epsilon = 1e-9);

        let down = Metrics::compute(&[100_000.0, 90_000.0], &[], 100_000.0);
        assert_abs_diff_eq!(down.total_return, -0.10, epsilon = 1e-9);
    }

    #[test]
    fn annualized_return_over_one_year_equals_total() {
        assert_abs_diff_eq!(annualize(0.10, 252), 0.10, epsilon = 1e-12);
    }

    #[test]
    fn annualized_return_compounds() {
        // Two years at 21% total is 10% a year.
        assert_abs_diff_eq!(annualize(0.21, 504), 0.10, epsilon = 1e-9);
    }

    #[test]
    fn annualized_return_wiped_out() {
        assert_eq!(annualize(-1.0, 300), -1.0);
        assert_eq!(annualize(0.5, 0), 0.0);
    }

    #[test]
    fn max_drawdown_is_negative_fraction() {
        let equity = [100.0, 110.0, 90.0, 95.0, 80.0, 100.0];
        let (dd, _) = compute_drawdown(&equity);
        assert_abs_diff_eq!(dd, 80.0 / 110.0 - 1.0, epsilon = 1e-12);
        assert!(dd <= 0.0);
    }

    #[test]
    fn max_drawdown_duration_counts_bars_below_peak() {
        let equity = [100.0, 110.0, 100.0, 90.0, 85.0, 95.0, 111.0, 105.0];
        let (_, duration) = compute_drawdown(&equity);
        assert_eq!(duration, 4);
    }

    #[test]
    fn drawdown_series_never_positive() {
        let series = drawdown_series(&[100.0, 120.0, 60.0, 130.0]);
        assert_eq!(series.len(), 4);
        assert_eq!(series[0], 0.0);
        assert_eq!(series[1], 0.0);
        assert_abs_diff_eq!(series[2], -0.5, epsilon = 1e-12);
        assert_eq!(series[3], 0.0);
    }

    #[test]
    fn sharpe_zero_variance_guard() {
        let metrics = Metrics::compute(&[10_000.0; 300], &[], 10_000.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.sortino_ratio, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
    }

    #[test]
    fn sharpe_matches_hand_computation() {
        let equity = [100.0, 101.0, 100.0, 102.0];
        let returns = [0.01, 100.0 / 101.0 - 1.0, 0.02];
        let mean = returns.iter().sum::<f64>() / 3.0;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 2.0;
        let expected = mean / var.sqrt() * 252.0_f64.sqrt();

        let (sharpe, sortino) = compute_risk_adjusted(&equity);
        assert_abs_diff_eq!(sharpe, expected, epsilon = 1e-9);
        assert!(sortino.is_finite());
    }

    #[test]
    fn trade_statistics() {
        let trades = vec![
            make_trade(100.0, 5),
            make_trade(-50.0, 10),
            make_trade(200.0, 15),
            make_trade(0.0, 2),
        ];
        let metrics = Metrics::compute(&[10_000.0, 10_250.0], &trades, 10_000.0);

        assert_eq!(metrics.trades_won, 2);
        assert_eq!(metrics.trades_lost, 1);
        assert_eq!(metrics.trades_breakeven, 1);
        assert_abs_diff_eq!(metrics.win_rate, 0.5);
        assert_abs_diff_eq!(metrics.profit_factor, 6.0, epsilon = 1e-9);
        assert_abs_diff_eq!(metrics.avg_win, 150.0, epsilon = 1e-9);
        assert_abs_diff_eq!(metrics.avg_loss, 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(metrics.avg_holding_duration, 8.0, epsilon = 1e-9);
        assert_abs_diff_eq!(metrics.best_trade_return, 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.worst_trade_return, -0.005, epsilon = 1e-12);
    }

    #[test]
    fn no_trades_yields_zero_trade_stats() {
        let metrics = Metrics::compute(&[10_000.0, 11_000.0], &[], 10_000.0);
        assert_eq!(metrics.win_rate, 0.0);
        assert_eq!(metrics.profit_factor, 0.0);
        assert_eq!(metrics.avg_holding_duration, 0.0);
        assert_eq!(metrics.best_trade_return, 0.0);
    }

    #[test]
    fn profit_factor_without_losses_is_infinite() {
        let metrics = Metrics::compute(&[1.0, 2.0], &[make_trade(10.0, 1)], 1.0);
        assert!(metrics.profit_factor.is_infinite());
    }

    #[test]
    fn calmar_uses_drawdown_magnitude() {
        let mut equity = vec![100.0; 252];
        equity[100] = 50.0;
        equity[251] = 110.0;
        let metrics = Metrics::compute(&equity, &[], 100.0);
        assert_abs_diff_eq!(metrics.max_drawdown, -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.calmar_ratio, metrics.annualized_return / 0.5, epsilon = 1e-12);
    }
}
