//! Plain-text batch summary for the terminal.

use std::io::{self, Write};

use crate::domain::backtest::BacktestResult;
use crate::domain::batch::BatchResult;

const RULE_WIDTH: usize = 80;

pub struct ConsoleReport {
    pub top: usize,
    pub bottom: usize,
}

impl Default for ConsoleReport {
    fn default() -> Self {
        Self { top: 20, bottom: 10 }
    }
}

impl ConsoleReport {
    pub fn render<W: Write>(&self, out: &mut W, result: &BatchResult) -> io::Result<()> {
        let rule = "=".repeat(RULE_WIDTH);
        let thin = "-".repeat(RULE_WIDTH);
        let secs = result.elapsed.as_secs_f64();

        writeln!(out, "{rule}")?;
        writeln!(out, "Batch backtest complete")?;
        writeln!(out, "Elapsed:    {:.1} min ({:.0} s)", secs / 60.0, secs)?;
        writeln!(out, "Succeeded:  {}", result.succeeded)?;
        writeln!(out, "Failed:     {}", result.failed)?;
        writeln!(out, "Speed:      {:.1} instruments/s", result.instruments_per_second())?;

        if result.ranked.is_empty() {
            writeln!(out, "\nNo successful backtests.")?;
            return Ok(());
        }

        writeln!(
            out,
            "\nTop {} by {}:",
            self.top.min(result.ranked.len()),
            result.ranking_metric
        )?;
        writeln!(out, "{thin}")?;
        for r in result.top(self.top) {
            write_row(out, r)?;
        }

        writeln!(out, "\nBottom {}:", self.bottom.min(result.ranked.len()))?;
        writeln!(out, "{thin}")?;
        for r in result.bottom(self.bottom) {
            write_row(out, r)?;
        }

        let s = &result.summary;
        writeln!(out, "\nAggregate statistics:")?;
        writeln!(out, "Mean return:        {:.2}%", s.mean_return * 100.0)?;
        writeln!(out, "Median return:      {:.2}%", s.median_return * 100.0)?;
        writeln!(
            out,
            "Positive:           {} ({:.1}%)",
            s.positive_count,
            s.positive_pct * 100.0
        )?;
        writeln!(
            out,
            "Negative:           {} ({:.1}%)",
            s.negative_count,
            s.negative_pct * 100.0
        )?;
        writeln!(out, "Mean Sharpe:        {:.2}", s.mean_sharpe)?;
        writeln!(out, "Mean max drawdown:  {:.2}%", s.mean_max_drawdown * 100.0)?;
        writeln!(out, "Mean trades:        {:.1}", s.mean_trade_count)?;
        writeln!(out, "Mean win rate:      {:.1}%", s.mean_win_rate * 100.0)?;

        writeln!(out, "\nReturn distribution:")?;
        for bucket in &s.histogram {
            writeln!(
                out,
                "  {:>12}: {:>6} ({:.1}%)",
                bucket.bucket.label(),
                bucket.count,
                bucket.pct * 100.0
            )?;
        }
        writeln!(out, "{rule}")
    }

    /// Metrics, trade list and extended statistics for one instrument.
    pub fn render_backtest<W: Write>(out: &mut W, r: &BacktestResult) -> io::Result<()> {
        writeln!(out, "=== {} ===", r.instrument_id)?;
        writeln!(out, "Bars:             {}", r.bar_count())?;
        writeln!(out, "Total Return:     {:.2}%", r.total_return * 100.0)?;
        writeln!(out, "Annualized:       {:.2}%", r.annualized_return * 100.0)?;
        writeln!(out, "Sharpe Ratio:     {:.2}", r.sharpe_ratio)?;
        writeln!(out, "Max Drawdown:     {:.2}%", r.max_drawdown * 100.0)?;
        writeln!(out, "Trades:           {}", r.trade_count)?;
        writeln!(out, "Win Rate:         {:.1}%", r.win_rate * 100.0)?;
        writeln!(out, "Avg Holding:      {:.1} bars", r.avg_holding_duration)?;
        writeln!(out, "Final Capital:    {:.2}", r.final_capital)?;

        if !r.trades.is_empty() {
            writeln!(out, "\nTrades:")?;
            for t in &r.trades {
                writeln!(
                    out,
                    "  {} -> {}  {:>10.4} -> {:<10.4} pnl {:>12.2} ({:>7.2}%) {:>4} bars",
                    t.entry_date,
                    t.exit_date,
                    t.entry_price,
                    t.exit_price,
                    t.pnl,
                    t.return_pct * 100.0,
                    t.duration_bars
                )?;
            }
        }

        if let Some(open) = &r.open_position {
            writeln!(
                out,
                "\nOpen position since {}: {:.4} shares @ {:.4}, unrealized {:.2}",
                open.entry_date, open.shares, open.entry_price, open.unrealized_pnl
            )?;
        }

        writeln!(out, "\nExtended statistics:")?;
        for (name, value) in &r.extended_stats {
            writeln!(out, "  {:<22} {:.4}", name, value)?;
        }
        Ok(())
    }
}

fn write_row<W: Write>(out: &mut W, r: &BacktestResult) -> io::Result<()> {
    writeln!(
        out,
        "{:12} | return {:>8.2}% | sharpe {:>6.2} | max dd {:>7.2}% | trades {:>4}",
        r.instrument_id,
        r.total_return * 100.0,
        r.sharpe_ratio,
        r.max_drawdown * 100.0,
        r.trade_count
    )
}
