//! Ranked results table as CSV.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::batch::BatchResult;
use crate::domain::error::RankbtError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    instrument_id: &'a str,
    total_return: f64,
    annualized_return: f64,
    max_drawdown: f64,
    sharpe_ratio: f64,
    trade_count: usize,
    win_rate: f64,
    final_capital: f64,
}

impl<'a> From<&'a BacktestResult> for ResultRow<'a> {
    fn from(r: &'a BacktestResult) -> Self {
        ResultRow {
            instrument_id: &r.instrument_id,
            total_return: r.total_return,
            annualized_return: r.annualized_return,
            max_drawdown: r.max_drawdown,
            sharpe_ratio: r.sharpe_ratio,
            trade_count: r.trade_count,
            win_rate: r.win_rate,
            final_capital: r.final_capital,
        }
    }
}

enum Target {
    /// `backtest_results_<YYYYmmdd_HHMMSS>.csv` inside this directory.
    Directory(PathBuf),
    File(PathBuf),
}

pub struct CsvReportAdapter {
    target: Target,
}

impl CsvReportAdapter {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::Directory(dir.into()),
        }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File(path.into()),
        }
    }

    fn resolve_path(&self) -> PathBuf {
        match &self.target {
            Target::Directory(dir) => {
                let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
                dir.join(format!("backtest_results_{stamp}.csv"))
            }
            Target::File(path) => path.clone(),
        }
    }
}

/// Writes ranked rows, best first, with a header.
pub fn write_ranked<W: Write>(writer: W, results: &[BacktestResult]) -> Result<(), RankbtError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in results {
        wtr.serialize(ResultRow::from(r))?;
    }
    if results.is_empty() {
        wtr.write_record([
            "instrument_id",
            "total_return",
            "annualized_return",
            "max_drawdown",
            "sharpe_ratio",
            "trade_count",
            "win_rate",
            "final_capital",
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BatchResult) -> Result<PathBuf, RankbtError> {
        let path = self.resolve_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(&path)?;
        write_ranked(file, &result.ranked)?;
        log::info!("Wrote {} ranked results to {}", result.ranked.len(), path.display());
        Ok(path)
    }
}
