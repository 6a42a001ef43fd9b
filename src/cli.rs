//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::console_report::ConsoleReport;
use crate::adapters::csv_adapter::{CsvAdapter, read_ohlcv_file};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_progress::LogProgressSink;
use crate::domain::backtest::BacktestResult;
use crate::domain::batch::{BatchConfig, run_batch};
use crate::domain::config::{
    RunSettings, build_batch_config, build_run_settings, build_single_config,
};
use crate::domain::error::RankbtError;
use crate::domain::execution::Sizing;
use crate::domain::price_history::PriceHistory;
use crate::domain::signal::{SignalConfig, generate};
use crate::domain::simulator::simulate;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "rankbt", about = "Batch moving-average backtester and ranker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest every instrument in a data directory and rank the results
    Batch {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Output directory, or a file path ending in .csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        workers: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        rank_by: Option<String>,
    },
    /// Backtest a single instrument CSV file
    Backtest {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct BatchOverrides {
    pub data_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub workers: Option<usize>,
    pub limit: Option<usize>,
    pub rank_by: Option<String>,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Batch {
            config,
            data_dir,
            output,
            workers,
            limit,
            rank_by,
        } => run_batch_command(
            config.as_ref(),
            BatchOverrides {
                data_dir,
                output,
                workers,
                limit,
                rank_by,
            },
        ),
        Command::Backtest { file, config } => run_single_backtest(&file, config.as_ref()),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, ExitCode> {
    let Some(path) = path else {
        return Ok(FileConfigAdapter::empty());
    };
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Builds the batch configuration and run settings, then applies overrides.
pub fn resolve_batch(
    config: &dyn ConfigPort,
    overrides: &BatchOverrides,
) -> Result<(BatchConfig, RunSettings), RankbtError> {
    let mut batch = build_batch_config(config)?;
    let mut settings = build_run_settings(config)?;

    if let Some(workers) = overrides.workers {
        batch.worker_limit = workers;
    }
    if let Some(metric) = &overrides.rank_by {
        batch.ranking_metric = metric.parse()?;
    }
    if let Some(limit) = overrides.limit {
        if limit == 0 {
            return Err(RankbtError::ConfigInvalid {
                section: "batch".into(),
                key: "limit".into(),
                reason: "must be at least 1".into(),
            });
        }
        settings.limit = Some(limit);
    }
    if let Some(dir) = &overrides.data_dir {
        settings.data_dir = Some(dir.clone());
    }
    if let Some(output) = &overrides.output {
        settings.output_dir = Some(output.clone());
    }

    batch.validate()?;
    Ok((batch, settings))
}

/// Sorted instrument ids from the source, truncated to `limit`.
pub fn select_instruments(
    data_port: &dyn DataPort,
    limit: Option<usize>,
) -> Result<Vec<String>, RankbtError> {
    let mut instruments = data_port.list_instruments()?;
    if let Some(limit) = limit {
        instruments.truncate(limit);
    }
    Ok(instruments)
}

/// An output ending in `.csv` names the file; anything else is a directory.
pub fn report_adapter(output: Option<&Path>) -> CsvReportAdapter {
    match output {
        Some(path) if path.extension().is_some_and(|ext| ext == "csv") => {
            CsvReportAdapter::to_file(path)
        }
        Some(dir) => CsvReportAdapter::in_dir(dir),
        None => CsvReportAdapter::in_dir("."),
    }
}

fn run_batch_command(config_path: Option<&PathBuf>, overrides: BatchOverrides) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let (batch, settings) = match resolve_batch(&adapter, &overrides) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let Some(data_dir) = settings.data_dir.clone() else {
        let e = RankbtError::ConfigMissing {
            section: "batch".into(),
            key: "data_dir".into(),
        };
        eprintln!("error: {e} (or pass --data-dir)");
        return (&e).into();
    };

    let data_port = CsvAdapter::new(data_dir.clone());
    let instruments = match select_instruments(&data_port, settings.limit) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Data directory:   {}", data_dir.display());
    eprintln!("Instruments:      {}", instruments.len());
    print_parameters(&batch);

    let result = run_batch(&data_port, &instruments, &batch, &LogProgressSink);

    let mut stdout = io::stdout().lock();
    if let Err(e) = ConsoleReport::default().render(&mut stdout, &result) {
        let e = RankbtError::from(e);
        eprintln!("error: {e}");
        return (&e).into();
    }

    match report_adapter(settings.output_dir.as_deref()).write(&result) {
        Ok(path) => {
            eprintln!("\nResults written to: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to write results: {e}");
            (&e).into()
        }
    }
}

/// Load, signal and simulate one CSV file. The instrument id is the file stem.
pub fn backtest_file(file: &Path, batch: &BatchConfig) -> Result<BacktestResult, RankbtError> {
    let instrument_id = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let bars = read_ohlcv_file(file, &instrument_id)?;
    let history = PriceHistory::new(instrument_id, bars, batch.min_history)?;
    let signals = generate(&history, &batch.signal)?;
    simulate(&history, &signals, &batch.simulation)
}

fn run_single_backtest(file: &Path, config_path: Option<&PathBuf>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let batch = match build_single_config(&adapter) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Backtesting {}", file.display());
    print_parameters(&batch);

    let result = match backtest_file(file, &batch) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let mut stdout = io::stdout().lock();
    match ConsoleReport::render_backtest(&mut stdout, &result).and_then(|_| stdout.flush()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let e = RankbtError::from(e);
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(Some(config_path)) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let (batch, settings) = match resolve_batch(&adapter, &BatchOverrides::default()) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    print_parameters(&batch);
    eprintln!("  min history:      {}", batch.min_history);
    eprintln!("  progress every:   {}", batch.progress_interval);
    if let Some(dir) = &settings.data_dir {
        eprintln!("  data dir:         {}", dir.display());
    }
    if let Some(dir) = &settings.output_dir {
        eprintln!("  output:           {}", dir.display());
    }
    if let Some(limit) = settings.limit {
        eprintln!("  limit:            {}", limit);
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn print_parameters(batch: &BatchConfig) {
    let sim = &batch.simulation;
    eprintln!("Parameters:");
    eprintln!("  initial capital:  {:.2}", sim.initial_capital);
    eprintln!("  commission rate:  {:.4}%", sim.commission_rate * 100.0);
    eprintln!("  slippage rate:    {:.4}%", sim.slippage_rate * 100.0);
    match sim.sizing {
        Sizing::PercentOfEquity(pct) => eprintln!("  sizing:           {:.0}% of equity", pct * 100.0),
        Sizing::FixedAmount(amount) => eprintln!("  sizing:           {:.2} per entry", amount),
    }
    let (short, long) = batch.signal.windows();
    match &batch.signal {
        SignalConfig::Crossover { .. } => {
            eprintln!("  strategy:         crossover MA({short}/{long})");
        }
        SignalConfig::LowFrequency(p) => {
            eprintln!(
                "  strategy:         low_frequency MA({short}/{long}), hold >= {} bars",
                p.min_holding_days
            );
            eprintln!(
                "  filters:          trend > {:.2}%, price {:.2}..{:.2}, volume > {:.2}x{}",
                p.price_threshold * 100.0,
                p.price_range.0,
                p.price_range.1,
                p.volume_threshold,
                if p.require_volume { " (required)" } else { "" }
            );
        }
    }
    eprintln!("  workers:          {}", batch.worker_limit);
    eprintln!("  ranked by:        {}", batch.ranking_metric);
}
