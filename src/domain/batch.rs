//! Batch orchestration: run the load → signal → simulate pipeline for every
//! instrument of a universe on a fixed pool of worker threads, isolate
//! per-instrument failures, then rank and summarise the survivors.
//!
//! Workers pull instrument ids from a bounded queue and push one
//! [`InstrumentOutcome`] each onto a result channel. The calling thread is
//! the only collector: it owns every counter and the results vector, emits
//! [`ProgressEvent`]s and performs the final ranking, so no locks are
//! involved. Completion order varies between runs; ranked order does not.

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};
use log::{debug, info, warn};

use super::backtest::BacktestResult;
use super::error::{ErrorKind, RankbtError};
use super::execution::SimulationConfig;
use super::price_history::{MIN_HISTORY_BARS, PriceHistory};
use super::ranking::{CrossSectionSummary, RankingMetric, rank};
use super::signal::{SignalConfig, generate};
use super::simulator::simulate;
use crate::ports::data_port::DataPort;
use crate::ports::progress_port::ProgressSink;

pub const DEFAULT_WORKER_LIMIT: usize = 50;
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

/// Immutable configuration shared by every worker of one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub signal: SignalConfig,
    pub simulation: SimulationConfig,
    pub min_history: usize,
    pub worker_limit: usize,
    pub progress_interval: usize,
    pub ranking_metric: RankingMetric,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            signal: SignalConfig::default(),
            simulation: SimulationConfig::batch_default(),
            min_history: MIN_HISTORY_BARS,
            worker_limit: DEFAULT_WORKER_LIMIT,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            ranking_metric: RankingMetric::default(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), RankbtError> {
        self.signal.validate()?;
        self.simulation.validate()?;
        if self.worker_limit == 0 {
            return Err(RankbtError::ConfigInvalid {
                section: "batch".into(),
                key: "worker_limit".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.progress_interval == 0 {
            return Err(RankbtError::ConfigInvalid {
                section: "batch".into(),
                key: "progress_interval".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Furthest point an instrument reached in the pipeline. The terminal
/// succeeded/failed state is the [`InstrumentOutcome`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentStage {
    Pending,
    Loaded,
    Signaled,
    Simulated,
}

impl fmt::Display for InstrumentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstrumentStage::Pending => "pending",
            InstrumentStage::Loaded => "loaded",
            InstrumentStage::Signaled => "signaled",
            InstrumentStage::Simulated => "simulated",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentFailure {
    pub instrument_id: String,
    /// Last stage reached before the failure.
    pub stage: InstrumentStage,
    pub kind: ErrorKind,
    pub reason: String,
}

impl InstrumentFailure {
    fn from_error(instrument_id: &str, stage: InstrumentStage, err: &RankbtError) -> Self {
        InstrumentFailure {
            instrument_id: instrument_id.to_string(),
            stage,
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum InstrumentOutcome {
    Succeeded(BacktestResult),
    Failed(InstrumentFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
    /// Instruments per second.
    pub throughput: f64,
    pub eta: Duration,
}

impl ProgressEvent {
    fn new(
        completed: usize,
        total: usize,
        succeeded: usize,
        failed: usize,
        elapsed: Duration,
    ) -> Self {
        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 { completed as f64 / secs } else { 0.0 };
        let remaining = total.saturating_sub(completed) as f64;
        let eta = if throughput > 0.0 {
            Duration::from_secs_f64(remaining / throughput)
        } else {
            Duration::ZERO
        };
        ProgressEvent {
            completed,
            total,
            succeeded,
            failed,
            elapsed,
            throughput,
            eta,
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Successful results, best first.
    pub ranked: Vec<BacktestResult>,
    pub succeeded: usize,
    pub failed: usize,
    /// Sorted by instrument id.
    pub failures: Vec<InstrumentFailure>,
    pub summary: CrossSectionSummary,
    pub ranking_metric: RankingMetric,
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn top(&self, n: usize) -> &[BacktestResult] {
        &self.ranked[..n.min(self.ranked.len())]
    }

    /// The last `n` ranked results, still in ranked order.
    pub fn bottom(&self, n: usize) -> &[BacktestResult] {
        &self.ranked[self.ranked.len().saturating_sub(n)..]
    }

    pub fn instruments_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total() as f64 / secs
        } else {
            0.0
        }
    }
}

/// Backtest every instrument in `instruments` and rank the successes.
///
/// Never fails as a whole: each instrument that cannot be loaded, validated,
/// signalled or simulated (including one whose pipeline panics) is recorded
/// in [`BatchResult::failures`] and the rest of the batch carries on.
pub fn run_batch(
    data_port: &dyn DataPort,
    instruments: &[String],
    config: &BatchConfig,
    progress: &dyn ProgressSink,
) -> BatchResult {
    let start = Instant::now();
    let total = instruments.len();
    let num_workers = config.worker_limit.max(1).min(total.max(1));
    let interval = config.progress_interval.max(1);

    info!(
        "Backtesting {} instruments with {} workers ({} signals, ranked by {})",
        total,
        num_workers,
        config.signal.name(),
        config.ranking_metric
    );

    let mut results: Vec<BacktestResult> = Vec::with_capacity(total);
    let mut failures: Vec<InstrumentFailure> = Vec::new();

    if total > 0 {
        let (task_tx, task_rx): (Sender<&str>, Receiver<&str>) = bounded(total);
        let (result_tx, result_rx): (Sender<InstrumentOutcome>, Receiver<InstrumentOutcome>) =
            bounded(total);

        thread::scope(|scope| {
            for _ in 0..num_workers {
                let rx = task_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    while let Ok(instrument_id) = rx.recv() {
                        let outcome = run_instrument(data_port, instrument_id, config);
                        if result_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            for id in instruments {
                // Capacity equals the instrument count, so this never blocks.
                if task_tx.send(id.as_str()).is_err() {
                    break;
                }
            }
            drop(task_tx);

            let mut completed = 0usize;
            while let Ok(outcome) = result_rx.recv() {
                completed += 1;
                match outcome {
                    InstrumentOutcome::Succeeded(result) => {
                        debug!(
                            "{}: total return {:.4}, sharpe {:.4}, {} trades",
                            result.instrument_id,
                            result.total_return,
                            result.sharpe_ratio,
                            result.trade_count
                        );
                        results.push(result);
                    }
                    InstrumentOutcome::Failed(failure) => {
                        warn!(
                            "Backtest failed for {} at stage {} ({}): {}",
                            failure.instrument_id, failure.stage, failure.kind, failure.reason
                        );
                        failures.push(failure);
                    }
                }

                if completed % interval == 0 || completed == total {
                    progress.on_progress(&ProgressEvent::new(
                        completed,
                        total,
                        results.len(),
                        failures.len(),
                        start.elapsed(),
                    ));
                }
            }
        });
    }

    rank(&mut results, config.ranking_metric);
    failures.sort_by(|a, b| a.instrument_id.cmp(&b.instrument_id));
    let summary = CrossSectionSummary::compute(&results);
    let elapsed = start.elapsed();

    info!(
        "Batch finished in {:.2}s: {} succeeded, {} failed",
        elapsed.as_secs_f64(),
        results.len(),
        failures.len()
    );

    BatchResult {
        succeeded: results.len(),
        failed: failures.len(),
        ranked: results,
        failures,
        summary,
        ranking_metric: config.ranking_metric,
        elapsed,
    }
}

/// Full pipeline for one instrument with panics converted into failures.
pub fn run_instrument(
    data_port: &dyn DataPort,
    instrument_id: &str,
    config: &BatchConfig,
) -> InstrumentOutcome {
    let stage = Cell::new(InstrumentStage::Pending);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        backtest_instrument(data_port, instrument_id, config, &stage)
    }));

    match outcome {
        Ok(Ok(result)) => InstrumentOutcome::Succeeded(result),
        Ok(Err(err)) => InstrumentOutcome::Failed(InstrumentFailure::from_error(
            instrument_id,
            stage.get(),
            &err,
        )),
        Err(payload) => {
            let err = RankbtError::WorkerPanic {
                instrument: instrument_id.to_string(),
                reason: panic_message(payload.as_ref()),
            };
            InstrumentOutcome::Failed(InstrumentFailure::from_error(
                instrument_id,
                stage.get(),
                &err,
            ))
        }
    }
}

fn backtest_instrument(
    data_port: &dyn DataPort,
    instrument_id: &str,
    config: &BatchConfig,
    stage: &Cell<InstrumentStage>,
) -> Result<BacktestResult, RankbtError> {
    let bars = data_port.fetch_ohlcv(instrument_id)?;
    let history = PriceHistory::new(instrument_id, bars, config.min_history)?;
    stage.set(InstrumentStage::Loaded);
    debug!(
        "{}: loaded {} bars {}..{}",
        instrument_id,
        history.len(),
        history.first_date(),
        history.last_date()
    );

    let signals = generate(&history, &config.signal)?;
    stage.set(InstrumentStage::Signaled);

    let result = simulate(&history, &signals, &config.simulation)?;
    stage.set(InstrumentStage::Simulated);
    Ok(result)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
