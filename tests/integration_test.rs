//! Integration tests for the batch pipeline.
//!
//! Tests cover:
//! - Failure isolation: duplicate dates, short histories, source errors
//! - Deterministic ranking across runs and worker counts
//! - Progress reporting cadence
//! - Low-frequency volume filter with and without volume data
//! - Single-instrument pipeline scenarios (flat series, open position at end)

mod common;

use common::*;
use rankbt::domain::batch::{BatchConfig, InstrumentStage, ProgressEvent, run_batch};
use rankbt::domain::error::{ErrorKind, RankbtError};
use rankbt::domain::execution::SimulationConfig;
use rankbt::domain::price_history::PriceHistory;
use rankbt::domain::ranking::RankingMetric;
use rankbt::domain::signal::{LowFrequencyParams, SignalConfig, generate};
use rankbt::domain::simulator::simulate;
use rankbt::ports::progress_port::{NoopProgress, ProgressSink};
use std::sync::Mutex;

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn fast_crossover() -> BatchConfig {
    BatchConfig {
        signal: SignalConfig::Crossover {
            short_window: 10,
            long_window: 30,
        },
        ..BatchConfig::default()
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

mod failure_isolation {
    use super::*;

    #[test]
    fn duplicate_dates_fail_one_instrument() {
        let mut duplicated = wave_bars(300, 0.5);
        duplicated[150].date = duplicated[149].date;

        let port = MockDataPort::new()
            .with_bars("000001", wave_bars(300, 0.0))
            .with_bars("000002", duplicated)
            .with_bars("000003", wave_bars(300, 1.0));

        let result = run_batch(
            &port,
            &ids(&["000001", "000002", "000003"]),
            &fast_crossover(),
            &NoopProgress,
        );

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.ranked.len(), 2);
        assert!(result.ranked.iter().all(|r| r.instrument_id != "000002"));

        let failure = &result.failures[0];
        assert_eq!(failure.instrument_id, "000002");
        assert_eq!(failure.kind, ErrorKind::Validation);
        assert!(failure.reason.contains("duplicate date"));
    }

    #[test]
    fn short_history_and_source_errors_are_isolated() {
        let port = MockDataPort::new()
            .with_bars("GOOD", wave_bars(300, 0.0))
            .with_bars("SHORT", wave_bars(120, 0.0))
            .with_bars("EMPTY", vec![])
            .with_error("BROKEN", "disk read failed");

        let result = run_batch(
            &port,
            &ids(&["BROKEN", "EMPTY", "GOOD", "SHORT"]),
            &fast_crossover(),
            &NoopProgress,
        );

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 3);

        let by_id = |id: &str| {
            result
                .failures
                .iter()
                .find(|f| f.instrument_id == id)
                .unwrap()
        };
        assert_eq!(by_id("BROKEN").kind, ErrorKind::System);
        assert!(by_id("BROKEN").reason.contains("disk read failed"));
        assert_eq!(by_id("EMPTY").kind, ErrorKind::System);
        assert_eq!(by_id("SHORT").kind, ErrorKind::Validation);
        assert_eq!(by_id("SHORT").stage, InstrumentStage::Pending);
        assert!(by_id("SHORT").reason.contains("need 250"));
    }

    #[test]
    fn zero_successes_produce_empty_result() {
        let port = MockDataPort::new().with_error("A", "gone").with_error("B", "gone");
        let result = run_batch(&port, &ids(&["A", "B"]), &fast_crossover(), &NoopProgress);

        assert_eq!(result.succeeded, 0);
        assert_eq!(result.failed, 2);
        assert!(result.ranked.is_empty());
        assert_eq!(result.summary.count, 0);
        assert_eq!(result.summary.mean_return, 0.0);
    }

    #[test]
    fn empty_universe() {
        let sink = RecordingSink::default();
        let result = run_batch(&MockDataPort::new(), &[], &fast_crossover(), &sink);
        assert_eq!(result.total(), 0);
        assert!(result.failures.is_empty());
        assert!(sink.events.lock().unwrap().is_empty());
    }
}

mod ranking {
    use super::*;

    fn universe(count: usize) -> (MockDataPort, Vec<String>) {
        let mut port = MockDataPort::new();
        let mut names = Vec::new();
        for i in 0..count {
            let id = format!("{:06}", i);
            port = port.with_bars(&id, wave_bars(300, i as f64 * 0.37));
            names.push(id);
        }
        (port, names)
    }

    #[test]
    fn ranked_order_identical_across_worker_counts() {
        let (port, names) = universe(24);
        let run = |workers: usize| {
            let config = BatchConfig {
                worker_limit: workers,
                ..fast_crossover()
            };
            run_batch(&port, &names, &config, &NoopProgress)
        };

        let baseline = run(1);
        for workers in [1, 3, 8, 50] {
            let other = run(workers);
            assert_eq!(other.ranked, baseline.ranked, "workers = {workers}");
            assert_eq!(other.summary, baseline.summary);
        }
    }

    #[test]
    fn ranked_descending_by_selected_metric() {
        let (port, names) = universe(12);
        for metric in [
            RankingMetric::SharpeRatio,
            RankingMetric::TotalReturn,
            RankingMetric::MaxDrawdown,
            RankingMetric::TradeCount,
        ] {
            let config = BatchConfig {
                ranking_metric: metric,
                ..fast_crossover()
            };
            let result = run_batch(&port, &names, &config, &NoopProgress);
            assert_eq!(result.ranking_metric, metric);
            for pair in result.ranked.windows(2) {
                let (a, b) = (metric.value(&pair[0]), metric.value(&pair[1]));
                assert!(
                    a > b || (a == b && pair[0].instrument_id < pair[1].instrument_id),
                    "{metric}: {} ({a}) before {} ({b})",
                    pair[0].instrument_id,
                    pair[1].instrument_id
                );
            }
        }
    }

    #[test]
    fn summary_matches_ranked_results() {
        let (port, names) = universe(10);
        let result = run_batch(&port, &names, &fast_crossover(), &NoopProgress);
        let summary = &result.summary;

        assert_eq!(summary.count, result.succeeded);
        let histogram_total: usize = summary.histogram.iter().map(|b| b.count).sum();
        assert_eq!(histogram_total, summary.count);
        assert!(summary.positive_count + summary.negative_count <= summary.count);
        assert!(summary.mean_max_drawdown <= 0.0);

        let mean: f64 =
            result.ranked.iter().map(|r| r.total_return).sum::<f64>() / result.ranked.len() as f64;
        approx::assert_abs_diff_eq!(summary.mean_return, mean, epsilon = 1e-12);
    }

    #[test]
    fn progress_reported_every_interval_and_at_end() {
        let (port, names) = universe(25);
        let config = BatchConfig {
            progress_interval: 10,
            worker_limit: 4,
            ..fast_crossover()
        };
        let sink = RecordingSink::default();
        run_batch(&port, &names, &config, &sink);

        let events = sink.events.lock().unwrap();
        let completed: Vec<usize> = events.iter().map(|e| e.completed).collect();
        assert_eq!(completed, [10, 20, 25]);
        assert!(events.iter().all(|e| e.total == 25));
        assert_eq!(events[2].succeeded, 25);
        assert_eq!(events[2].failed, 0);
    }
}

mod low_frequency {
    use super::*;

    fn low_frequency(require_volume: bool) -> BatchConfig {
        BatchConfig {
            signal: SignalConfig::LowFrequency(LowFrequencyParams {
                require_volume,
                ..LowFrequencyParams::default()
            }),
            ..BatchConfig::default()
        }
    }

    #[test]
    fn missing_volume_skips_the_filter() {
        let closes = wave_closes(260, 25.0, 6.0, 80.0, 0.0);
        let port = MockDataPort::new().with_bars("NOVOL", bars_from_closes(&closes, None));

        let result = run_batch(&port, &ids(&["NOVOL"]), &low_frequency(false), &NoopProgress);

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(result.ranked[0].bar_count(), 260);
    }

    #[test]
    fn missing_volume_fails_when_required() {
        let closes = wave_closes(260, 25.0, 6.0, 80.0, 0.0);
        let port = MockDataPort::new().with_bars("NOVOL", bars_from_closes(&closes, None));

        let result = run_batch(&port, &ids(&["NOVOL"]), &low_frequency(true), &NoopProgress);

        assert_eq!(result.succeeded, 0);
        assert_eq!(result.failed, 1);
        let failure = &result.failures[0];
        assert_eq!(failure.stage, InstrumentStage::Loaded);
        assert_eq!(failure.kind, ErrorKind::Validation);
    }

    #[test]
    fn single_blank_volume_cell_does_not_fail_required_volume() {
        let mut bars = wave_bars(260, 0.0);
        bars[0].volume = None;
        let port = MockDataPort::new().with_bars("GAP", bars);

        let result = run_batch(&port, &ids(&["GAP"]), &low_frequency(true), &NoopProgress);

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 0);
    }

    #[test]
    fn entries_respect_min_holding_days() {
        let history = PriceHistory::new("WAVE", wave_bars(600, 0.0), 250).unwrap();
        let params = LowFrequencyParams {
            volume_threshold: 0.0,
            price_threshold: 0.0,
            ..LowFrequencyParams::default()
        };
        let min_hold = params.min_holding_days;
        let signals = generate(&history, &SignalConfig::LowFrequency(params)).unwrap();

        let entries = signals.entry_indices();
        assert!(!entries.is_empty());
        for pair in entries.windows(2) {
            assert!(pair[1] - pair[0] >= min_hold);
        }
    }
}

mod single_instrument {
    use super::*;

    #[test]
    fn flat_series_has_no_trades() {
        let history = PriceHistory::new("FLAT", bars_from_closes(&[15.0; 300], Some(1e4)), 250)
            .unwrap();
        let signals = generate(&history, &SignalConfig::default()).unwrap();
        assert!(signals.entry_indices().is_empty());
        assert!(signals.exit_indices().is_empty());

        let result = simulate(&history, &signals, &SimulationConfig::batch_default()).unwrap();
        assert_eq!(result.total_return, 0.0);
        assert_eq!(result.sharpe_ratio, 0.0);
        assert_eq!(result.max_drawdown, 0.0);
        assert_eq!(result.trade_count, 0);
        assert_eq!(result.win_rate, 0.0);
    }

    #[test]
    fn generate_and_simulate_are_idempotent() {
        let history = PriceHistory::new("WAVE", wave_bars(400, 0.3), 250).unwrap();
        let config = SignalConfig::Crossover {
            short_window: 10,
            long_window: 30,
        };
        let a = generate(&history, &config).unwrap();
        let b = generate(&history, &config).unwrap();
        assert_eq!(a, b);

        let sim = SimulationConfig::default();
        assert_eq!(
            simulate(&history, &a, &sim).unwrap(),
            simulate(&history, &b, &sim).unwrap()
        );
    }

    #[test]
    fn simulated_wave_respects_result_invariants() {
        let history = PriceHistory::new("WAVE", wave_bars(500, 1.1), 250).unwrap();
        let signals = generate(
            &history,
            &SignalConfig::Crossover {
                short_window: 5,
                long_window: 20,
            },
        )
        .unwrap();
        let result = simulate(&history, &signals, &SimulationConfig::default()).unwrap();

        assert!(result.trade_count > 0);
        assert!(result.max_drawdown <= 0.0);
        assert!((0.0..=1.0).contains(&result.win_rate));
        assert!(result.equity_curve.iter().all(|p| p.value >= 0.0));
        assert_eq!(result.equity_curve.len(), history.len());
        assert_eq!(result.drawdown_curve.len(), history.len());
        assert_eq!(result.cumulative_return_curve.len(), history.len());
    }

    #[test]
    fn simulate_rejects_misaligned_signals() {
        let history = PriceHistory::new("WAVE", wave_bars(300, 0.0), 250).unwrap();
        let other = PriceHistory::new("LONG", wave_bars(320, 0.0), 250).unwrap();
        let signals = generate(&other, &SignalConfig::default()).unwrap();
        let err = simulate(&history, &signals, &SimulationConfig::default()).unwrap_err();
        assert!(matches!(err, RankbtError::InvalidSignals { .. }));
    }
}
