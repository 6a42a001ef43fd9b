//! Build and validate a [`BatchConfig`] from a [`ConfigPort`].
//!
//! Sections read:
//! - `[backtest]` initial_capital, commission_rate, slippage_rate, sizing, size, min_history
//! - `[strategy]` kind, short_window, long_window, min_holding_days,
//!   volume_threshold, price_threshold, price_min, price_max, require_volume
//! - `[batch]` data_dir, worker_limit, progress_interval, ranking_metric, output_dir, limit
//!
//! Missing keys take the mode defaults: [`SimulationConfig::batch_default`]
//! for a batch run, [`SimulationConfig::default`] for a single instrument.
//! Present but malformed or out of range values are rejected with
//! [`RankbtError::ConfigInvalid`].

use std::path::PathBuf;

use crate::domain::batch::BatchConfig;
use crate::domain::error::RankbtError;
use crate::domain::execution::{SimulationConfig, Sizing};
use crate::domain::ranking::RankingMetric;
use crate::domain::signal::{LowFrequencyParams, SignalConfig};
use crate::ports::config_port::ConfigPort;

/// Where a batch reads from and writes to. Not part of [`BatchConfig`]
/// because the core never touches the filesystem.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunSettings {
    pub data_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    /// Only the first `limit` instruments (sorted by id) are run.
    pub limit: Option<usize>,
}

pub fn build_batch_config(config: &dyn ConfigPort) -> Result<BatchConfig, RankbtError> {
    build_config(config, SimulationConfig::batch_default())
}

/// Same sections as [`build_batch_config`], with single-instrument capital
/// and cost defaults.
pub fn build_single_config(config: &dyn ConfigPort) -> Result<BatchConfig, RankbtError> {
    build_config(config, SimulationConfig::default())
}

fn build_config(
    config: &dyn ConfigPort,
    simulation_defaults: SimulationConfig,
) -> Result<BatchConfig, RankbtError> {
    let defaults = BatchConfig::default();
    let batch = BatchConfig {
        signal: build_signal_config(config)?,
        simulation: build_simulation_config(config, &simulation_defaults)?,
        min_history: read_usize(config, "backtest", "min_history")?.unwrap_or(defaults.min_history),
        worker_limit: read_usize(config, "batch", "worker_limit")?
            .unwrap_or(defaults.worker_limit),
        progress_interval: read_usize(config, "batch", "progress_interval")?
            .unwrap_or(defaults.progress_interval),
        ranking_metric: match config.get_string("batch", "ranking_metric") {
            Some(name) => name.parse()?,
            None => defaults.ranking_metric,
        },
    };

    if batch.min_history == 0 {
        return Err(invalid("backtest", "min_history", "must be at least 1"));
    }
    batch.validate()?;
    Ok(batch)
}

pub fn build_run_settings(config: &dyn ConfigPort) -> Result<RunSettings, RankbtError> {
    let limit = read_usize(config, "batch", "limit")?;
    if limit == Some(0) {
        return Err(invalid("batch", "limit", "must be at least 1"));
    }
    Ok(RunSettings {
        data_dir: config.get_string("batch", "data_dir").map(PathBuf::from),
        output_dir: config.get_string("batch", "output_dir").map(PathBuf::from),
        limit,
    })
}

fn build_simulation_config(
    config: &dyn ConfigPort,
    defaults: &SimulationConfig,
) -> Result<SimulationConfig, RankbtError> {
    let initial_capital =
        read_f64(config, "backtest", "initial_capital")?.unwrap_or(defaults.initial_capital);
    if !(initial_capital > 0.0) {
        return Err(invalid("backtest", "initial_capital", "must be positive"));
    }

    let commission_rate =
        read_f64(config, "backtest", "commission_rate")?.unwrap_or(defaults.commission_rate);
    if !(0.0..1.0).contains(&commission_rate) {
        return Err(invalid("backtest", "commission_rate", "must be in [0, 1)"));
    }

    let slippage_rate =
        read_f64(config, "backtest", "slippage_rate")?.unwrap_or(defaults.slippage_rate);
    if !(0.0..1.0).contains(&slippage_rate) {
        return Err(invalid("backtest", "slippage_rate", "must be in [0, 1)"));
    }

    let size = read_f64(config, "backtest", "size")?;
    let sizing = match config.get_string("backtest", "sizing").as_deref() {
        None | Some("percent") => {
            let pct = size.unwrap_or(1.0);
            if !(pct > 0.0 && pct <= 1.0) {
                return Err(invalid("backtest", "size", "percent sizing must be in (0, 1]"));
            }
            Sizing::PercentOfEquity(pct)
        }
        Some("amount") => {
            let amount = size.ok_or_else(|| RankbtError::ConfigMissing {
                section: "backtest".into(),
                key: "size".into(),
            })?;
            if !(amount > 0.0) {
                return Err(invalid("backtest", "size", "amount sizing must be positive"));
            }
            Sizing::FixedAmount(amount)
        }
        Some(other) => {
            return Err(invalid(
                "backtest",
                "sizing",
                &format!("unknown sizing '{other}', expected percent or amount"),
            ));
        }
    };

    Ok(SimulationConfig {
        initial_capital,
        commission_rate,
        slippage_rate,
        sizing,
    })
}

fn build_signal_config(config: &dyn ConfigPort) -> Result<SignalConfig, RankbtError> {
    let kind = config
        .get_string("strategy", "kind")
        .unwrap_or_else(|| "crossover".to_string());

    let signal = match kind.as_str() {
        "crossover" => {
            let (default_short, default_long) = SignalConfig::default().windows();
            SignalConfig::Crossover {
                short_window: read_usize(config, "strategy", "short_window")?
                    .unwrap_or(default_short),
                long_window: read_usize(config, "strategy", "long_window")?
                    .unwrap_or(default_long),
            }
        }
        "low_frequency" => {
            let d = LowFrequencyParams::default();
            SignalConfig::LowFrequency(LowFrequencyParams {
                short_window: read_usize(config, "strategy", "short_window")?
                    .unwrap_or(d.short_window),
                long_window: read_usize(config, "strategy", "long_window")?
                    .unwrap_or(d.long_window),
                min_holding_days: read_usize(config, "strategy", "min_holding_days")?
                    .unwrap_or(d.min_holding_days),
                volume_threshold: read_f64(config, "strategy", "volume_threshold")?
                    .unwrap_or(d.volume_threshold),
                price_threshold: read_f64(config, "strategy", "price_threshold")?
                    .unwrap_or(d.price_threshold),
                price_range: (
                    read_f64(config, "strategy", "price_min")?.unwrap_or(d.price_range.0),
                    read_f64(config, "strategy", "price_max")?.unwrap_or(d.price_range.1),
                ),
                require_volume: config.get_bool("strategy", "require_volume", d.require_volume),
            })
        }
        other => {
            return Err(invalid(
                "strategy",
                "kind",
                &format!("unknown strategy '{other}', expected crossover or low_frequency"),
            ));
        }
    };

    let (short, long) = signal.windows();
    if short == 0 {
        return Err(invalid("strategy", "short_window", "must be at least 1"));
    }
    if long == 0 {
        return Err(invalid("strategy", "long_window", "must be at least 1"));
    }
    if let SignalConfig::LowFrequency(p) = &signal {
        if p.price_range.0 > p.price_range.1 {
            return Err(invalid("strategy", "price_min", "must not exceed price_max"));
        }
    }
    Ok(signal)
}

fn read_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, RankbtError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, &format!("'{raw}' is not a number"))),
        },
    }
}

fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<usize>, RankbtError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("'{raw}' is not a non-negative integer"))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> RankbtError {
    RankbtError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
