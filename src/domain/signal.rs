//! Entry/exit signal generation from price and volume series.
//!
//! Two generators share one pipeline:
//! - Crossover: short SMA of close crossing the long SMA.
//! - Low frequency: crossover signals thinned by a trend-strength filter, a
//!   price band, optional volume confirmation and a minimum holding period.
//!
//! Both finish with a position-consistency pass, so a returned
//! [`SignalSeries`] never enters while holding or exits while flat.

use log::warn;

use crate::domain::error::RankbtError;
use crate::domain::indicator::{calculate_sma, calculate_sma_with_gaps};
use crate::domain::price_history::PriceHistory;

/// Volume moving-average window used by the confirmation filter.
pub const VOLUME_MA_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSeries {
    pub entries: Vec<bool>,
    pub exits: Vec<bool>,
}

impl SignalSeries {
    pub fn empty(len: usize) -> Self {
        Self {
            entries: vec![false; len],
            exits: vec![false; len],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_indices(&self) -> Vec<usize> {
        flagged(&self.entries)
    }

    pub fn exit_indices(&self) -> Vec<usize> {
        flagged(&self.exits)
    }
}

fn flagged(flags: &[bool]) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter_map(|(i, &f)| f.then_some(i))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LowFrequencyParams {
    pub short_window: usize,
    pub long_window: usize,
    pub min_holding_days: usize,
    /// Minimum `volume / volume_avg` for an entry to be confirmed.
    pub volume_threshold: f64,
    /// Minimum `(short - long) / long` for an entry to count as a trend.
    pub price_threshold: f64,
    pub price_range: (f64, f64),
    /// Fail the instrument instead of skipping the volume filter when the
    /// history carries no volume.
    pub require_volume: bool,
}

impl Default for LowFrequencyParams {
    fn default() -> Self {
        LowFrequencyParams {
            short_window: 20,
            long_window: 60,
            min_holding_days: 20,
            volume_threshold: 1.2,
            price_threshold: 0.02,
            price_range: (10.0, 50.0),
            require_volume: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalConfig {
    Crossover {
        short_window: usize,
        long_window: usize,
    },
    LowFrequency(LowFrequencyParams),
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig::Crossover {
            short_window: 30,
            long_window: 120,
        }
    }
}

impl SignalConfig {
    pub fn low_frequency() -> Self {
        SignalConfig::LowFrequency(LowFrequencyParams::default())
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignalConfig::Crossover { .. } => "crossover",
            SignalConfig::LowFrequency(_) => "low_frequency",
        }
    }

    pub fn windows(&self) -> (usize, usize) {
        match self {
            SignalConfig::Crossover {
                short_window,
                long_window,
            } => (*short_window, *long_window),
            SignalConfig::LowFrequency(p) => (p.short_window, p.long_window),
        }
    }

    pub fn validate(&self) -> Result<(), RankbtError> {
        let (short, long) = self.windows();
        if short == 0 || long == 0 {
            return Err(RankbtError::InvalidSignalConfig {
                reason: format!("moving average windows must be positive (got {short}/{long})"),
            });
        }

        if let SignalConfig::LowFrequency(p) = self {
            let (min, max) = p.price_range;
            if !(min.is_finite() && max.is_finite()) || min > max {
                return Err(RankbtError::InvalidSignalConfig {
                    reason: format!("price_range [{min}, {max}] is not a valid band"),
                });
            }
            if !p.volume_threshold.is_finite() || !p.price_threshold.is_finite() {
                return Err(RankbtError::InvalidSignalConfig {
                    reason: "thresholds must be finite".into(),
                });
            }
        }
        Ok(())
    }
}

/// Generate aligned entry/exit signals for `history`.
pub fn generate(history: &PriceHistory, config: &SignalConfig) -> Result<SignalSeries, RankbtError> {
    config.validate()?;

    let (short_window, long_window) = config.windows();
    if short_window >= long_window {
        warn!(
            "{}: short window {} is not below long window {}",
            history.instrument_id(),
            short_window,
            long_window
        );
    }

    let closes = history.closes();
    let short_ma = calculate_sma(&closes, short_window);
    let long_ma = calculate_sma(&closes, long_window);

    let (mut entries, mut exits) = crossover_signals(&short_ma, &long_ma);

    if let SignalConfig::LowFrequency(params) = config {
        apply_trend_filter(&mut entries, &short_ma, &long_ma, params.price_threshold);
        apply_price_band(&mut entries, &closes, params.price_range);

        if history.has_any_volume() {
            apply_volume_filter(&mut entries, &history.volumes(), params.volume_threshold);
        } else if params.require_volume {
            return Err(RankbtError::MissingVolume {
                instrument: history.instrument_id().to_string(),
            });
        }

        enforce_min_holding(&mut entries, &mut exits, params.min_holding_days);
    }

    enforce_position_consistency(&mut entries, &mut exits);

    Ok(SignalSeries { entries, exits })
}

/// Entry where short moves from `<=` long to `>` long; exit where it moves
/// from `>=` to `<`. Both averages must be defined on both bars.
fn crossover_signals(short: &[Option<f64>], long: &[Option<f64>]) -> (Vec<bool>, Vec<bool>) {
    let len = short.len();
    let mut entries = vec![false; len];
    let mut exits = vec![false; len];

    for i in 1..len {
        let (Some(s_prev), Some(l_prev), Some(s), Some(l)) =
            (short[i - 1], long[i - 1], short[i], long[i])
        else {
            continue;
        };
        entries[i] = s_prev <= l_prev && s > l;
        exits[i] = s_prev >= l_prev && s < l;
    }

    (entries, exits)
}

fn apply_trend_filter(
    entries: &mut [bool],
    short: &[Option<f64>],
    long: &[Option<f64>],
    threshold: f64,
) {
    for (i, entry) in entries.iter_mut().enumerate() {
        if !*entry {
            continue;
        }
        *entry = match (short[i], long[i]) {
            (Some(s), Some(l)) if l != 0.0 => (s - l) / l > threshold,
            _ => false,
        };
    }
}

fn apply_price_band(entries: &mut [bool], closes: &[f64], (min, max): (f64, f64)) {
    for (entry, &close) in entries.iter_mut().zip(closes) {
        if *entry && !(min..=max).contains(&close) {
            *entry = false;
        }
    }
}

/// A blank volume cell leaves the average undefined for every window that
/// covers it; entries there are suppressed.
fn apply_volume_filter(entries: &mut [bool], volumes: &[Option<f64>], threshold: f64) {
    let volume_ma = calculate_sma_with_gaps(volumes, VOLUME_MA_WINDOW);
    for (i, entry) in entries.iter_mut().enumerate() {
        if !*entry {
            continue;
        }
        *entry = match (volumes[i], volume_ma[i]) {
            (Some(volume), Some(avg)) if avg > 0.0 => volume / avg > threshold,
            _ => false,
        };
    }
}

/// Left-to-right fold carrying the last accepted entry index (`None` stands
/// for minus infinity). An entry closer than `min_holding_days` to the last
/// accepted one is dropped; an accepted entry at `i` clears exits on
/// `i+1 .. i+min_holding_days` (far edge excluded).
///
/// Order dependent: must not be parallelized.
fn enforce_min_holding(entries: &mut [bool], exits: &mut [bool], min_holding_days: usize) {
    let len = entries.len();
    (0..len).fold(None::<usize>, |last_accepted, i| {
        if !entries[i] {
            return last_accepted;
        }
        if last_accepted.is_some_and(|last| i - last < min_holding_days) {
            entries[i] = false;
            return last_accepted;
        }

        let window_end = (i + min_holding_days).min(len);
        if window_end > i + 1 {
            exits[i + 1..window_end].fill(false);
        }
        Some(i)
    });
}

fn enforce_position_consistency(entries: &mut [bool], exits: &mut [bool]) {
    let mut holding = false;
    for (entry, exit) in entries.iter_mut().zip(exits.iter_mut()) {
        if holding {
            *entry = false;
            holding = !*exit;
        } else {
            *exit = false;
            holding = *entry;
        }
    }
}
