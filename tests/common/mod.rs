#![allow(dead_code)]

use chrono::NaiveDate;
use rankbt::domain::error::RankbtError;
pub use rankbt::domain::ohlcv::OhlcvBar;
use rankbt::ports::data_port::DataPort;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, instrument: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(instrument.to_string(), bars);
        self
    }

    pub fn with_error(mut self, instrument: &str, reason: &str) -> Self {
        self.errors.insert(instrument.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(&self, instrument_id: &str) -> Result<Vec<OhlcvBar>, RankbtError> {
        if let Some(reason) = self.errors.get(instrument_id) {
            return Err(RankbtError::Io(std::io::Error::other(reason.clone())));
        }
        Ok(self.data.get(instrument_id).cloned().unwrap_or_default())
    }

    fn list_instruments(&self) -> Result<Vec<String>, RankbtError> {
        let mut ids: Vec<String> = self
            .data
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(date: NaiveDate, close: f64, volume: Option<f64>) -> OhlcvBar {
    OhlcvBar {
        date,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume,
    }
}

/// Bars on consecutive calendar days with the given closes.
pub fn bars_from_closes(closes: &[f64], volume: Option<f64>) -> Vec<OhlcvBar> {
    let start = date(2020, 1, 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(start + chrono::Duration::days(i as i64), close, volume))
        .collect()
}

/// Deterministic oscillating series that produces several crossovers.
pub fn wave_closes(count: usize, base: f64, amplitude: f64, period: f64, phase: f64) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            base + amplitude * (2.0 * std::f64::consts::PI * t / period + phase).sin() + t * 0.01
        })
        .collect()
}

pub fn wave_bars(count: usize, phase: f64) -> Vec<OhlcvBar> {
    bars_from_closes(&wave_closes(count, 25.0, 6.0, 80.0, phase), Some(10_000.0))
}

pub fn write_csv(dir: &Path, instrument: &str, bars: &[OhlcvBar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        let volume = b.volume.map(|v| v.to_string()).unwrap_or_default();
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            volume
        ));
    }
    fs::write(dir.join(format!("{instrument}.csv")), content).unwrap();
}
