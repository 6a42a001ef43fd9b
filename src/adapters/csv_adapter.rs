//! CSV directory data adapter: one `<instrument_id>.csv` file per instrument.

use crate::domain::error::RankbtError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// Column positions resolved from the header row.
struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn locate(instrument: &str, headers: &csv::StringRecord) -> Result<Self, RankbtError> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let require = |aliases: &[&str]| {
            find_column(&names, aliases).ok_or_else(|| RankbtError::MissingColumn {
                instrument: instrument.to_string(),
                column: aliases[0].to_string(),
            })
        };

        Ok(Columns {
            date: require(&["date", "trade_date"])?,
            open: require(&["open"])?,
            high: require(&["high"])?,
            low: require(&["low"])?,
            close: require(&["close"])?,
            volume: find_column(&names, &["volume", "vol"]),
        })
    }
}

fn find_column(names: &[String], aliases: &[&str]) -> Option<usize> {
    names.iter().position(|n| aliases.iter().any(|a| n == a))
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument_id: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", instrument_id))
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn parse_field(
    instrument: &str,
    row: usize,
    record: &csv::StringRecord,
    index: usize,
    name: &str,
) -> Result<f64, RankbtError> {
    let raw = record.get(index).unwrap_or("");
    raw.parse().map_err(|_| RankbtError::InvalidRow {
        instrument: instrument.to_string(),
        row,
        reason: format!("invalid {} value '{}'", name, raw),
    })
}

/// Read one OHLCV file, reporting errors against `instrument_id`.
pub fn read_ohlcv_file(path: &Path, instrument_id: &str) -> Result<Vec<OhlcvBar>, RankbtError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let columns = Columns::locate(instrument_id, rdr.headers()?)?;
    let mut bars = Vec::new();

    for (i, result) in rdr.records().enumerate() {
        let row = i + 1;
        let record = result?;

        let date_str = record.get(columns.date).unwrap_or("");
        let date = parse_date(date_str).ok_or_else(|| RankbtError::InvalidRow {
            instrument: instrument_id.to_string(),
            row,
            reason: format!("invalid date '{}'", date_str),
        })?;

        let volume = columns
            .volume
            .and_then(|idx| record.get(idx))
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite());

        bars.push(OhlcvBar {
            date,
            open: parse_field(instrument_id, row, &record, columns.open, "open")?,
            high: parse_field(instrument_id, row, &record, columns.high, "high")?,
            low: parse_field(instrument_id, row, &record, columns.low, "low")?,
            close: parse_field(instrument_id, row, &record, columns.close, "close")?,
            volume,
        });
    }

    Ok(bars)
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(&self, instrument_id: &str) -> Result<Vec<OhlcvBar>, RankbtError> {
        read_ohlcv_file(&self.csv_path(instrument_id), instrument_id)
    }

    fn list_instruments(&self) -> Result<Vec<String>, RankbtError> {
        let mut instruments = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "csv") {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                instruments.push(stem.to_string_lossy().into_owned());
            }
        }

        instruments.sort();
        Ok(instruments)
    }
}
