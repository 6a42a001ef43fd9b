//! OHLCV bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// `None` when the source has no volume column or the cell is unparseable.
    pub volume: Option<f64>,
}

impl OhlcvBar {
    pub fn has_volume(&self) -> bool {
        self.volume.is_some_and(|v| v.is_finite())
    }
}
