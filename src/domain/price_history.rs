//! Validated, date-ordered price history for one instrument.
//!
//! A [`PriceHistory`] can only be built through [`PriceHistory::new`], so every
//! value downstream of the loader is sorted, free of duplicate dates, carries
//! positive finite closes and is at least `min_history` bars long.

use crate::domain::error::RankbtError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub const MIN_HISTORY_BARS: usize = 250;

#[derive(Debug, Clone)]
pub struct PriceHistory {
    instrument_id: String,
    bars: Vec<OhlcvBar>,
}

impl PriceHistory {
    pub fn new(
        instrument_id: impl Into<String>,
        mut bars: Vec<OhlcvBar>,
        min_history: usize,
    ) -> Result<Self, RankbtError> {
        let instrument_id = instrument_id.into();

        if bars.is_empty() {
            return Err(RankbtError::NoData {
                instrument: instrument_id,
            });
        }

        bars.sort_by_key(|b| b.date);

        if let Some(w) = bars.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(RankbtError::DuplicateDate {
                instrument: instrument_id,
                date: w[1].date,
            });
        }

        if let Some(bad) = bars.iter().find(|b| !b.close.is_finite() || b.close <= 0.0) {
            return Err(RankbtError::InvalidPrice {
                instrument: instrument_id,
                date: bad.date,
                price: bad.close,
            });
        }

        if bars.len() < min_history {
            return Err(RankbtError::InsufficientData {
                instrument: instrument_id,
                bars: bars.len(),
                minimum: min_history,
            });
        }

        Ok(Self {
            instrument_id,
            bars,
        })
    }

    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    /// Per-bar volume; `None` where the cell was blank or not finite.
    pub fn volumes(&self) -> Vec<Option<f64>> {
        self.bars
            .iter()
            .map(|b| b.volume.filter(|_| b.has_volume()))
            .collect()
    }

    pub fn has_any_volume(&self) -> bool {
        self.bars.iter().any(OhlcvBar::has_volume)
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }
}
