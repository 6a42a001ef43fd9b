//! Price data access port trait.

use crate::domain::error::RankbtError;
use crate::domain::ohlcv::OhlcvBar;

/// Source of raw daily bars. Shared by reference across batch workers.
pub trait DataPort: Send + Sync {
    /// Bars for one instrument in source order; validation happens in
    /// [`PriceHistory::new`](crate::domain::price_history::PriceHistory::new).
    fn fetch_ohlcv(&self, instrument_id: &str) -> Result<Vec<OhlcvBar>, RankbtError>;

    /// Every instrument id the source can serve, sorted.
    fn list_instruments(&self) -> Result<Vec<String>, RankbtError>;
}
