//! Data access port trait.

use crate::domain::error::TrendcrossError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// Daily bars of one instrument, sorted by date. `source` is
    /// adapter-specific (a file path for CSV).
    fn fetch_daily_bars(&self, source: &str) -> Result<Vec<Bar>, TrendcrossError>;
}
