//! Series ingestion port.

use crate::domain::error::BacktestError;
use crate::domain::num::{Num, Precision};
use crate::domain::series::BarSeries;

/// Source of historical bars for one numeric representation.
pub trait DataPort<N: Num> {
    /// Load the bars known as `name` into a series rounded to `precision`.
    fn fetch_series(&self, name: &str, precision: Precision) -> Result<BarSeries<N>, BacktestError>;
}
