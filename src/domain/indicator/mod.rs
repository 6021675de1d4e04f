//! Lazy, memoised indicators over a bar series.
//!
//! - `Indicator`: the read side every rule sees (`value(index)`)
//! - `IndicatorRef`: shared handle; several rules may read one indicator
//! - `IndicatorCache`: per-indicator memo of computed values
//!
//! A value of `None` means "unstable": the index lies before the indicator's
//! warmup has completed, or outside the series. Consumers must never act on it.

pub mod cache;
pub mod constant;
pub mod ema;
pub mod price;
pub mod sma;

pub use cache::IndicatorCache;
pub use constant::ConstantIndicator;
pub use ema::Ema;
pub use price::PriceIndicator;
pub use sma::Sma;

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::domain::error::BacktestError;
use crate::domain::num::Num;
use crate::domain::series::BarSeries;

/// A numeric function of the bar index, bound to exactly one series.
pub trait Indicator<N: Num>: fmt::Debug {
    /// Value at `index`, or `None` while unstable or out of range.
    ///
    /// Repeated calls with the same index return the same result.
    fn value(&self, index: usize) -> Option<N>;

    /// First index at which `value` is defined.
    fn minimum_stable_index(&self) -> usize;

    fn series(&self) -> &Arc<BarSeries<N>>;

    fn name(&self) -> String;

    fn is_stable_at(&self, index: usize) -> bool {
        index >= self.minimum_stable_index() && index < self.series().len()
    }
}

/// Shared, single-threaded handle to an indicator.
pub type IndicatorRef<N> = Rc<dyn Indicator<N>>;

/// Fail unless both indicators read the same series.
pub fn ensure_same_series<N: Num>(
    left: &IndicatorRef<N>,
    right: &IndicatorRef<N>,
) -> Result<(), BacktestError> {
    let expected = left.series().id();
    let found = right.series().id();
    if expected == found {
        Ok(())
    } else {
        Err(BacktestError::SeriesMismatch { expected, found })
    }
}

/// First stable index of a `window`-wide average over `upstream`.
///
/// `window` must be non-zero. Fails when the index does not fit in `usize`.
pub(crate) fn stable_index_after<N: Num>(
    upstream: &IndicatorRef<N>,
    window: usize,
    kind: &str,
) -> Result<usize, BacktestError> {
    upstream
        .minimum_stable_index()
        .checked_add(window - 1)
        .ok_or_else(|| BacktestError::InvalidWindow {
            indicator: format!("{} over {}", kind, upstream.name()),
            window,
        })
}
