//! Immutable, time-ordered bar series.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::domain::bar::Bar;
use crate::domain::error::BacktestError;
use crate::domain::num::{Num, Precision};

static NEXT_SERIES_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a series. Indicators remember the id of the
/// series they read so that a strategy built over one series cannot be run
/// against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesId(u64);

/// Ordered bars with a fixed numeric precision.
///
/// Bars are strictly increasing in timestamp and indices `[0, len)` are stable
/// for the lifetime of the series. Share it between indicators with `Arc`.
#[derive(Debug)]
pub struct BarSeries<N> {
    id: SeriesId,
    name: String,
    bars: Vec<Bar<N>>,
    precision: Precision,
}

impl<N: Num> BarSeries<N> {
    /// Build a series, rounding every field to `precision`.
    ///
    /// Fails if any bar is not strictly after its predecessor.
    pub fn new(
        name: impl Into<String>,
        bars: Vec<Bar<N>>,
        precision: Precision,
    ) -> Result<Self, BacktestError> {
        if let Some(pos) = bars
            .windows(2)
            .position(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            let index = pos + 1;
            return Err(BacktestError::UnorderedBars {
                index,
                timestamp: bars[index].timestamp.to_string(),
            });
        }

        let bars: Vec<Bar<N>> = bars
            .into_iter()
            .map(|bar| Bar {
                timestamp: bar.timestamp,
                open: bar.open.round_to(&precision),
                high: bar.high.round_to(&precision),
                low: bar.low.round_to(&precision),
                close: bar.close.round_to(&precision),
                volume: bar.volume.round_to(&precision),
            })
            .collect();

        let id = SeriesId(NEXT_SERIES_ID.fetch_add(1, Ordering::Relaxed));
        let name = name.into();
        debug!(series = %name, ?id, bars = bars.len(), num = N::KIND, "bar series built");

        Ok(Self {
            id,
            name,
            bars,
            precision,
        })
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn id(&self) -> SeriesId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn precision(&self) -> &Precision {
        &self.precision
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bar(&self, index: usize) -> Option<&Bar<N>> {
        self.bars.get(index)
    }

    pub fn bars(&self) -> &[Bar<N>] {
        &self.bars
    }

    pub fn begin_index(&self) -> usize {
        0
    }

    /// Index of the last bar, `None` for an empty series.
    pub fn end_index(&self) -> Option<usize> {
        self.bars.len().checked_sub(1)
    }

    /// Round a derived value to this series' precision.
    pub fn normalize(&self, value: N) -> N {
        value.round_to(&self.precision)
    }

    /// Convert a literal into this series' numeric representation.
    pub fn num_of(&self, value: f64) -> Option<N> {
        N::from_f64(value).map(|v| self.normalize(v))
    }

    /// Like `num_of`, but parses text directly so decimals stay exact.
    pub fn num_of_str(&self, text: &str) -> Option<N> {
        N::parse(text).map(|v| self.normalize(v))
    }
}
