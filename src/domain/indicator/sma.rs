//! Simple Moving Average.
//!
//! SMA(w)[i] = (X[i-w+1] + ... + X[i]) / w over the upstream indicator X.
//! Unstable until the upstream is stable for a full window:
//! `minimum_stable_index = upstream.minimum_stable_index() + w - 1`.

use std::sync::Arc;

use crate::domain::error::BacktestError;
use crate::domain::indicator::{Indicator, IndicatorCache, IndicatorRef, stable_index_after};
use crate::domain::num::Num;
use crate::domain::series::BarSeries;

#[derive(Debug)]
pub struct Sma<N: Num> {
    upstream: IndicatorRef<N>,
    window: usize,
    stable_from: usize,
    cache: IndicatorCache<N>,
}

impl<N: Num> Sma<N> {
    pub fn new(upstream: IndicatorRef<N>, window: usize) -> Result<Self, BacktestError> {
        if window == 0 {
            return Err(BacktestError::InvalidWindow {
                indicator: format!("SMA over {}", upstream.name()),
                window,
            });
        }
        let stable_from = stable_index_after(&upstream, window, "SMA")?;
        let cache = IndicatorCache::new(upstream.series().len());
        Ok(Self {
            upstream,
            window,
            stable_from,
            cache,
        })
    }

    fn compute(&self, index: usize) -> Option<N> {
        if index < self.minimum_stable_index() {
            return None;
        }
        let start = index + 1 - self.window;
        let mut sum = N::zero();
        for i in start..=index {
            sum = sum + self.upstream.value(i)?;
        }
        Some(self.series().normalize(sum / N::from_usize(self.window)))
    }
}

impl<N: Num> Indicator<N> for Sma<N> {
    fn value(&self, index: usize) -> Option<N> {
        if index >= self.series().len() {
            return None;
        }
        self.cache.get_or_compute(index, || self.compute(index))
    }

    fn minimum_stable_index(&self) -> usize {
        self.stable_from
    }

    fn series(&self) -> &Arc<BarSeries<N>> {
        self.upstream.series()
    }

    fn name(&self) -> String {
        format!("SMA({}, {})", self.window, self.upstream.name())
    }
}
