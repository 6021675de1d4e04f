//! Exponential Moving Average.
//!
//! k = 2/(w+1), seeded with the SMA of the first full window, then
//! EMA[i] = EMA[i-1] + k * (X[i] - EMA[i-1]).
//!
//! Each value depends on the previous one, so a query fills the cache forward
//! from the latest memoised value instead of recursing backward.

use std::sync::Arc;

use crate::domain::error::BacktestError;
use crate::domain::indicator::{Indicator, IndicatorCache, IndicatorRef, stable_index_after};
use crate::domain::num::Num;
use crate::domain::series::BarSeries;

#[derive(Debug)]
pub struct Ema<N: Num> {
    upstream: IndicatorRef<N>,
    window: usize,
    stable_from: usize,
    multiplier: N,
    cache: IndicatorCache<N>,
}

impl<N: Num> Ema<N> {
    pub fn new(upstream: IndicatorRef<N>, window: usize) -> Result<Self, BacktestError> {
        if window == 0 {
            return Err(BacktestError::InvalidWindow {
                indicator: format!("EMA over {}", upstream.name()),
                window,
            });
        }
        let stable_from = stable_index_after(&upstream, window, "EMA")?;
        let series = upstream.series();
        let multiplier = series.normalize(N::from_usize(2) / (N::from_usize(window) + N::one()));
        let cache = IndicatorCache::new(series.len());
        Ok(Self {
            upstream,
            window,
            stable_from,
            multiplier,
            cache,
        })
    }

    fn seed(&self, first: usize) -> Option<N> {
        let mut sum = N::zero();
        for i in (first + 1 - self.window)..=first {
            sum = sum + self.upstream.value(i)?;
        }
        Some(self.series().normalize(sum / N::from_usize(self.window)))
    }

    fn compute(&self, index: usize) -> Option<N> {
        let first = self.minimum_stable_index();
        if index < first {
            return None;
        }

        let (mut at, mut ema) = match self.cache.latest_defined(first, index) {
            Some(found) => found,
            None => {
                let seed = self.seed(first)?;
                self.cache.store(first, Some(seed));
                (first, seed)
            }
        };

        while at < index {
            at += 1;
            let x = self.upstream.value(at)?;
            ema = self.series().normalize(ema + self.multiplier * (x - ema));
            self.cache.store(at, Some(ema));
        }
        Some(ema)
    }
}

impl<N: Num> Indicator<N> for Ema<N> {
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
        format!("EMA({}, {})", self.window, self.upstream.name())
    }
}
