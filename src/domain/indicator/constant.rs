use std::sync::Arc;

use crate::domain::indicator::Indicator;
use crate::domain::num::Num;
use crate::domain::series::BarSeries;

/// The same value at every index of a series; used for threshold crossings.
#[derive(Debug)]
pub struct ConstantIndicator<N> {
    series: Arc<BarSeries<N>>,
    value: N,
}

impl<N: Num> ConstantIndicator<N> {
    pub fn new(series: Arc<BarSeries<N>>, value: N) -> Self {
        let value = series.normalize(value);
        Self { series, value }
    }
}

impl<N: Num> Indicator<N> for ConstantIndicator<N> {
    fn value(&self, index: usize) -> Option<N> {
        (index < self.series.len()).then_some(self.value)
    }

    fn minimum_stable_index(&self) -> usize {
        0
    }

    fn series(&self) -> &Arc<BarSeries<N>> {
        &self.series
    }

    fn name(&self) -> String {
        self.value.to_string()
    }
}
