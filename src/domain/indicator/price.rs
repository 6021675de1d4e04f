//! Raw bar fields exposed as an indicator.

use std::sync::Arc;

use crate::domain::bar::PriceField;
use crate::domain::indicator::Indicator;
use crate::domain::num::Num;
use crate::domain::series::BarSeries;

#[derive(Debug)]
pub struct PriceIndicator<N> {
    series: Arc<BarSeries<N>>,
    field: PriceField,
}

impl<N: Num> PriceIndicator<N> {
    pub fn new(series: Arc<BarSeries<N>>, field: PriceField) -> Self {
        Self { series, field }
    }

    pub fn close(series: Arc<BarSeries<N>>) -> Self {
        Self::new(series, PriceField::Close)
    }

    pub fn field(&self) -> PriceField {
        self.field
    }
}

impl<N: Num> Indicator<N> for PriceIndicator<N> {
    // A field read is O(1); the typical price is rounded like any derived value.
    fn value(&self, index: usize) -> Option<N> {
        self.series
            .bar(index)
            .map(|bar| self.series.normalize(bar.price(self.field)))
    }

    fn minimum_stable_index(&self) -> usize {
        0
    }

    fn series(&self) -> &Arc<BarSeries<N>> {
        &self.series
    }

    fn name(&self) -> String {
        self.field.to_string()
    }
}
