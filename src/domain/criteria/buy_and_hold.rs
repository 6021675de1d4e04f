//! Buy-and-hold baseline and the strategy-versus-baseline ratio.
//!
//! The baseline spans the run window of a `RunConfig` (the whole series by
//! default) and is priced with the same bar field the runner trades at.

use crate::domain::criteria::{Criterion, ratio};
use crate::domain::num::Num;
use crate::domain::position::{Position, TradeSide};
use crate::domain::record::TradingRecord;
use crate::domain::runner::RunConfig;
use crate::domain::series::BarSeries;

/// One position from the first to the last bar of `window`, or `None` when
/// the window covers fewer than two bars.
fn buy_and_hold_position<N: Num>(
    series: &BarSeries<N>,
    side: TradeSide,
    window: &RunConfig,
) -> Option<Position<N>> {
    let last = series.end_index()?;
    let start = window.start_index.unwrap_or(series.begin_index());
    let end = window.end_index.unwrap_or(last).min(last);
    let price_at = |index: usize| {
        series
            .bar(index)
            .map(|bar| series.normalize(bar.price(window.price)))
    };
    let mut position = Position::open(side, start, price_at(start)?);
    position.close(end, price_at(end)?).then_some(position)
}

fn buy_and_hold_value<N: Num>(
    base: &dyn Criterion<N>,
    series: &BarSeries<N>,
    side: TradeSide,
    window: &RunConfig,
) -> N {
    match buy_and_hold_position(series, side, window) {
        Some(position) => base.calculate_position(series, &position),
        None => base.calculate(series, &TradingRecord::new(side)),
    }
}

/// `base` evaluated over a single buy-and-hold position on the record's side.
pub struct BuyAndHold<N: Num> {
    base: Box<dyn Criterion<N>>,
    window: RunConfig,
}

impl<N: Num> BuyAndHold<N> {
    pub fn new(base: impl Criterion<N> + 'static) -> Self {
        Self {
            base: Box::new(base),
            window: RunConfig::default(),
        }
    }

    /// Restrict the baseline to the window and price field of a run.
    pub fn over(mut self, window: &RunConfig) -> Self {
        self.window = window.clone();
        self
    }
}

impl<N: Num> Criterion<N> for BuyAndHold<N> {
    fn name(&self) -> String {
        format!("buy_and_hold({})", self.base.name())
    }

    fn calculate(&self, series: &BarSeries<N>, record: &TradingRecord<N>) -> N {
        buy_and_hold_value(self.base.as_ref(), series, record.side(), &self.window)
    }

    fn better_than(&self, a: N, b: N) -> bool {
        self.base.better_than(a, b)
    }
}

/// `base(record) / base(buy-and-hold)`.
///
/// A zero baseline gives 0 when the strategy value is also 0, otherwise a
/// signed `Num::infinity()`.
pub struct VersusBuyAndHold<N: Num> {
    base: Box<dyn Criterion<N>>,
    window: RunConfig,
}

impl<N: Num> VersusBuyAndHold<N> {
    pub fn new(base: impl Criterion<N> + 'static) -> Self {
        Self {
            base: Box::new(base),
            window: RunConfig::default(),
        }
    }

    /// Compare against a baseline over the window and price field of a run.
    pub fn over(mut self, window: &RunConfig) -> Self {
        self.window = window.clone();
        self
    }
}

impl<N: Num> Criterion<N> for VersusBuyAndHold<N> {
    fn name(&self) -> String {
        format!("versus_buy_and_hold({})", self.base.name())
    }

    fn calculate(&self, series: &BarSeries<N>, record: &TradingRecord<N>) -> N {
        let strategy = self.base.calculate(series, record);
        let baseline =
            buy_and_hold_value(self.base.as_ref(), series, record.side(), &self.window);
        series.normalize(ratio(strategy, baseline))
    }
}
