//! Analysis criteria: scalar performance measures over a trading record.
//!
//! Every criterion only looks at closed positions. Degenerate inputs never
//! fail; they produce the documented sentinel of each criterion instead
//! (0, 1, or `Num::infinity()`).

pub mod buy_and_hold;
pub mod profit;
pub mod trades;

pub use buy_and_hold::{BuyAndHold, VersusBuyAndHold};
pub use profit::{TotalProfit, TotalReturn};
pub use trades::{AverageProfitableTrades, NumberOfPositions, RewardRiskRatio};

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::error::BacktestError;
use crate::domain::num::Num;
use crate::domain::position::Position;
use crate::domain::record::TradingRecord;
use crate::domain::runner::{RunConfig, SeriesManager};
use crate::domain::series::BarSeries;
use crate::domain::strategy::Strategy;

pub trait Criterion<N: Num> {
    /// Key used in reports, e.g. `total_profit`.
    fn name(&self) -> String;

    fn calculate(&self, series: &BarSeries<N>, record: &TradingRecord<N>) -> N;

    fn calculate_position(&self, series: &BarSeries<N>, position: &Position<N>) -> N {
        self.calculate(series, &TradingRecord::from_position(position.clone()))
    }

    /// Whether `a` is a better value than `b` for this criterion.
    fn better_than(&self, a: N, b: N) -> bool {
        a > b
    }
}

/// `numerator / denominator` with zero and infinity handled without panicking.
///
/// `x / 0` is 0 when `x` is 0 and a signed infinity otherwise. Two infinities
/// give ±1.
pub(crate) fn ratio<N: Num>(numerator: N, denominator: N) -> N {
    let zero = N::zero();
    let signed_infinity = |positive: bool| {
        if positive {
            N::infinity()
        } else {
            -N::infinity()
        }
    };

    if denominator.is_zero() {
        return if numerator.is_zero() {
            zero
        } else {
            signed_infinity(numerator > zero)
        };
    }
    match (numerator.is_infinite(), denominator.is_infinite()) {
        (true, true) if (numerator > zero) == (denominator > zero) => N::one(),
        (true, true) => -N::one(),
        (true, false) => signed_infinity((numerator > zero) == (denominator > zero)),
        (false, true) => zero,
        (false, false) => numerator / denominator,
    }
}

/// Run every strategy and return the index of the best one under `criterion`.
///
/// `None` when `strategies` is empty. Ties keep the earlier strategy.
pub fn choose_best<N: Num>(
    criterion: &dyn Criterion<N>,
    manager: &SeriesManager<N>,
    strategies: &[Strategy<N>],
    config: &RunConfig,
) -> Result<Option<usize>, BacktestError> {
    let mut best: Option<(usize, N)> = None;
    for (i, strategy) in strategies.iter().enumerate() {
        let record = manager.run(strategy, config)?;
        let value = criterion.calculate(manager.series(), &record);
        debug!(strategy = %strategy.name, criterion = %criterion.name(), %value, "scored");
        best = match best {
            Some((_, current)) if !criterion.better_than(value, current) => best,
            _ => Some((i, value)),
        };
    }
    Ok(best.map(|(i, _)| i))
}

/// A named set of criteria evaluated together.
pub struct CriteriaReport<N: Num> {
    criteria: Vec<Box<dyn Criterion<N>>>,
}

impl<N: Num> Default for CriteriaReport<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Num> CriteriaReport<N> {
    pub fn new() -> Self {
        Self {
            criteria: Vec::new(),
        }
    }

    /// The criteria printed after every backtest, with buy-and-hold
    /// baselines over the window of `run`.
    pub fn standard(run: &RunConfig) -> Self {
        Self::new()
            .with(NumberOfPositions)
            .with(AverageProfitableTrades)
            .with(RewardRiskRatio)
            .with(TotalProfit)
            .with(TotalReturn)
            .with(BuyAndHold::new(TotalReturn).over(run))
            .with(VersusBuyAndHold::new(TotalProfit).over(run))
    }

    pub fn with(mut self, criterion: impl Criterion<N> + 'static) -> Self {
        self.criteria.push(Box::new(criterion));
        self
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn evaluate(
        &self,
        series: &BarSeries<N>,
        record: &TradingRecord<N>,
    ) -> BTreeMap<String, N> {
        self.criteria
            .iter()
            .map(|c| (c.name(), c.calculate(series, record)))
            .collect()
    }
}
