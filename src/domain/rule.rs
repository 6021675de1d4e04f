//! Rule tree: composable entry/exit predicates.
//!
//! Rules are a closed set of variants. Leaves read indicators (crossovers) or
//! the open position (stops); `And`/`Or`/`Not` combine them. Evaluation lives
//! in [`crate::domain::rule_eval`].

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use crate::domain::error::BacktestError;
use crate::domain::indicator::{ConstantIndicator, IndicatorRef, ensure_same_series};
use crate::domain::num::Num;
use crate::domain::record::TradingRecord;
use crate::domain::rule_eval;
use crate::domain::series::{BarSeries, SeriesId};

#[derive(Debug, Clone)]
pub enum Rule<N: Num> {
    /// `left` moves from at-or-below `right` to strictly above it.
    CrossedUp {
        left: IndicatorRef<N>,
        right: IndicatorRef<N>,
    },
    /// `left` moves from at-or-above `right` to strictly below it.
    CrossedDown {
        left: IndicatorRef<N>,
        right: IndicatorRef<N>,
    },
    /// Adverse move of at least `pct` percent from the entry price.
    StopLoss { price: IndicatorRef<N>, pct: N },
    /// Favorable move of at least `pct` percent from the entry price.
    StopGain { price: IndicatorRef<N>, pct: N },
    And(Box<Rule<N>>, Box<Rule<N>>),
    Or(Box<Rule<N>>, Box<Rule<N>>),
    Not(Box<Rule<N>>),
}

impl<N: Num> Rule<N> {
    pub fn crossed_up(
        left: IndicatorRef<N>,
        right: IndicatorRef<N>,
    ) -> Result<Self, BacktestError> {
        ensure_same_series(&left, &right)?;
        Ok(Rule::CrossedUp { left, right })
    }

    pub fn crossed_down(
        left: IndicatorRef<N>,
        right: IndicatorRef<N>,
    ) -> Result<Self, BacktestError> {
        ensure_same_series(&left, &right)?;
        Ok(Rule::CrossedDown { left, right })
    }

    /// `left` crosses above a fixed level.
    pub fn crossed_up_threshold(left: IndicatorRef<N>, threshold: N) -> Self {
        let right: IndicatorRef<N> =
            Rc::new(ConstantIndicator::new(left.series().clone(), threshold));
        Rule::CrossedUp { left, right }
    }

    /// `left` crosses below a fixed level.
    pub fn crossed_down_threshold(left: IndicatorRef<N>, threshold: N) -> Self {
        let right: IndicatorRef<N> =
            Rc::new(ConstantIndicator::new(left.series().clone(), threshold));
        Rule::CrossedDown { left, right }
    }

    pub fn stop_loss(price: IndicatorRef<N>, pct: N) -> Result<Self, BacktestError> {
        let pct = checked_percentage("StopLoss", &price, pct)?;
        Ok(Rule::StopLoss { price, pct })
    }

    pub fn stop_gain(price: IndicatorRef<N>, pct: N) -> Result<Self, BacktestError> {
        let pct = checked_percentage("StopGain", &price, pct)?;
        Ok(Rule::StopGain { price, pct })
    }

    pub fn and(self, other: Rule<N>) -> Self {
        Rule::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Rule<N>) -> Self {
        Rule::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Rule::Not(Box::new(self))
    }

    pub fn is_satisfied(&self, index: usize, record: &TradingRecord<N>) -> bool {
        rule_eval::evaluate(self, index, record)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Rule::CrossedUp { .. } => "crossed_up",
            Rule::CrossedDown { .. } => "crossed_down",
            Rule::StopLoss { .. } => "stop_loss",
            Rule::StopGain { .. } => "stop_gain",
            Rule::And(..) => "and",
            Rule::Or(..) => "or",
            Rule::Not(..) => "not",
        }
    }

    /// Every series read anywhere in the tree.
    pub fn bound_series(&self) -> BTreeSet<SeriesId> {
        let mut ids = BTreeSet::new();
        self.collect_series(&mut ids);
        ids
    }

    fn collect_series(&self, ids: &mut BTreeSet<SeriesId>) {
        match self {
            Rule::CrossedUp { left, right } | Rule::CrossedDown { left, right } => {
                ids.insert(left.series().id());
                ids.insert(right.series().id());
            }
            Rule::StopLoss { price, .. } | Rule::StopGain { price, .. } => {
                ids.insert(price.series().id());
            }
            Rule::And(a, b) | Rule::Or(a, b) => {
                a.collect_series(ids);
                b.collect_series(ids);
            }
            Rule::Not(inner) => inner.collect_series(ids),
        }
    }

    /// Fail if any part of the tree reads a series other than `series`.
    pub fn ensure_bound_to(&self, series: &BarSeries<N>) -> Result<(), BacktestError> {
        let expected = series.id();
        match self.bound_series().into_iter().find(|id| *id != expected) {
            Some(found) => Err(BacktestError::SeriesMismatch { expected, found }),
            None => Ok(()),
        }
    }
}

fn checked_percentage<N: Num>(
    rule: &str,
    price: &IndicatorRef<N>,
    pct: N,
) -> Result<N, BacktestError> {
    if pct < N::zero() || N::hundred().checked_add(pct).is_none() {
        return Err(BacktestError::InvalidPercentage {
            rule: rule.to_string(),
            value: pct.to_string(),
        });
    }
    Ok(price.series().normalize(pct))
}

impl<N: Num> fmt::Display for Rule<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::CrossedUp { left, right } => {
                write!(f, "CROSS_ABOVE({}, {})", left.name(), right.name())
            }
            Rule::CrossedDown { left, right } => {
                write!(f, "CROSS_BELOW({}, {})", left.name(), right.name())
            }
            Rule::StopLoss { price, pct } => write!(f, "STOP_LOSS({}, {})", price.name(), pct),
            Rule::StopGain { price, pct } => write!(f, "STOP_GAIN({}, {})", price.name(), pct),
            Rule::And(a, b) => write!(f, "AND({}, {})", a, b),
            Rule::Or(a, b) => write!(f, "OR({}, {})", a, b),
            Rule::Not(inner) => write!(f, "NOT({})", inner),
        }
    }
}
