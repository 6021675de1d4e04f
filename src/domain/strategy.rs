//! Strategy: an entry rule, an exit rule and a warmup period.

use std::collections::BTreeSet;

use crate::domain::error::BacktestError;
use crate::domain::num::Num;
use crate::domain::record::TradingRecord;
use crate::domain::rule::Rule;
use crate::domain::series::{BarSeries, SeriesId};

#[derive(Debug, Clone)]
pub struct Strategy<N: Num> {
    pub name: String,
    pub entry_rule: Rule<N>,
    pub exit_rule: Rule<N>,
    /// Neither rule is consulted for indices below this.
    pub unstable_bars: usize,
}

impl<N: Num> Strategy<N> {
    pub fn new(name: impl Into<String>, entry_rule: Rule<N>, exit_rule: Rule<N>) -> Self {
        Self {
            name: name.into(),
            entry_rule,
            exit_rule,
            unstable_bars: 0,
        }
    }

    pub fn with_unstable_bars(mut self, unstable_bars: usize) -> Self {
        self.unstable_bars = unstable_bars;
        self
    }

    pub fn is_unstable_at(&self, index: usize) -> bool {
        index < self.unstable_bars
    }

    pub fn should_enter(&self, index: usize, record: &TradingRecord<N>) -> bool {
        !self.is_unstable_at(index)
            && record.is_flat()
            && self.entry_rule.is_satisfied(index, record)
    }

    pub fn should_exit(&self, index: usize, record: &TradingRecord<N>) -> bool {
        match record.current_position() {
            Some(position) if index > position.entry_index => {
                !self.is_unstable_at(index) && self.exit_rule.is_satisfied(index, record)
            }
            _ => false,
        }
    }

    pub fn bound_series(&self) -> BTreeSet<SeriesId> {
        let mut ids = self.entry_rule.bound_series();
        ids.extend(self.exit_rule.bound_series());
        ids
    }

    pub fn ensure_bound_to(&self, series: &BarSeries<N>) -> Result<(), BacktestError> {
        self.entry_rule.ensure_bound_to(series)?;
        self.exit_rule.ensure_bound_to(series)
    }
}
