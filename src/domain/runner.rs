//! Strategy runner: one deterministic forward pass over a series.
//!
//! `RunConfig` holds the run parameters. The state machine is
//!
//! ```text
//! FLAT --entry rule fires--> IN_POSITION --exit rule fires (i > entry)--> FLAT
//! ```
//!
//! Everything that can be misconfigured is checked before the first bar is
//! visited; the pass itself cannot fail.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::bar::PriceField;
use crate::domain::error::BacktestError;
use crate::domain::num::Num;
use crate::domain::position::TradeSide;
use crate::domain::record::TradingRecord;
use crate::domain::series::BarSeries;
use crate::domain::strategy::Strategy;

/// What to do with a position still open after the last visited bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndOfSeries {
    /// Close at the last visited bar's price.
    #[default]
    ForceClose,
    /// Keep it open; criteria ignore open positions.
    LeaveOpen,
}

impl fmt::Display for EndOfSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndOfSeries::ForceClose => f.write_str("close"),
            EndOfSeries::LeaveOpen => f.write_str("open"),
        }
    }
}

impl FromStr for EndOfSeries {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "close" | "force_close" => Ok(EndOfSeries::ForceClose),
            "open" | "leave_open" => Ok(EndOfSeries::LeaveOpen),
            other => Err(format!("expected close or open, found '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    pub side: TradeSide,
    /// Bar field used as the entry and exit price.
    pub price: PriceField,
    pub end_of_series: EndOfSeries,
    /// First index visited; defaults to the series begin.
    pub start_index: Option<usize>,
    /// Last index visited, inclusive; defaults to the series end.
    pub end_index: Option<usize>,
}

/// Runs strategies over one series.
#[derive(Debug, Clone)]
pub struct SeriesManager<N> {
    series: Arc<BarSeries<N>>,
}

impl<N: Num> SeriesManager<N> {
    pub fn new(series: Arc<BarSeries<N>>) -> Self {
        Self { series }
    }

    pub fn series(&self) -> &Arc<BarSeries<N>> {
        &self.series
    }

    pub fn run(
        &self,
        strategy: &Strategy<N>,
        config: &RunConfig,
    ) -> Result<TradingRecord<N>, BacktestError> {
        strategy.ensure_bound_to(&self.series)?;

        let mut record = TradingRecord::new(config.side);
        let Some(last) = self.series.end_index() else {
            info!(strategy = %strategy.name, "empty series, nothing to run");
            return Ok(record);
        };

        let start = config.start_index.unwrap_or(self.series.begin_index());
        let end = config.end_index.unwrap_or(last);
        if start > end || end > last {
            return Err(BacktestError::InvalidRange {
                start,
                end,
                len: self.series.len(),
            });
        }

        info!(
            strategy = %strategy.name,
            series = self.series.name(),
            side = %config.side,
            start,
            end,
            "run started"
        );

        for (index, bar) in self.series.bars().iter().enumerate().take(end + 1).skip(start) {
            let price = self.series.normalize(bar.price(config.price));
            if record.is_flat() {
                if strategy.should_enter(index, &record) && record.enter(index, price) {
                    debug!(index, %price, "entered");
                }
            } else if strategy.should_exit(index, &record) && record.exit(index, price) {
                debug!(index, %price, "exited");
            }
        }

        if !record.is_flat() && config.end_of_series == EndOfSeries::ForceClose {
            if let Some(bar) = self.series.bar(end) {
                let price = self.series.normalize(bar.price(config.price));
                if record.exit(end, price) {
                    debug!(index = end, %price, "closed at end of series");
                }
            }
        }

        info!(
            strategy = %strategy.name,
            trades = record.trade_count(),
            open = !record.is_flat(),
            "run finished"
        );
        Ok(record)
    }
}
