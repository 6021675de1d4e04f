//! Binds parsed rule expressions to one series.
//!
//! Identical indicator expressions resolve to one shared instance, so
//! `CROSS_ABOVE(SMA(5), SMA(30))` in the entry rule and
//! `CROSS_BELOW(SMA(5), SMA(30))` in the exit rule read the same two caches.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use tracing::debug;

use crate::domain::bar::PriceField;
use crate::domain::error::BacktestError;
use crate::domain::indicator::{ConstantIndicator, Ema, IndicatorRef, PriceIndicator, Sma};
use crate::domain::num::Num;
use crate::domain::rule::Rule;
use crate::domain::rule_parser::{self, IndicatorSpec, OperandExpr, RuleExpr, Source};
use crate::domain::series::BarSeries;
use crate::domain::strategy::Strategy;

pub struct RuleBuilder<N: Num> {
    series: Arc<BarSeries<N>>,
    prices: HashMap<PriceField, IndicatorRef<N>>,
    indicators: HashMap<IndicatorSpec, IndicatorRef<N>>,
}

impl<N: Num> RuleBuilder<N> {
    pub fn new(series: Arc<BarSeries<N>>) -> Self {
        Self {
            series,
            prices: HashMap::new(),
            indicators: HashMap::new(),
        }
    }

    /// Distinct indicators built so far (price fields excluded).
    pub fn indicator_count(&self) -> usize {
        self.indicators.len()
    }

    pub fn build(&mut self, expr: &RuleExpr) -> Result<Rule<N>, BacktestError> {
        match expr {
            RuleExpr::CrossAbove { left, right } => {
                let left = self.operand(left)?;
                let right = self.operand(right)?;
                Rule::crossed_up(left, right)
            }
            RuleExpr::CrossBelow { left, right } => {
                let left = self.operand(left)?;
                let right = self.operand(right)?;
                Rule::crossed_down(left, right)
            }
            RuleExpr::StopLoss { price, percent } => {
                let price = self.source(price)?;
                Rule::stop_loss(price, self.number(percent)?)
            }
            RuleExpr::StopGain { price, percent } => {
                let price = self.source(price)?;
                Rule::stop_gain(price, self.number(percent)?)
            }
            RuleExpr::And(rules) => self.fold(rules, Rule::and),
            RuleExpr::Or(rules) => self.fold(rules, Rule::or),
            RuleExpr::Not(rule) => Ok(self.build(rule)?.negate()),
        }
    }

    /// Parse `text` and bind it.
    pub fn build_str(&mut self, text: &str) -> Result<Rule<N>, BacktestError> {
        let expr = rule_parser::parse(text)?;
        self.build(&expr)
    }

    fn fold(
        &mut self,
        rules: &[RuleExpr],
        combine: fn(Rule<N>, Rule<N>) -> Rule<N>,
    ) -> Result<Rule<N>, BacktestError> {
        let mut built = rules.iter().map(|r| self.build(r));
        let first = built.next().ok_or_else(|| BacktestError::RuleInvalid {
            reason: "empty rule list".into(),
        })??;
        built.try_fold(first, |acc, next| Ok(combine(acc, next?)))
    }

    fn number(&self, text: &str) -> Result<N, BacktestError> {
        self.series
            .num_of_str(text)
            .ok_or_else(|| BacktestError::RuleInvalid {
                reason: format!("'{}' is not representable as {}", text, N::KIND),
            })
    }

    fn operand(&mut self, operand: &OperandExpr) -> Result<IndicatorRef<N>, BacktestError> {
        match operand {
            OperandExpr::Source(source) => self.source(source),
            OperandExpr::Constant(text) => {
                let value = self.number(text)?;
                Ok(Rc::new(ConstantIndicator::new(Arc::clone(&self.series), value)))
            }
        }
    }

    fn source(&mut self, source: &Source) -> Result<IndicatorRef<N>, BacktestError> {
        match source {
            Source::Price(field) => Ok(self.price(*field)),
            Source::Indicator(spec) => self.indicator(spec),
        }
    }

    fn price(&mut self, field: PriceField) -> IndicatorRef<N> {
        let series = &self.series;
        Rc::clone(
            self.prices
                .entry(field)
                .or_insert_with(|| Rc::new(PriceIndicator::new(Arc::clone(series), field))),
        )
    }

    fn indicator(&mut self, spec: &IndicatorSpec) -> Result<IndicatorRef<N>, BacktestError> {
        if let Some(existing) = self.indicators.get(spec) {
            return Ok(Rc::clone(existing));
        }

        let built: IndicatorRef<N> = match spec {
            IndicatorSpec::Sma { window, source } => {
                let upstream = self.source(source)?;
                Rc::new(Sma::new(upstream, *window)?)
            }
            IndicatorSpec::Ema { window, source } => {
                let upstream = self.source(source)?;
                Rc::new(Ema::new(upstream, *window)?)
            }
        };
        debug!(indicator = %spec, "indicator built");
        self.indicators.insert(spec.clone(), Rc::clone(&built));
        Ok(built)
    }
}

/// Parse and bind entry and exit rules, sharing indicators between them.
pub fn compile_strategy<N: Num>(
    series: &Arc<BarSeries<N>>,
    name: &str,
    entry: &str,
    exit: &str,
    unstable_bars: usize,
) -> Result<Strategy<N>, BacktestError> {
    let mut builder = RuleBuilder::new(Arc::clone(series));
    let entry_rule = builder.build_str(entry)?;
    let exit_rule = builder.build_str(exit)?;
    debug!(
        strategy = name,
        indicators = builder.indicator_count(),
        "strategy compiled"
    );
    Ok(Strategy::new(name, entry_rule, exit_rule).with_unstable_bars(unstable_bars))
}
