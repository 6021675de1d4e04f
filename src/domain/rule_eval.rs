//! Rule evaluation engine.
//!
//! # Evaluation Semantics
//!
//! - `CrossedUp`/`CrossedDown`: return `false` at index 0 and whenever either
//!   side is unstable at the current index. An unstable previous sample counts
//!   as "not yet crossed", so a crossing is reported at the first index where
//!   both sides are defined and on opposite sides.
//! - `StopLoss`/`StopGain`: `false` unless a position is open
//! - `And`: short-circuits on first `false`
//! - `Or`: short-circuits on first `true`
//!
//! Evaluation at index `i` never reads an index greater than `i`.

use tracing::trace;

use crate::domain::indicator::IndicatorRef;
use crate::domain::num::Num;
use crate::domain::position::TradeSide;
use crate::domain::record::TradingRecord;
use crate::domain::rule::Rule;

pub fn evaluate<N: Num>(rule: &Rule<N>, index: usize, record: &TradingRecord<N>) -> bool {
    let satisfied = match rule {
        Rule::CrossedUp { left, right } => match sample(left, right, index) {
            Some(((lp, rp), (lc, rc))) => lc > rc && prior_holds(lp, rp, |l, r| l <= r),
            None => false,
        },
        Rule::CrossedDown { left, right } => match sample(left, right, index) {
            Some(((lp, rp), (lc, rc))) => lc < rc && prior_holds(lp, rp, |l, r| l >= r),
            None => false,
        },
        Rule::StopLoss { price, pct } => excursion(price, *pct, index, record, Excursion::Adverse),
        Rule::StopGain { price, pct } => {
            excursion(price, *pct, index, record, Excursion::Favorable)
        }
        Rule::And(a, b) => evaluate(a, index, record) && evaluate(b, index, record),
        Rule::Or(a, b) => evaluate(a, index, record) || evaluate(b, index, record),
        Rule::Not(inner) => !evaluate(inner, index, record),
    };
    trace!(rule = rule.kind(), index, satisfied, "rule evaluated");
    satisfied
}

type Pair<N> = (Option<N>, Option<N>);

/// Previous and current values of both sides; `None` if no crossing can be
/// judged at `index` (index 0, or a current value still unstable).
fn sample<N: Num>(
    left: &IndicatorRef<N>,
    right: &IndicatorRef<N>,
    index: usize,
) -> Option<(Pair<N>, (N, N))> {
    if index == 0 {
        return None;
    }
    let current = (left.value(index)?, right.value(index)?);
    let previous = (left.value(index - 1), right.value(index - 1));
    Some((previous, current))
}

fn prior_holds<N: Num>(left: Option<N>, right: Option<N>, relation: fn(N, N) -> bool) -> bool {
    match (left, right) {
        (Some(l), Some(r)) => relation(l, r),
        _ => true,
    }
}

#[derive(Clone, Copy)]
enum Excursion {
    Adverse,
    Favorable,
}

fn excursion<N: Num>(
    price: &IndicatorRef<N>,
    pct: N,
    index: usize,
    record: &TradingRecord<N>,
    kind: Excursion,
) -> bool {
    let Some(position) = record.current_position() else {
        return false;
    };
    let Some(current) = price.value(index) else {
        return false;
    };

    let hundred = N::hundred();
    let downward = matches!(
        (position.side, kind),
        (TradeSide::Long, Excursion::Adverse) | (TradeSide::Short, Excursion::Favorable)
    );
    let factor = if downward { hundred - pct } else { hundred + pct };
    // a level outside the representable range is never reached
    let Some(scaled) = position.entry_price.checked_mul(factor) else {
        return false;
    };
    let level = price.series().normalize(scaled / hundred);

    if downward { current <= level } else { current >= level }
}
