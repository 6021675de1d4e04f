//! Trade-count based criteria.

use crate::domain::criteria::{Criterion, ratio};
use crate::domain::num::Num;
use crate::domain::record::TradingRecord;
use crate::domain::series::BarSeries;

/// Number of closed positions. Fewer is better.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberOfPositions;

impl<N: Num> Criterion<N> for NumberOfPositions {
    fn name(&self) -> String {
        "number_of_positions".into()
    }

    fn calculate(&self, _series: &BarSeries<N>, record: &TradingRecord<N>) -> N {
        N::from_usize(record.trade_count())
    }

    fn better_than(&self, a: N, b: N) -> bool {
        a < b
    }
}

/// Winning positions / closed positions; 0 when nothing closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageProfitableTrades;

impl<N: Num> Criterion<N> for AverageProfitableTrades {
    fn name(&self) -> String {
        "average_profitable_trades".into()
    }

    fn calculate(&self, series: &BarSeries<N>, record: &TradingRecord<N>) -> N {
        let total = record.trade_count();
        if total == 0 {
            return N::zero();
        }
        let winning = record.positions().iter().filter(|p| p.is_winning()).count();
        series.normalize(N::from_usize(winning) / N::from_usize(total))
    }
}

/// Mean winning profit over mean absolute losing profit.
///
/// No closed positions gives 0. Winners without any loser give
/// `Num::infinity()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewardRiskRatio;

impl<N: Num> Criterion<N> for RewardRiskRatio {
    fn name(&self) -> String {
        "reward_risk_ratio".into()
    }

    fn calculate(&self, series: &BarSeries<N>, record: &TradingRecord<N>) -> N {
        let mut wins = (0usize, N::zero());
        let mut losses = (0usize, N::zero());
        for profit in record.positions().iter().filter_map(|p| p.profit()) {
            if profit > N::zero() {
                wins = (wins.0 + 1, wins.1 + profit);
            } else if profit < N::zero() {
                losses = (losses.0 + 1, losses.1 + profit.abs());
            }
        }

        if losses.0 == 0 {
            return if wins.0 > 0 { N::infinity() } else { N::zero() };
        }
        let reward = wins.1 / N::from_usize(wins.0.max(1));
        let risk = losses.1 / N::from_usize(losses.0);
        series.normalize(ratio(reward, risk))
    }
}
