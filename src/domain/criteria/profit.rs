use crate::domain::criteria::Criterion;
use crate::domain::num::Num;
use crate::domain::record::TradingRecord;
use crate::domain::series::BarSeries;

/// Sum of per-unit profits of closed positions; 0 for an empty record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalProfit;

impl<N: Num> Criterion<N> for TotalProfit {
    fn name(&self) -> String {
        "total_profit".into()
    }

    fn calculate(&self, series: &BarSeries<N>, record: &TradingRecord<N>) -> N {
        let total = record
            .positions()
            .iter()
            .filter_map(|p| p.profit())
            .fold(N::zero(), |acc, p| acc + p);
        series.normalize(total)
    }
}

/// Product of gross returns of closed positions; 1 for an empty record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalReturn;

impl<N: Num> Criterion<N> for TotalReturn {
    fn name(&self) -> String {
        "total_return".into()
    }

    fn calculate(&self, series: &BarSeries<N>, record: &TradingRecord<N>) -> N {
        record
            .positions()
            .iter()
            .filter_map(|p| p.gross_return())
            .fold(N::one(), |acc, r| series.normalize(acc * r))
    }
}
