//! Trading record: the positions produced by one strategy run.

use crate::domain::num::Num;
use crate::domain::position::{Position, TradeSide};

/// Closed positions in entry order plus at most one open position.
///
/// Positions never overlap: a new entry is refused while a position is open
/// or at an index not after the last exit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TradingRecord<N> {
    side: TradeSide,
    positions: Vec<Position<N>>,
    current: Option<Position<N>>,
}

impl<N: Num> TradingRecord<N> {
    pub fn new(side: TradeSide) -> Self {
        Self {
            side,
            positions: Vec::new(),
            current: None,
        }
    }

    /// Record holding just `position`, open or closed.
    pub fn from_position(position: Position<N>) -> Self {
        let mut record = Self::new(position.side);
        if position.is_closed() {
            record.positions.push(position);
        } else {
            record.current = Some(position);
        }
        record
    }

    pub fn side(&self) -> TradeSide {
        self.side
    }

    pub fn is_flat(&self) -> bool {
        self.current.is_none()
    }

    pub fn current_position(&self) -> Option<&Position<N>> {
        self.current.as_ref()
    }

    pub fn enter(&mut self, index: usize, price: N) -> bool {
        if self.current.is_some() {
            return false;
        }
        if let Some(last_exit) = self.positions.last().and_then(|p| p.exit_index) {
            if index <= last_exit {
                return false;
            }
        }
        self.current = Some(Position::open(self.side, index, price));
        true
    }

    pub fn exit(&mut self, index: usize, price: N) -> bool {
        let Some(mut position) = self.current.take() else {
            return false;
        };
        if position.close(index, price) {
            self.positions.push(position);
            true
        } else {
            self.current = Some(position);
            false
        }
    }

    /// Closed positions, in entry order.
    pub fn positions(&self) -> &[Position<N>] {
        &self.positions
    }

    pub fn trade_count(&self) -> usize {
        self.positions.len()
    }

    pub fn last_position(&self) -> Option<&Position<N>> {
        self.positions.last()
    }
}
