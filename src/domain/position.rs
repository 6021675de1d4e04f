//! Positions: one entry paired with at most one exit.

use std::fmt;
use std::str::FromStr;

use crate::domain::num::Num;

/// Direction a strategy trades in. Entries buy for `Long`, sell for `Short`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TradeSide {
    #[default]
    Long,
    Short,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Long => f.write_str("long"),
            TradeSide::Short => f.write_str("short"),
        }
    }
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Ok(TradeSide::Long),
            "short" | "sell" => Ok(TradeSide::Short),
            other => Err(format!("expected long or short, found '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Position<N> {
    pub side: TradeSide,
    pub entry_index: usize,
    pub entry_price: N,
    pub exit_index: Option<usize>,
    pub exit_price: Option<N>,
}

impl<N: Num> Position<N> {
    pub fn open(side: TradeSide, entry_index: usize, entry_price: N) -> Self {
        Self {
            side,
            entry_index,
            entry_price,
            exit_index: None,
            exit_price: None,
        }
    }

    /// Close the position. Returns false if it is already closed or the exit
    /// would not come strictly after the entry.
    pub fn close(&mut self, exit_index: usize, exit_price: N) -> bool {
        if self.is_closed() || exit_index <= self.entry_index {
            return false;
        }
        self.exit_index = Some(exit_index);
        self.exit_price = Some(exit_price);
        true
    }

    pub fn is_open(&self) -> bool {
        self.exit_index.is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.exit_index.is_some()
    }

    /// Per-unit profit: `exit - entry` for longs, `entry - exit` for shorts.
    pub fn profit(&self) -> Option<N> {
        let exit = self.exit_price?;
        Some(match self.side {
            TradeSide::Long => exit - self.entry_price,
            TradeSide::Short => self.entry_price - exit,
        })
    }

    /// `exit / entry` for longs, `entry / exit` for shorts. `None` while open
    /// or when the divisor is zero.
    pub fn gross_return(&self) -> Option<N> {
        let exit = self.exit_price?;
        let (num, den) = match self.side {
            TradeSide::Long => (exit, self.entry_price),
            TradeSide::Short => (self.entry_price, exit),
        };
        if den.is_zero() { None } else { Some(num / den) }
    }

    pub fn is_winning(&self) -> bool {
        self.profit().is_some_and(|p| p > N::zero())
    }

    pub fn is_losing(&self) -> bool {
        self.profit().is_some_and(|p| p < N::zero())
    }
}
