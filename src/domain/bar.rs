//! OHLCV bar representation.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use crate::domain::num::Num;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Bar<N> {
    pub timestamp: NaiveDateTime,
    pub open: N,
    pub high: N,
    pub low: N,
    pub close: N,
    pub volume: N,
}

/// Which field of a bar a price-reading component looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PriceField {
    Open,
    High,
    Low,
    #[default]
    Close,
    Volume,
    Typical,
}

impl<N: Num> Bar<N> {
    pub fn price(&self, field: PriceField) -> N {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::Volume => self.volume,
            PriceField::Typical => self.typical_price(),
        }
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> N {
        (self.high + self.low + self.close) / N::from_usize(3)
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Volume => "volume",
            PriceField::Typical => "typical",
        };
        f.write_str(name)
    }
}

impl FromStr for PriceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(PriceField::Open),
            "high" => Ok(PriceField::High),
            "low" => Ok(PriceField::Low),
            "close" => Ok(PriceField::Close),
            "volume" => Ok(PriceField::Volume),
            "typical" => Ok(PriceField::Typical),
            other => Err(format!(
                "expected price field (open, high, low, close, volume, typical), found '{}'",
                other
            )),
        }
    }
}
