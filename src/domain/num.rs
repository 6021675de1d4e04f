//! Numeric representation shared by every computation of a run.
//!
//! A run picks exactly one `Num` type: `f64`, `f32`, or `rust_decimal::Decimal`.
//! Bars, indicators, rules and criteria are all generic over that single type,
//! so representations can never be mixed inside one computation.
//!
//! `Precision` only affects `Decimal`: every value entering the engine and every
//! derived value is rounded to `scale` fractional digits with the configured
//! rounding mode. Floats ignore it.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;

/// Largest scale `rust_decimal` can represent.
pub const MAX_DECIMAL_SCALE: u32 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rounding {
    HalfUp,
    HalfEven,
    HalfDown,
    Up,
    Down,
    Ceiling,
    Floor,
}

impl Rounding {
    fn strategy(self) -> RoundingStrategy {
        match self {
            Rounding::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            Rounding::HalfEven => RoundingStrategy::MidpointNearestEven,
            Rounding::HalfDown => RoundingStrategy::MidpointTowardZero,
            Rounding::Up => RoundingStrategy::AwayFromZero,
            Rounding::Down => RoundingStrategy::ToZero,
            Rounding::Ceiling => RoundingStrategy::ToPositiveInfinity,
            Rounding::Floor => RoundingStrategy::ToNegativeInfinity,
        }
    }
}

impl FromStr for Rounding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "half_up" => Ok(Rounding::HalfUp),
            "half_even" => Ok(Rounding::HalfEven),
            "half_down" => Ok(Rounding::HalfDown),
            "up" => Ok(Rounding::Up),
            "down" => Ok(Rounding::Down),
            "ceiling" => Ok(Rounding::Ceiling),
            "floor" => Ok(Rounding::Floor),
            other => Err(format!(
                "unknown rounding mode '{}' (expected half_up, half_even, half_down, up, down, ceiling, floor)",
                other
            )),
        }
    }
}

/// Fixed-decimal policy: number of fractional digits plus rounding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
    pub scale: u32,
    pub rounding: Rounding,
}

impl Default for Precision {
    fn default() -> Self {
        Precision {
            scale: 16,
            rounding: Rounding::HalfUp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatBits {
    F32,
    F64,
}

/// The numeric representation selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumMode {
    Decimal(Precision),
    Float(FloatBits),
}

impl NumMode {
    /// Precision to hand to a `BarSeries`; floats get the (ignored) default.
    pub fn precision(&self) -> Precision {
        match self {
            NumMode::Decimal(p) => *p,
            NumMode::Float(_) => Precision::default(),
        }
    }
}

impl Default for NumMode {
    fn default() -> Self {
        NumMode::Decimal(Precision::default())
    }
}

impl fmt::Display for NumMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumMode::Decimal(p) => write!(f, "decimal(scale={}, {:?})", p.scale, p.rounding),
            NumMode::Float(FloatBits::F32) => write!(f, "float32"),
            NumMode::Float(FloatBits::F64) => write!(f, "float64"),
        }
    }
}

pub trait Num:
    Copy
    + fmt::Debug
    + fmt::Display
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Send
    + Sync
    + 'static
{
    const KIND: &'static str;

    fn zero() -> Self;

    fn one() -> Self;

    fn from_usize(n: usize) -> Self;

    /// `None` for values the representation cannot hold (NaN, infinities, overflow).
    fn from_f64(value: f64) -> Option<Self>;

    /// Parse decimal text directly, without going through `f64`.
    fn parse(text: &str) -> Option<Self>;

    /// Sentinel for "unbounded" criterion results.
    ///
    /// `Decimal` has no infinity, so `Decimal::MAX` stands in for it.
    fn infinity() -> Self;

    fn round_to(self, precision: &Precision) -> Self;

    /// `None` when the sum leaves the representable range.
    fn checked_add(self, rhs: Self) -> Option<Self>;

    /// `None` when the product leaves the representable range.
    fn checked_mul(self, rhs: Self) -> Option<Self>;

    fn hundred() -> Self {
        Self::from_usize(100)
    }

    fn is_zero(self) -> bool {
        self == Self::zero()
    }

    fn abs(self) -> Self {
        if self < Self::zero() { -self } else { self }
    }

    fn is_infinite(self) -> bool {
        self == Self::infinity() || self == -Self::infinity()
    }
}

impl Num for f64 {
    const KIND: &'static str = "float64";

    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    fn from_usize(n: usize) -> Self {
        n as f64
    }

    fn from_f64(value: f64) -> Option<Self> {
        value.is_finite().then_some(value)
    }

    fn parse(text: &str) -> Option<Self> {
        text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    fn infinity() -> Self {
        f64::INFINITY
    }

    fn round_to(self, _precision: &Precision) -> Self {
        self
    }

    fn checked_add(self, rhs: Self) -> Option<Self> {
        Some(self + rhs).filter(|v| v.is_finite())
    }

    fn checked_mul(self, rhs: Self) -> Option<Self> {
        Some(self * rhs).filter(|v| v.is_finite())
    }
}

impl Num for f32 {
    const KIND: &'static str = "float32";

    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    fn from_usize(n: usize) -> Self {
        n as f32
    }

    fn from_f64(value: f64) -> Option<Self> {
        let narrowed = value as f32;
        (value.is_finite() && narrowed.is_finite()).then_some(narrowed)
    }

    fn parse(text: &str) -> Option<Self> {
        text.trim().parse::<f32>().ok().filter(|v| v.is_finite())
    }

    fn infinity() -> Self {
        f32::INFINITY
    }

    fn round_to(self, _precision: &Precision) -> Self {
        self
    }

    fn checked_add(self, rhs: Self) -> Option<Self> {
        Some(self + rhs).filter(|v| v.is_finite())
    }

    fn checked_mul(self, rhs: Self) -> Option<Self> {
        Some(self * rhs).filter(|v| v.is_finite())
    }
}

impl Num for Decimal {
    const KIND: &'static str = "decimal";

    fn zero() -> Self {
        Decimal::ZERO
    }

    fn one() -> Self {
        Decimal::ONE
    }

    fn from_usize(n: usize) -> Self {
        Decimal::from(n)
    }

    fn from_f64(value: f64) -> Option<Self> {
        <Decimal as FromPrimitive>::from_f64(value)
    }

    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()
    }

    fn infinity() -> Self {
        Decimal::MAX
    }

    fn round_to(self, precision: &Precision) -> Self {
        self.round_dp_with_strategy(
            precision.scale.min(MAX_DECIMAL_SCALE),
            precision.rounding.strategy(),
        )
    }

    fn checked_add(self, rhs: Self) -> Option<Self> {
        Decimal::checked_add(self, rhs)
    }

    fn checked_mul(self, rhs: Self) -> Option<Self> {
        Decimal::checked_mul(self, rhs)
    }
}
