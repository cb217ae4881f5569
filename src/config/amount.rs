//! Monetary amounts in base units (1 coin = 100_000_000 units).

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const UNITS_PER_COIN: i64 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
pub struct Amount(i64);

impl Amount {
    pub fn from_units(units: i64) -> Self {
        Amount(units)
    }

    pub fn units(self) -> i64 {
        self.0
    }

    /// Convert a floating point coin value, rounding to the nearest unit.
    /// NaN and infinities are rejected.
    pub fn from_coins(coins: f64) -> Result<Self, String> {
        if !coins.is_finite() {
            return Err(format!("invalid coin amount {}", coins));
        }
        let units = (coins * UNITS_PER_COIN as f64).round();
        if units > i64::MAX as f64 || units < i64::MIN as f64 {
            return Err(format!("coin amount {} out of range", coins));
        }
        Ok(Amount(units as i64))
    }
}

impl FromStr for Amount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let coins: f64 = trimmed
            .parse()
            .map_err(|e| format!("cannot parse {:?} as an amount: {}", trimmed, e))?;
        Amount::from_coins(coins)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = UNITS_PER_COIN as u64;
        write!(f, "{}{}.{:08} DUO", sign, abs / per, abs % per)
    }
}
