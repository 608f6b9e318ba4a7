//! Hashrate with explicit units.
//!
//! The device reports megahashes per second; entities expose terahashes
//! per second. Keeping the value in one newtype makes the conversion
//! happen in exactly one place.

use std::fmt;

use serde::{Deserialize, Serialize};

const MHS_PER_THS: f64 = 1_000_000.0;
const MHS_PER_GHS: f64 = 1_000.0;

/// A hashrate, stored internally in MH/s.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct HashRate(f64);

impl HashRate {
    /// Construct from megahashes per second, the device's native unit.
    pub const fn from_mhs(mhs: f64) -> Self {
        Self(mhs)
    }

    /// Construct from gigahashes per second.
    pub fn from_ghs(ghs: f64) -> Self {
        Self(ghs * MHS_PER_GHS)
    }

    pub const fn as_mhs(self) -> f64 {
        self.0
    }

    /// Terahashes per second: `MH/s / 1_000_000`.
    pub fn as_ths(self) -> f64 {
        self.0 / MHS_PER_THS
    }
}

impl fmt::Display for HashRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} TH/s", self.as_ths())
    }
}
