//! Core types shared across the crate.

mod hashrate;
mod modes;

pub use hashrate::HashRate;
pub use modes::{SystemStatus, WorkLevel, WorkMode};
