//! Stats module - Correlation across merged columns

mod calculator;

pub use calculator::{StatsCalculator, StatsError};
