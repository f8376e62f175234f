// Tax module - realized capital gains (FIFO lot matching)

pub mod cost_basis;

pub use cost_basis::{CapitalGainsCalculator, RealizedGains};
