// Reports module - cash-flow, portfolio valuation and income report generators

pub mod cashflow;
pub mod income;
pub mod portfolio;

pub use cashflow::{OverallReport, ReportAggregator, YearlyReport};
pub use income::{IncomeAggregator, IncomeReport};
pub use portfolio::{PortfolioSummary, PortfolioValuator};
