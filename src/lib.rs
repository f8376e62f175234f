//! Recap - brokerage ledger report engine
//!
//! This library derives financial reports from a normalized sequence of
//! brokerage ledger transactions: per-year and all-time cash-flow summaries,
//! FIFO-matched realized capital gains, end-of-year portfolio valuations with
//! unrealized profit/loss, and dividend/interest income summaries.
//!
//! The crate performs no I/O. Parsing broker exports into [`ledger::Transaction`]
//! records and rendering or exporting the report records are the caller's
//! concern; every entry point here is a pure function over the supplied
//! transaction collection.

pub mod currency;
pub mod error;
pub mod ledger;
pub mod reports;
pub mod tax;
