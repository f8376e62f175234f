//! Yearly and all-time cash-flow summaries
//!
//! Partitions the ledger by calendar year and accumulates deposits, heuristic
//! capital gains, dividends and interest per year, then rolls the per-year
//! reports into one all-time report.
//!
//! The capital-gains figure here is intentionally simplistic: it sums the
//! positive "result" amounts of sell transactions and ignores losses
//! entirely. The lot-matched calculation lives in [`crate::tax::cost_basis`]
//! and the two are kept separate on purpose.

use chrono::Datelike;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::currency::CurrencyNormalizer;
use crate::ledger::Transaction;

/// Cash-flow summary of one calendar year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct YearlyReport {
    pub year: i32,
    pub deposits: Decimal,
    pub capital_gains: Decimal,
    pub dividends: Decimal,
    pub interest: Decimal,
    pub total_gains: Decimal,
    /// Total gains as a percentage of deposits; zero when nothing was deposited.
    pub percentage: Decimal,
    pub transaction_count: usize,
    pub currency: String,
}

/// All-time roll-up of the yearly reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverallReport {
    pub years: Vec<i32>,
    pub deposits: Decimal,
    pub capital_gains: Decimal,
    pub dividends: Decimal,
    pub interest: Decimal,
    pub total_gains: Decimal,
    pub percentage: Decimal,
    pub transaction_count: usize,
    pub currency: String,
    pub yearly: Vec<YearlyReport>,
}

/// Produces [`YearlyReport`]s and their [`OverallReport`] roll-up.
pub struct ReportAggregator {
    fx: CurrencyNormalizer,
}

impl ReportAggregator {
    pub fn new(base_currency: impl Into<String>) -> Self {
        Self {
            fx: CurrencyNormalizer::new(base_currency),
        }
    }

    /// One report per calendar year present in the ledger, ascending.
    ///
    /// Malformed records contribute zero instead of failing: a deposit
    /// without a total, or a sell without a result, is simply not counted.
    pub fn yearly_reports(&self, transactions: &[Transaction]) -> Vec<YearlyReport> {
        let mut years_map: HashMap<i32, YearlyReport> = HashMap::new();

        for tx in transactions {
            let year = tx.timestamp.year();
            let report = years_map.entry(year).or_insert_with(|| YearlyReport {
                year,
                deposits: Decimal::ZERO,
                capital_gains: Decimal::ZERO,
                dividends: Decimal::ZERO,
                interest: Decimal::ZERO,
                total_gains: Decimal::ZERO,
                percentage: Decimal::ZERO,
                transaction_count: 0,
                currency: self.fx.base_currency().to_string(),
            });

            report.transaction_count += 1;

            if tx.action.is_deposit() {
                if let Some(total) = tx.total {
                    report.deposits +=
                        self.fx
                            .normalize(total, tx.total_currency.as_deref(), tx.exchange_rate);
                }
            } else if tx.action.is_sell() {
                // Positive sell results only; losses are not netted here.
                if let Some(result) = tx.result {
                    let gain =
                        self.fx
                            .normalize(result, tx.result_currency.as_deref(), tx.exchange_rate);
                    if gain > Decimal::ZERO {
                        report.capital_gains += gain;
                    }
                }
            } else if tx.action.is_dividend() {
                if let Some((amount, currency)) = tx.income_amount() {
                    report.dividends += self.fx.normalize(amount, currency, tx.exchange_rate);
                }
            } else if tx.action.is_interest() {
                if let Some((amount, currency)) = tx.income_amount() {
                    report.interest += self.fx.normalize(amount, currency, tx.exchange_rate);
                }
            }
        }

        let mut years: Vec<YearlyReport> = years_map
            .into_values()
            .map(|mut report| {
                report.total_gains = report.capital_gains + report.dividends + report.interest;
                report.percentage = gains_percentage(report.total_gains, report.deposits);
                report
            })
            .collect();

        years.sort_by_key(|r| r.year);
        years
    }

    /// Sum every field across the given yearly reports; the percentage is
    /// recomputed from the summed totals rather than averaged. An empty input
    /// yields an all-zero report in the base currency.
    pub fn overall_report(&self, yearly: &[YearlyReport]) -> OverallReport {
        let mut overall = OverallReport {
            years: Vec::new(),
            deposits: Decimal::ZERO,
            capital_gains: Decimal::ZERO,
            dividends: Decimal::ZERO,
            interest: Decimal::ZERO,
            total_gains: Decimal::ZERO,
            percentage: Decimal::ZERO,
            transaction_count: 0,
            currency: self.fx.base_currency().to_string(),
            yearly: yearly.to_vec(),
        };

        for report in yearly {
            overall.years.push(report.year);
            overall.deposits += report.deposits;
            overall.capital_gains += report.capital_gains;
            overall.dividends += report.dividends;
            overall.interest += report.interest;
            overall.total_gains += report.total_gains;
            overall.transaction_count += report.transaction_count;
        }

        overall.percentage = gains_percentage(overall.total_gains, overall.deposits);
        overall
    }
}

fn gains_percentage(total_gains: Decimal, deposits: Decimal) -> Decimal {
    if deposits.is_zero() {
        Decimal::ZERO
    } else {
        total_gains / deposits * Decimal::from(100)
    }
}
