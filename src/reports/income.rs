//! Dividend and interest income reports
//!
//! Classifies income-like ledger records by the same loose substring
//! heuristics as the rest of the crate, normalizes amounts and withholding
//! tax to the base currency, and aggregates per security/source, per year
//! and per month.

use chrono::{Datelike, NaiveDateTime};
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::currency::CurrencyNormalizer;
use crate::ledger::{contains_ignore_case, Transaction};

/// Where an interest payment came from, parsed from free-text notes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum InterestSource {
    Cash,
    Margin,
    Account,
    Unknown,
}

/// Payment cadence of an interest record, parsed from free-text notes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum InterestPeriod {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
    Unknown,
}

fn detect_source(text: &str) -> Option<InterestSource> {
    if contains_ignore_case(text, "cash") {
        Some(InterestSource::Cash)
    } else if contains_ignore_case(text, "margin") {
        Some(InterestSource::Margin)
    } else if contains_ignore_case(text, "account") {
        Some(InterestSource::Account)
    } else {
        None
    }
}

fn detect_period(text: &str) -> Option<InterestPeriod> {
    if contains_ignore_case(text, "daily") {
        Some(InterestPeriod::Daily)
    } else if contains_ignore_case(text, "weekly") {
        Some(InterestPeriod::Weekly)
    } else if contains_ignore_case(text, "monthly") {
        Some(InterestPeriod::Monthly)
    } else if contains_ignore_case(text, "quarterly") {
        Some(InterestPeriod::Quarterly)
    } else if contains_ignore_case(text, "annual") {
        Some(InterestPeriod::Annual)
    } else {
        None
    }
}

/// One dividend payment, normalized to the base currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DividendRecord {
    pub date: NaiveDateTime,
    pub ticker: Option<String>,
    pub isin: Option<String>,
    pub security_name: Option<String>,
    pub amount: Decimal,
    /// Currency the payment was recorded in (the amounts themselves are
    /// base-currency once an exchange rate was available).
    pub currency: String,
    pub exchange_rate: Option<Decimal>,
    pub withholding_tax: Decimal,
    pub net_amount: Decimal,
    /// Payout relative to position value when the record carries price and
    /// share data; zero otherwise and excluded from averages.
    pub yield_pct: Decimal,
}

impl DividendRecord {
    pub fn security_key(&self) -> String {
        self.ticker
            .clone()
            .or_else(|| self.isin.clone())
            .or_else(|| self.security_name.clone())
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }

    fn month_key(&self) -> String {
        month_key(self.date)
    }
}

/// One interest payment, normalized to the base currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterestRecord {
    pub date: NaiveDateTime,
    pub ticker: Option<String>,
    pub isin: Option<String>,
    pub security_name: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub exchange_rate: Option<Decimal>,
    pub net_amount: Decimal,
    pub source: InterestSource,
    pub period: InterestPeriod,
    /// Effective rate when the caller can attribute a principal to the
    /// payment; zero otherwise and excluded from averages.
    pub rate_pct: Decimal,
}

impl InterestRecord {
    fn month_key(&self) -> String {
        month_key(self.date)
    }
}

/// Aggregated dividend income.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DividendSummary {
    pub total: Decimal,
    pub total_withholding: Decimal,
    pub net_dividends: Decimal,
    pub count: usize,
    pub average_yield_pct: Decimal,
    pub by_security: BTreeMap<String, Decimal>,
    pub by_year: BTreeMap<i32, Decimal>,
    pub by_month: BTreeMap<String, Decimal>,
}

/// Aggregated interest income.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterestSummary {
    pub total: Decimal,
    pub count: usize,
    pub average_rate_pct: Decimal,
    pub by_source: BTreeMap<InterestSource, Decimal>,
    pub by_year: BTreeMap<i32, Decimal>,
    pub by_month: BTreeMap<String, Decimal>,
}

/// Combined income report over the whole ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncomeReport {
    pub dividends: DividendSummary,
    pub interest: InterestSummary,
    /// Net dividends plus gross interest.
    pub total_income: Decimal,
    /// Earliest/latest timestamp across the entire input, not only the
    /// income records; `None` for an empty ledger.
    pub from_date: Option<NaiveDateTime>,
    pub to_date: Option<NaiveDateTime>,
    pub currency: String,
}

/// Extracts and aggregates dividend/interest income.
pub struct IncomeAggregator {
    fx: CurrencyNormalizer,
}

impl IncomeAggregator {
    pub fn new(base_currency: impl Into<String>) -> Self {
        Self {
            fx: CurrencyNormalizer::new(base_currency),
        }
    }

    /// One record per transaction whose action text contains "dividend".
    /// Records without a usable amount are skipped.
    pub fn dividend_records(&self, transactions: &[Transaction]) -> Vec<DividendRecord> {
        transactions
            .iter()
            .filter(|tx| tx.action.is_dividend())
            .filter_map(|tx| self.extract_dividend(tx))
            .collect()
    }

    /// One record per transaction whose action text contains "interest".
    pub fn interest_records(&self, transactions: &[Transaction]) -> Vec<InterestRecord> {
        transactions
            .iter()
            .filter(|tx| tx.action.is_interest())
            .filter_map(|tx| self.extract_interest(tx))
            .collect()
    }

    /// Full income report: both summaries, combined total income, and the
    /// date range of the input. Empty input yields an all-zero report.
    pub fn income_report(&self, transactions: &[Transaction]) -> IncomeReport {
        let dividends = self.summarize_dividends(&self.dividend_records(transactions));
        let interest = self.summarize_interest(&self.interest_records(transactions));
        let total_income = dividends.net_dividends + interest.total;

        let from_date = transactions.iter().map(|tx| tx.timestamp).min();
        let to_date = transactions.iter().map(|tx| tx.timestamp).max();

        IncomeReport {
            dividends,
            interest,
            total_income,
            from_date,
            to_date,
            currency: self.fx.base_currency().to_string(),
        }
    }

    fn extract_dividend(&self, tx: &Transaction) -> Option<DividendRecord> {
        let Some((amount, currency)) = tx.income_amount() else {
            debug!(action = tx.action.label(), "dividend without amount, skipping");
            return None;
        };
        let currency = currency.unwrap_or(self.fx.base_currency()).to_string();
        let withholding = tx.withholding_tax.unwrap_or(Decimal::ZERO);
        let net = amount - withholding;

        let normalized_amount = self
            .fx
            .normalize(amount, Some(currency.as_str()), tx.exchange_rate);
        let yield_pct = match (tx.price_per_share, tx.shares) {
            (Some(price), Some(shares)) => {
                let price = self
                    .fx
                    .normalize(price, tx.price_currency.as_deref(), tx.exchange_rate);
                dividend_yield(normalized_amount, price, shares)
            }
            _ => Decimal::ZERO,
        };

        Some(DividendRecord {
            date: tx.timestamp,
            ticker: tx.ticker.clone(),
            isin: tx.isin.clone(),
            security_name: tx.security_name.clone(),
            amount: normalized_amount,
            withholding_tax: self
                .fx
                .normalize(withholding, Some(currency.as_str()), tx.exchange_rate),
            net_amount: self.fx.normalize(net, Some(currency.as_str()), tx.exchange_rate),
            currency,
            exchange_rate: tx.exchange_rate,
            yield_pct,
        })
    }

    fn extract_interest(&self, tx: &Transaction) -> Option<InterestRecord> {
        let Some((amount, currency)) = tx.income_amount() else {
            debug!(action = tx.action.label(), "interest without amount, skipping");
            return None;
        };
        let currency = currency.unwrap_or(self.fx.base_currency()).to_string();
        let normalized = self
            .fx
            .normalize(amount, Some(currency.as_str()), tx.exchange_rate);

        // Notes drive source/period detection; the action text itself is the
        // fallback so that records like "Cash interest - monthly" with empty
        // notes still classify.
        let haystacks = [tx.notes.as_deref(), Some(tx.action.label())];
        let source = haystacks
            .iter()
            .flatten()
            .find_map(|text| detect_source(text))
            .unwrap_or(InterestSource::Unknown);
        let period = haystacks
            .iter()
            .flatten()
            .find_map(|text| detect_period(text))
            .unwrap_or(InterestPeriod::Unknown);

        Some(InterestRecord {
            date: tx.timestamp,
            ticker: tx.ticker.clone(),
            isin: tx.isin.clone(),
            security_name: tx.security_name.clone(),
            amount: normalized,
            currency,
            exchange_rate: tx.exchange_rate,
            net_amount: normalized,
            source,
            period,
            rate_pct: Decimal::ZERO,
        })
    }

    fn summarize_dividends(&self, records: &[DividendRecord]) -> DividendSummary {
        let mut summary = DividendSummary {
            total: Decimal::ZERO,
            total_withholding: Decimal::ZERO,
            net_dividends: Decimal::ZERO,
            count: records.len(),
            average_yield_pct: Decimal::ZERO,
            by_security: BTreeMap::new(),
            by_year: BTreeMap::new(),
            by_month: BTreeMap::new(),
        };

        for record in records {
            summary.total += record.amount;
            summary.total_withholding += record.withholding_tax;
            summary.net_dividends += record.net_amount;
            *summary
                .by_security
                .entry(record.security_key())
                .or_default() += record.amount;
            *summary.by_year.entry(record.date.year()).or_default() += record.amount;
            *summary.by_month.entry(record.month_key()).or_default() += record.amount;
        }

        summary.average_yield_pct =
            nonzero_average(records.iter().map(|r| r.yield_pct));
        summary
    }

    fn summarize_interest(&self, records: &[InterestRecord]) -> InterestSummary {
        let mut summary = InterestSummary {
            total: Decimal::ZERO,
            count: records.len(),
            average_rate_pct: Decimal::ZERO,
            by_source: BTreeMap::new(),
            by_year: BTreeMap::new(),
            by_month: BTreeMap::new(),
        };

        for record in records {
            summary.total += record.amount;
            *summary.by_source.entry(record.source).or_default() += record.amount;
            *summary.by_year.entry(record.date.year()).or_default() += record.amount;
            *summary.by_month.entry(record.month_key()).or_default() += record.amount;
        }

        summary.average_rate_pct = nonzero_average(records.iter().map(|r| r.rate_pct));
        summary
    }
}

/// Combined dividend + interest income of one calendar month.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MonthlyIncome {
    pub dividends: Decimal,
    pub interest: Decimal,
    pub total: Decimal,
}

/// Top dividend-paying securities by gross amount, descending.
pub fn top_dividend_payers(records: &[DividendRecord], limit: usize) -> Vec<(String, Decimal)> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for record in records {
        *totals.entry(record.security_key()).or_default() += record.amount;
    }

    totals
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .take(limit)
        .collect()
}

/// Merge per-month dividend and interest sums, keyed by `"YYYY-MM"`.
pub fn monthly_income_breakdown(
    dividends: &[DividendRecord],
    interest: &[InterestRecord],
) -> BTreeMap<String, MonthlyIncome> {
    let mut months: BTreeMap<String, MonthlyIncome> = BTreeMap::new();

    for record in dividends {
        let entry = months.entry(record.month_key()).or_default();
        entry.dividends += record.amount;
        entry.total += record.amount;
    }
    for record in interest {
        let entry = months.entry(record.month_key()).or_default();
        entry.interest += record.amount;
        entry.total += record.amount;
    }

    months
}

/// Payout as a percentage of position value; zero on any invalid input.
pub fn dividend_yield(amount: Decimal, price: Decimal, shares: Decimal) -> Decimal {
    let position_value = price * shares;
    if position_value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    amount / position_value * Decimal::from(100)
}

/// Annualized interest rate for a payment on a known principal over a known
/// number of days; zero on any invalid input.
pub fn effective_interest_rate(amount: Decimal, principal: Decimal, days: Decimal) -> Decimal {
    if principal <= Decimal::ZERO || days <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    amount / principal * (Decimal::from(365) / days) * Decimal::from(100)
}

fn month_key(date: NaiveDateTime) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

fn nonzero_average(values: impl Iterator<Item = Decimal>) -> Decimal {
    let nonzero: Vec<Decimal> = values.filter(|v| !v.is_zero()).collect();
    if nonzero.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = nonzero.iter().sum();
    sum / Decimal::from(nonzero.len() as i64)
}
