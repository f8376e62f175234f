//! Point-in-time portfolio valuation
//!
//! Builds weighted-average-cost positions per security over the full ledger
//! history up to an end-of-year cutoff, attaches the last transaction price
//! as a market-price proxy, and computes unrealized profit/loss. Positions
//! are cumulative since inception; the deposit/dividend/interest flow
//! metrics on the same snapshot cover only the snapshot's calendar year.

use chrono::NaiveDateTime;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::currency::CurrencyNormalizer;
use crate::error::{ReportError, Result};
use crate::ledger::Transaction;

/// Shares below this are treated as a fully closed position and dropped at
/// finalization, so fractional residue from partial sells does not linger.
const CLOSED_POSITION_THRESHOLD: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Most recent trade price seen for a security, used as a market-price proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastPrice {
    /// Price per share normalized to the base currency.
    pub price: Decimal,
    /// Price as recorded on the transaction, in its original currency.
    pub source_price: Decimal,
    pub source_currency: String,
    pub date: NaiveDateTime,
}

/// One security's position as of the snapshot cutoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioPosition {
    pub ticker: String,
    pub shares: Decimal,
    pub average_cost: Decimal,
    pub total_cost: Decimal,
    /// Absent when no trade for this security ever carried a price; the
    /// cost basis then stands in for market value and P/L is zero.
    pub last_price: Option<LastPrice>,
    pub market_value: Decimal,
    pub unrealized_gain_loss: Decimal,
    pub unrealized_gain_loss_pct: Decimal,
    pub currency: String,
    pub first_purchase: Option<NaiveDateTime>,
    pub last_purchase: Option<NaiveDateTime>,
    pub transaction_count: usize,
}

/// End-of-year portfolio snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioSummary {
    pub year: i32,
    pub cutoff: NaiveDateTime,
    /// Positions held at the cutoff, sorted by market value descending.
    pub positions: Vec<PortfolioPosition>,
    pub total_shares: Decimal,
    pub total_cost: Decimal,
    pub total_market_value: Decimal,
    pub total_unrealized_gain_loss: Decimal,
    pub total_unrealized_gain_loss_pct: Decimal,
    /// Deposits made during the snapshot year only (not cumulative).
    pub yearly_deposits: Decimal,
    /// Dividends received during the snapshot year only.
    pub yearly_dividends: Decimal,
    /// Interest received during the snapshot year only.
    pub yearly_interest: Decimal,
    pub currency: String,
}

/// Weighted-average-cost accumulator for one security.
#[derive(Debug, Default)]
struct PositionBuilder {
    shares: Decimal,
    total_cost: Decimal,
    first_purchase: Option<NaiveDateTime>,
    last_purchase: Option<NaiveDateTime>,
    transaction_count: usize,
}

impl PositionBuilder {
    fn add_buy(&mut self, date: NaiveDateTime, shares: Decimal, cost: Decimal) {
        self.shares += shares;
        self.total_cost += cost;
        if self.first_purchase.is_none() {
            self.first_purchase = Some(date);
        }
        self.last_purchase = Some(date);
        self.transaction_count += 1;
    }

    /// Remove sold shares at the average cost in effect before the sell.
    /// Inconsistent ledgers could drive either figure negative; both are
    /// floored at zero instead.
    fn remove_sell(&mut self, shares: Decimal) {
        let avg_cost = if self.shares > Decimal::ZERO {
            self.total_cost / self.shares
        } else {
            Decimal::ZERO
        };

        self.total_cost -= shares * avg_cost;
        self.shares -= shares;
        if self.total_cost < Decimal::ZERO {
            self.total_cost = Decimal::ZERO;
        }
        if self.shares < Decimal::ZERO {
            self.shares = Decimal::ZERO;
        }
        self.transaction_count += 1;
    }
}

/// Builds end-of-year portfolio snapshots from the transaction history.
pub struct PortfolioValuator {
    fx: CurrencyNormalizer,
}

impl PortfolioValuator {
    pub fn new(base_currency: impl Into<String>) -> Self {
        Self {
            fx: CurrencyNormalizer::new(base_currency),
        }
    }

    /// Snapshot of the portfolio as of Dec 31, 23:59:59 of `year`.
    ///
    /// All transactions up to the cutoff participate, in their given order.
    /// The only error is a `year` outside the representable calendar range;
    /// malformed transactions are skipped, never fatal.
    pub fn end_of_year_portfolio(
        &self,
        transactions: &[Transaction],
        year: i32,
    ) -> Result<PortfolioSummary> {
        let cutoff = year_end_cutoff(year)?;

        let mut positions: HashMap<String, PositionBuilder> = HashMap::new();
        let mut last_prices: HashMap<String, LastPrice> = HashMap::new();

        for tx in transactions.iter().filter(|tx| tx.timestamp <= cutoff) {
            if !tx.action.is_trade() {
                continue;
            }
            let Some(ticker) = tx.ticker.as_deref() else {
                continue;
            };

            // Keep one last-seen price slot per ticker, in input order.
            if let Some(price) = tx.price_per_share.filter(|p| *p > Decimal::ZERO) {
                let normalized =
                    self.fx
                        .normalize(price, tx.price_currency.as_deref(), tx.exchange_rate);
                last_prices.insert(
                    ticker.to_string(),
                    LastPrice {
                        price: normalized,
                        source_price: price,
                        source_currency: tx
                            .price_currency
                            .clone()
                            .unwrap_or_else(|| self.fx.base_currency().to_string()),
                        date: tx.timestamp,
                    },
                );
            }

            if tx.action.is_buy() {
                let (Some(shares), Some(total)) = (tx.shares, tx.total) else {
                    debug!(ticker, "buy missing shares or total, skipping");
                    continue;
                };
                let cost =
                    self.fx
                        .normalize(total, tx.total_currency.as_deref(), tx.exchange_rate);
                positions
                    .entry(ticker.to_string())
                    .or_default()
                    .add_buy(tx.timestamp, shares, cost);
            } else {
                let Some(shares) = tx.shares else {
                    debug!(ticker, "sell missing shares, skipping");
                    continue;
                };
                positions
                    .entry(ticker.to_string())
                    .or_default()
                    .remove_sell(shares);
            }
        }

        let mut finalized: Vec<PortfolioPosition> = positions
            .into_iter()
            .filter(|(_, builder)| builder.shares > CLOSED_POSITION_THRESHOLD)
            .map(|(ticker, builder)| {
                self.finalize_position(ticker, builder, &last_prices)
            })
            .collect();

        finalized.sort_by(|a, b| {
            b.market_value
                .cmp(&a.market_value)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });

        let mut total_shares = Decimal::ZERO;
        let mut total_cost = Decimal::ZERO;
        let mut total_market_value = Decimal::ZERO;
        for position in &finalized {
            total_shares += position.shares;
            total_cost += position.total_cost;
            total_market_value += position.market_value;
        }
        let total_unrealized_gain_loss = total_market_value - total_cost;

        let mut summary = PortfolioSummary {
            year,
            cutoff,
            positions: finalized,
            total_shares,
            total_cost,
            total_market_value,
            total_unrealized_gain_loss,
            total_unrealized_gain_loss_pct: unrealized_percentage(
                total_unrealized_gain_loss,
                total_cost,
            ),
            yearly_deposits: Decimal::ZERO,
            yearly_dividends: Decimal::ZERO,
            yearly_interest: Decimal::ZERO,
            currency: self.fx.base_currency().to_string(),
        };

        // Flow metrics cover the snapshot year only, unlike the positions.
        for tx in transactions.iter().filter(|tx| tx.year() == year) {
            if tx.action.is_deposit() {
                if let Some(total) = tx.total {
                    summary.yearly_deposits +=
                        self.fx
                            .normalize(total, tx.total_currency.as_deref(), tx.exchange_rate);
                }
            } else if tx.action.is_dividend() {
                if let Some((amount, currency)) = tx.income_amount() {
                    summary.yearly_dividends +=
                        self.fx.normalize(amount, currency, tx.exchange_rate);
                }
            } else if tx.action.is_interest() {
                if let Some((amount, currency)) = tx.income_amount() {
                    summary.yearly_interest +=
                        self.fx.normalize(amount, currency, tx.exchange_rate);
                }
            }
        }

        Ok(summary)
    }

    /// One snapshot per calendar year that saw at least one trade or
    /// deposit, ascending. Each year is computed independently over the
    /// full history up to its cutoff.
    pub fn portfolio_valuation(&self, transactions: &[Transaction]) -> Result<Vec<PortfolioSummary>> {
        transactions
            .iter()
            .filter(|tx| tx.action.is_trade() || tx.action.is_deposit())
            .map(|tx| tx.year())
            .unique()
            .sorted()
            .map(|year| self.end_of_year_portfolio(transactions, year))
            .collect()
    }

    fn finalize_position(
        &self,
        ticker: String,
        builder: PositionBuilder,
        last_prices: &HashMap<String, LastPrice>,
    ) -> PortfolioPosition {
        let average_cost = if builder.shares > Decimal::ZERO {
            builder.total_cost / builder.shares
        } else {
            Decimal::ZERO
        };

        let last_price = last_prices.get(&ticker).cloned();
        let (market_value, unrealized) = match &last_price {
            Some(lp) => {
                let value = builder.shares * lp.price;
                (value, value - builder.total_cost)
            }
            // No trade ever carried a price: value the position at cost.
            None => (builder.total_cost, Decimal::ZERO),
        };

        PortfolioPosition {
            ticker,
            shares: builder.shares,
            average_cost,
            total_cost: builder.total_cost,
            last_price,
            market_value,
            unrealized_gain_loss: unrealized,
            unrealized_gain_loss_pct: unrealized_percentage(unrealized, builder.total_cost),
            currency: self.fx.base_currency().to_string(),
            first_purchase: builder.first_purchase,
            last_purchase: builder.last_purchase,
            transaction_count: builder.transaction_count,
        }
    }
}

fn year_end_cutoff(year: i32) -> Result<NaiveDateTime> {
    let cutoff = chrono::NaiveDate::from_ymd_opt(year, 12, 31)
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .ok_or(ReportError::InvalidYear(year))?;
    Ok(cutoff)
}

fn unrealized_percentage(unrealized: Decimal, total_cost: Decimal) -> Decimal {
    if total_cost > Decimal::ZERO {
        unrealized / total_cost * Decimal::from(100)
    } else {
        Decimal::ZERO
    }
}
