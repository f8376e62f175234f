//! FIFO realized capital gains
//!
//! Per security, sells are matched against a first-in-first-out queue of
//! prior purchase lots. Gains and losses are accumulated as separate
//! non-negative totals and never netted against each other.
//!
//! This is one of three coexisting cost-basis views in the crate: the yearly
//! cash-flow report uses raw positive sell proceeds and the portfolio
//! valuation uses weighted-average cost. The divergence is intentional; see
//! DESIGN.md before trying to unify them.

use chrono::NaiveDateTime;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::currency::CurrencyNormalizer;
use crate::ledger::Transaction;

/// One purchased quantity of a security, consumed oldest-first by later
/// sells. Remaining shares are decremented in place; exhausted lots stay in
/// the queue and are skipped on subsequent sells.
#[derive(Debug, Clone)]
pub struct PurchaseLot {
    pub date: NaiveDateTime,
    pub remaining_shares: Decimal,
    /// Price per share, already normalized to the base currency.
    pub price_per_share: Decimal,
    pub cost: Decimal,
}

/// Realized gains/losses of one security.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TickerRealized {
    pub gains: Decimal,
    pub losses: Decimal,
}

/// Full realized-gains report with per-security breakdown and diagnostic
/// counters for the silently-degraded cases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealizedGains {
    pub total_gains: Decimal,
    pub total_losses: Decimal,
    pub by_ticker: BTreeMap<String, TickerRealized>,
    /// Trades that could not participate because a required numeric field
    /// (shares, price per share) was missing.
    pub skipped_transactions: usize,
    /// Sell shares that found no prior lot to match against. The excess
    /// contributes no gain or loss; see the oversell note below.
    pub unmatched_sell_shares: Decimal,
    pub currency: String,
}

impl RealizedGains {
    fn new(currency: &str) -> Self {
        Self {
            total_gains: Decimal::ZERO,
            total_losses: Decimal::ZERO,
            by_ticker: BTreeMap::new(),
            skipped_transactions: 0,
            unmatched_sell_shares: Decimal::ZERO,
            currency: currency.to_string(),
        }
    }
}

/// FIFO matcher over the time-ordered trade history of one security.
struct FifoMatcher {
    lots: Vec<PurchaseLot>,
    gains: Decimal,
    losses: Decimal,
    unmatched_shares: Decimal,
}

impl FifoMatcher {
    fn new() -> Self {
        Self {
            lots: Vec::new(),
            gains: Decimal::ZERO,
            losses: Decimal::ZERO,
            unmatched_shares: Decimal::ZERO,
        }
    }

    fn add_purchase(&mut self, date: NaiveDateTime, shares: Decimal, price_per_share: Decimal) {
        self.lots.push(PurchaseLot {
            date,
            remaining_shares: shares,
            price_per_share,
            cost: shares * price_per_share,
        });
    }

    /// Consume lots oldest-first until the sell is fully matched or the
    /// queue is exhausted. Any unmatched excess is dropped without effect:
    /// share inflows the ledger does not model as buys (transfers, splits)
    /// would otherwise produce a phantom cost basis.
    fn match_sale(&mut self, ticker: &str, shares: Decimal, sell_price: Decimal) {
        let mut remaining = shares;

        for lot in self.lots.iter_mut() {
            if remaining.is_zero() {
                break;
            }
            if lot.remaining_shares <= Decimal::ZERO {
                continue;
            }

            let matched = remaining.min(lot.remaining_shares);
            let result = matched * (sell_price - lot.price_per_share);
            if result > Decimal::ZERO {
                self.gains += result;
            } else {
                self.losses += result.abs();
            }

            lot.remaining_shares -= matched;
            remaining -= matched;
        }

        if remaining > Decimal::ZERO {
            debug!(
                ticker,
                unmatched = %remaining,
                "sell exceeds recorded purchase lots, dropping excess"
            );
            self.unmatched_shares += remaining;
        }
    }
}

/// Computes realized capital gains by FIFO lot matching.
pub struct CapitalGainsCalculator {
    fx: CurrencyNormalizer,
}

impl CapitalGainsCalculator {
    pub fn new(base_currency: impl Into<String>) -> Self {
        Self {
            fx: CurrencyNormalizer::new(base_currency),
        }
    }

    /// Total realized `(gains, losses)` across all securities, both
    /// non-negative. Projection of [`CapitalGainsCalculator::realized_gains`].
    pub fn capital_gains(&self, transactions: &[Transaction]) -> (Decimal, Decimal) {
        let report = self.realized_gains(transactions);
        (report.total_gains, report.total_losses)
    }

    /// Full realized-gains report.
    ///
    /// Trades are partitioned by ticker (trades without one are excluded)
    /// and processed in ascending timestamp order per ticker. Buys push a
    /// lot; sells consume the oldest lots first. Trades missing shares or
    /// price are skipped and counted, never raised as errors.
    pub fn realized_gains(&self, transactions: &[Transaction]) -> RealizedGains {
        let mut report = RealizedGains::new(self.fx.base_currency());

        let by_ticker = transactions
            .iter()
            .filter(|tx| tx.action.is_trade())
            .filter(|tx| {
                if tx.ticker.is_none() {
                    trace!("trade without ticker excluded from realized gains");
                }
                tx.ticker.is_some()
            })
            .into_group_map_by(|tx| tx.ticker.clone().unwrap_or_default());

        for (ticker, mut trades) in by_ticker.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
            trades.sort_by_key(|tx| tx.timestamp);

            let mut matcher = FifoMatcher::new();
            for tx in trades {
                let (Some(shares), Some(price)) = (tx.shares, tx.price_per_share) else {
                    debug!(
                        ticker = ticker.as_str(),
                        action = tx.action.label(),
                        "trade missing shares or price, skipping"
                    );
                    report.skipped_transactions += 1;
                    continue;
                };

                let price =
                    self.fx
                        .normalize(price, tx.price_currency.as_deref(), tx.exchange_rate);

                if tx.action.is_buy() {
                    matcher.add_purchase(tx.timestamp, shares, price);
                } else {
                    matcher.match_sale(&ticker, shares, price);
                }
            }

            report.total_gains += matcher.gains;
            report.total_losses += matcher.losses;
            report.unmatched_sell_shares += matcher.unmatched_shares;
            if !matcher.gains.is_zero() || !matcher.losses.is_zero() {
                report.by_ticker.insert(
                    ticker,
                    TickerRealized {
                        gains: matcher.gains,
                        losses: matcher.losses,
                    },
                );
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TransactionAction;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    fn make_trade(
        action: TransactionAction,
        ticker: &str,
        timestamp: NaiveDateTime,
        shares: Decimal,
        price: Decimal,
    ) -> Transaction {
        Transaction {
            action,
            timestamp,
            ticker: Some(ticker.to_string()),
            isin: None,
            security_name: None,
            shares: Some(shares),
            price_per_share: Some(price),
            price_currency: Some("EUR".to_string()),
            exchange_rate: None,
            result: None,
            result_currency: None,
            total: None,
            total_currency: None,
            withholding_tax: None,
            notes: None,
        }
    }

    fn buy(ticker: &str, timestamp: NaiveDateTime, shares: Decimal, price: Decimal) -> Transaction {
        make_trade(TransactionAction::MarketBuy, ticker, timestamp, shares, price)
    }

    fn sell(ticker: &str, timestamp: NaiveDateTime, shares: Decimal, price: Decimal) -> Transaction {
        make_trade(TransactionAction::MarketSell, ticker, timestamp, shares, price)
    }

    #[test]
    fn test_sell_matches_oldest_lot_first() {
        let transactions = vec![
            buy("ACME", ts(2023, 1, 10), dec!(10), dec!(100)),
            buy("ACME", ts(2023, 2, 10), dec!(10), dec!(110)),
            sell("ACME", ts(2023, 3, 10), dec!(10), dec!(120)),
        ];

        let calc = CapitalGainsCalculator::new("EUR");
        let (gains, losses) = calc.capital_gains(&transactions);
        assert_eq!(gains, dec!(200));
        assert_eq!(losses, Decimal::ZERO);
    }

    #[test]
    fn test_sell_spanning_multiple_lots() {
        let transactions = vec![
            buy("ACME", ts(2023, 1, 10), dec!(10), dec!(100)),
            buy("ACME", ts(2023, 2, 10), dec!(10), dec!(110)),
            sell("ACME", ts(2023, 3, 10), dec!(15), dec!(120)),
        ];

        let calc = CapitalGainsCalculator::new("EUR");
        let (gains, losses) = calc.capital_gains(&transactions);
        // 10 x (120-100) from the first lot, 5 x (120-110) from the second.
        assert_eq!(gains, dec!(250));
        assert_eq!(losses, Decimal::ZERO);
    }

    #[test]
    fn test_gains_and_losses_tracked_separately() {
        let transactions = vec![
            buy("ACME", ts(2023, 1, 10), dec!(10), dec!(100)),
            sell("ACME", ts(2023, 2, 10), dec!(5), dec!(120)),
            sell("ACME", ts(2023, 3, 10), dec!(5), dec!(80)),
        ];

        let calc = CapitalGainsCalculator::new("EUR");
        let (gains, losses) = calc.capital_gains(&transactions);
        assert_eq!(gains, dec!(100));
        assert_eq!(losses, dec!(100));
    }

    #[test]
    fn test_exhausted_lots_are_skipped_not_removed() {
        let transactions = vec![
            buy("ACME", ts(2023, 1, 10), dec!(5), dec!(100)),
            buy("ACME", ts(2023, 2, 10), dec!(5), dec!(200)),
            sell("ACME", ts(2023, 3, 10), dec!(5), dec!(150)),
            sell("ACME", ts(2023, 4, 10), dec!(5), dec!(150)),
        ];

        let calc = CapitalGainsCalculator::new("EUR");
        let (gains, losses) = calc.capital_gains(&transactions);
        // First sell: 5 x (150-100); second sell matches the 200 lot.
        assert_eq!(gains, dec!(250));
        assert_eq!(losses, dec!(250));
    }

    #[test]
    fn test_oversell_excess_is_dropped_silently() {
        let transactions = vec![
            buy("ACME", ts(2023, 1, 10), dec!(5), dec!(100)),
            sell("ACME", ts(2023, 2, 10), dec!(8), dec!(120)),
        ];

        let calc = CapitalGainsCalculator::new("EUR");
        let report = calc.realized_gains(&transactions);
        // Only the 5 matched shares contribute; the 3 excess shares vanish.
        assert_eq!(report.total_gains, dec!(100));
        assert_eq!(report.total_losses, Decimal::ZERO);
        assert_eq!(report.unmatched_sell_shares, dec!(3));
    }

    #[test]
    fn test_sell_with_no_prior_lots_contributes_nothing() {
        let transactions = vec![sell("ACME", ts(2023, 2, 10), dec!(8), dec!(120))];

        let calc = CapitalGainsCalculator::new("EUR");
        let report = calc.realized_gains(&transactions);
        assert_eq!(report.total_gains, Decimal::ZERO);
        assert_eq!(report.total_losses, Decimal::ZERO);
        assert_eq!(report.unmatched_sell_shares, dec!(8));
        assert!(report.by_ticker.is_empty());
    }

    #[test]
    fn test_tickers_are_independent() {
        let transactions = vec![
            buy("ACME", ts(2023, 1, 10), dec!(10), dec!(100)),
            buy("GLOBEX", ts(2023, 1, 11), dec!(10), dec!(50)),
            sell("ACME", ts(2023, 2, 10), dec!(10), dec!(110)),
            sell("GLOBEX", ts(2023, 2, 11), dec!(10), dec!(40)),
        ];

        let calc = CapitalGainsCalculator::new("EUR");
        let report = calc.realized_gains(&transactions);
        assert_eq!(report.total_gains, dec!(100));
        assert_eq!(report.total_losses, dec!(100));
        assert_eq!(report.by_ticker["ACME"].gains, dec!(100));
        assert_eq!(report.by_ticker["GLOBEX"].losses, dec!(100));
    }

    #[test]
    fn test_trades_missing_fields_are_skipped_and_counted() {
        let mut no_price = buy("ACME", ts(2023, 1, 10), dec!(10), dec!(100));
        no_price.price_per_share = None;
        let mut no_ticker = buy("ACME", ts(2023, 1, 11), dec!(10), dec!(100));
        no_ticker.ticker = None;

        let calc = CapitalGainsCalculator::new("EUR");
        let report = calc.realized_gains(&[no_price, no_ticker]);
        assert_eq!(report.total_gains, Decimal::ZERO);
        assert_eq!(report.skipped_transactions, 1);
    }

    #[test]
    fn test_foreign_prices_normalized_before_matching() {
        let mut b = buy("ACME", ts(2023, 1, 10), dec!(10), dec!(110));
        b.price_currency = Some("USD".to_string());
        b.exchange_rate = Some(dec!(1.1));
        let s = sell("ACME", ts(2023, 2, 10), dec!(10), dec!(120));

        let calc = CapitalGainsCalculator::new("EUR");
        let (gains, _) = calc.capital_gains(&[b, s]);
        // Buy price normalizes to 100 EUR.
        assert_eq!(gains, dec!(200));
    }

    #[test]
    fn test_unsorted_input_is_ordered_by_timestamp() {
        let transactions = vec![
            sell("ACME", ts(2023, 3, 10), dec!(10), dec!(120)),
            buy("ACME", ts(2023, 1, 10), dec!(10), dec!(100)),
        ];

        let calc = CapitalGainsCalculator::new("EUR");
        let (gains, losses) = calc.capital_gains(&transactions);
        assert_eq!(gains, dec!(200));
        assert_eq!(losses, Decimal::ZERO);
    }
}
