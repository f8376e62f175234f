//! Ledger transaction model
//!
//! A [`Transaction`] is one row of a normalized brokerage ledger. Different
//! action kinds populate different subsets of the optional fields, so every
//! monetary and quantity field is an `Option`; the report engines treat a
//! missing required field as "skip this record", never as an error.

use chrono::{Datelike, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Ledger action taxonomy.
///
/// Buys, sells, deposits and withdrawals form a closed set; anything else a
/// broker export produces is kept verbatim in [`TransactionAction::Other`]
/// and classified heuristically (dividend/interest) by substring match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum TransactionAction {
    MarketBuy,
    LimitBuy,
    StopBuy,
    MarketSell,
    LimitSell,
    StopSell,
    Deposit,
    Withdrawal,
    Other(String),
}

impl TransactionAction {
    pub fn label(&self) -> &str {
        match self {
            TransactionAction::MarketBuy => "Market buy",
            TransactionAction::LimitBuy => "Limit buy",
            TransactionAction::StopBuy => "Stop buy",
            TransactionAction::MarketSell => "Market sell",
            TransactionAction::LimitSell => "Limit sell",
            TransactionAction::StopSell => "Stop sell",
            TransactionAction::Deposit => "Deposit",
            TransactionAction::Withdrawal => "Withdrawal",
            TransactionAction::Other(text) => text,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(
            self,
            TransactionAction::MarketBuy | TransactionAction::LimitBuy | TransactionAction::StopBuy
        )
    }

    pub fn is_sell(&self) -> bool {
        matches!(
            self,
            TransactionAction::MarketSell
                | TransactionAction::LimitSell
                | TransactionAction::StopSell
        )
    }

    /// Buy or sell of any order type.
    pub fn is_trade(&self) -> bool {
        self.is_buy() || self.is_sell()
    }

    pub fn is_deposit(&self) -> bool {
        matches!(self, TransactionAction::Deposit)
    }

    pub fn is_withdrawal(&self) -> bool {
        matches!(self, TransactionAction::Withdrawal)
    }

    /// Case-insensitive substring classification. Deliberately loose so that
    /// export-format drift ("Dividend (Ordinary)", "Stock dividend paid")
    /// keeps being recognized; see the matching note in DESIGN.md.
    pub fn is_dividend(&self) -> bool {
        contains_ignore_case(self.label(), "dividend")
    }

    /// Same loose matching as [`TransactionAction::is_dividend`].
    pub fn is_interest(&self) -> bool {
        contains_ignore_case(self.label(), "interest")
    }
}

fn parse_action(s: &str) -> TransactionAction {
    match s.trim().to_ascii_lowercase().as_str() {
        "market buy" | "buy" => TransactionAction::MarketBuy,
        "limit buy" => TransactionAction::LimitBuy,
        "stop buy" => TransactionAction::StopBuy,
        "market sell" | "sell" => TransactionAction::MarketSell,
        "limit sell" => TransactionAction::LimitSell,
        "stop sell" => TransactionAction::StopSell,
        "deposit" => TransactionAction::Deposit,
        "withdrawal" | "withdraw" => TransactionAction::Withdrawal,
        _ => TransactionAction::Other(s.trim().to_string()),
    }
}

impl FromStr for TransactionAction {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse_action(s))
    }
}

impl From<String> for TransactionAction {
    fn from(s: String) -> Self {
        parse_action(&s)
    }
}

impl From<TransactionAction> for String {
    fn from(action: TransactionAction) -> Self {
        action.label().to_string()
    }
}

/// One normalized brokerage ledger record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub action: TransactionAction,
    pub timestamp: NaiveDateTime,
    pub ticker: Option<String>,
    pub isin: Option<String>,
    pub security_name: Option<String>,
    pub shares: Option<Decimal>,
    pub price_per_share: Option<Decimal>,
    pub price_currency: Option<String>,
    /// Foreign-to-base divisor: `base_amount = foreign_amount / exchange_rate`.
    pub exchange_rate: Option<Decimal>,
    pub result: Option<Decimal>,
    pub result_currency: Option<String>,
    pub total: Option<Decimal>,
    pub total_currency: Option<String>,
    pub withholding_tax: Option<Decimal>,
    pub notes: Option<String>,
}

impl Transaction {
    pub fn year(&self) -> i32 {
        self.timestamp.year()
    }

    /// Income amount of a dividend/interest record: "result" with its
    /// currency, falling back to "total" with its currency.
    pub fn income_amount(&self) -> Option<(Decimal, Option<&str>)> {
        if let Some(amount) = self.result {
            Some((amount, self.result_currency.as_deref()))
        } else {
            self.total.map(|amount| (amount, self.total_currency.as_deref()))
        }
    }

    /// Grouping key for per-security breakdowns: ticker, then ISIN, then
    /// security name, then a fixed placeholder.
    pub fn security_key(&self) -> String {
        self.ticker
            .clone()
            .or_else(|| self.isin.clone())
            .or_else(|| self.security_name.clone())
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_action_parsing_closed_set() {
        assert_eq!(
            "Market buy".parse::<TransactionAction>().unwrap(),
            TransactionAction::MarketBuy
        );
        assert_eq!(
            "LIMIT SELL".parse::<TransactionAction>().unwrap(),
            TransactionAction::LimitSell
        );
        assert_eq!(
            "deposit".parse::<TransactionAction>().unwrap(),
            TransactionAction::Deposit
        );
    }

    #[test]
    fn test_action_parsing_open_ended_text() {
        let action = "Stock dividend paid".parse::<TransactionAction>().unwrap();
        assert_eq!(
            action,
            TransactionAction::Other("Stock dividend paid".to_string())
        );
        assert!(action.is_dividend());
        assert!(!action.is_trade());
    }

    #[test]
    fn test_heuristic_classification_is_substring_based() {
        let dividend: TransactionAction = "Dividend (Ordinary)".parse().unwrap();
        assert!(dividend.is_dividend());

        let interest: TransactionAction = "Cash interest - monthly".parse().unwrap();
        assert!(interest.is_interest());
        assert!(!interest.is_dividend());

        assert!(!TransactionAction::Deposit.is_dividend());
        assert!(!TransactionAction::MarketSell.is_interest());
    }

    #[test]
    fn test_action_serde_round_trips_as_plain_string() {
        let json = serde_json::to_string(&TransactionAction::MarketBuy).unwrap();
        assert_eq!(json, "\"Market buy\"");

        let parsed: TransactionAction = serde_json::from_str("\"Stock dividend paid\"").unwrap();
        assert!(parsed.is_dividend());
    }

    #[test]
    fn test_income_amount_falls_back_to_total() {
        let mut tx = Transaction {
            action: "Dividend".parse().unwrap(),
            timestamp: ts(2024, 3, 15),
            ticker: Some("ACME".to_string()),
            isin: None,
            security_name: None,
            shares: None,
            price_per_share: None,
            price_currency: None,
            exchange_rate: None,
            result: Some(dec!(25)),
            result_currency: Some("USD".to_string()),
            total: Some(dec!(99)),
            total_currency: Some("EUR".to_string()),
            withholding_tax: None,
            notes: None,
        };

        assert_eq!(tx.income_amount(), Some((dec!(25), Some("USD"))));

        tx.result = None;
        tx.result_currency = None;
        assert_eq!(tx.income_amount(), Some((dec!(99), Some("EUR"))));

        tx.total = None;
        assert_eq!(tx.income_amount(), None);
    }

    #[test]
    fn test_security_key_fallback_chain() {
        let mut tx = Transaction {
            action: TransactionAction::MarketBuy,
            timestamp: ts(2024, 1, 2),
            ticker: Some("ACME".to_string()),
            isin: Some("US0000000001".to_string()),
            security_name: Some("Acme Corp".to_string()),
            shares: None,
            price_per_share: None,
            price_currency: None,
            exchange_rate: None,
            result: None,
            result_currency: None,
            total: None,
            total_currency: None,
            withholding_tax: None,
            notes: None,
        };

        assert_eq!(tx.security_key(), "ACME");
        tx.ticker = None;
        assert_eq!(tx.security_key(), "US0000000001");
        tx.isin = None;
        assert_eq!(tx.security_key(), "Acme Corp");
        tx.security_name = None;
        assert_eq!(tx.security_key(), "UNKNOWN");
    }
}
