//! Currency normalization
//!
//! Every report the crate produces is expressed in a single configured base
//! currency. Conversion is per-transaction: ledger records carry their own
//! foreign-to-base exchange rate, so there is no rate table and no lookup.

use rust_decimal::Decimal;
use tracing::trace;

/// Converts amounts into the configured base currency.
///
/// When a record carries no usable rate the amount is passed through at 1:1.
/// That is a documented approximation, not an error: reports stay best-effort
/// on incomplete exports and the fallback is never signalled to the caller.
#[derive(Debug, Clone)]
pub struct CurrencyNormalizer {
    base: String,
}

impl CurrencyNormalizer {
    pub fn new(base_currency: impl Into<String>) -> Self {
        Self {
            base: base_currency.into(),
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.base
    }

    /// Normalize `amount` into the base currency.
    ///
    /// An absent currency, or one equal to the base currency, passes through
    /// unchanged regardless of any supplied rate. A differing currency is
    /// divided by the exchange rate when one is present and nonzero.
    pub fn normalize(
        &self,
        amount: Decimal,
        currency: Option<&str>,
        exchange_rate: Option<Decimal>,
    ) -> Decimal {
        let Some(currency) = currency else {
            return amount;
        };
        if currency.eq_ignore_ascii_case(&self.base) {
            return amount;
        }
        match exchange_rate {
            Some(rate) if !rate.is_zero() => amount / rate,
            _ => {
                trace!(currency, "no usable exchange rate, assuming 1:1");
                amount
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_base_currency_passes_through() {
        let fx = CurrencyNormalizer::new("EUR");
        assert_eq!(fx.normalize(dec!(100), Some("EUR"), Some(dec!(1.1))), dec!(100));
        assert_eq!(fx.normalize(dec!(100), Some("eur"), Some(dec!(2))), dec!(100));
        assert_eq!(fx.normalize(dec!(100), None, Some(dec!(2))), dec!(100));
    }

    #[test]
    fn test_foreign_amount_divided_by_rate() {
        let fx = CurrencyNormalizer::new("EUR");
        assert_eq!(fx.normalize(dec!(110), Some("USD"), Some(dec!(1.1))), dec!(100));
    }

    #[test]
    fn test_missing_or_zero_rate_falls_back_one_to_one() {
        let fx = CurrencyNormalizer::new("EUR");
        assert_eq!(fx.normalize(dec!(42), Some("USD"), None), dec!(42));
        assert_eq!(fx.normalize(dec!(42), Some("USD"), Some(Decimal::ZERO)), dec!(42));
    }
}
