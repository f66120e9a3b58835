//! Money type for representing monetary values.
//!
//! Uses minor-unit integer representation (pence for GBP) to avoid
//! floating-point precision issues in cart arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommerceError;

/// Supported currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    GBP,
    EUR,
    USD,
    JPY,
}

impl Currency {
    /// Get the currency code (e.g., "GBP").
    pub fn code(&self) -> &'static str {
        match self {
            Currency::GBP => "GBP",
            Currency::EUR => "EUR",
            Currency::USD => "USD",
            Currency::JPY => "JPY",
        }
    }

    /// Get the currency symbol (e.g., "£").
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::GBP => "\u{00a3}",
            Currency::EUR => "\u{20ac}",
            Currency::USD => "$",
            Currency::JPY => "\u{00a5}",
        }
    }

    /// Get the number of decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Parse a currency code string.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "GBP" => Some(Currency::GBP),
            "EUR" => Some(Currency::EUR),
            "USD" => Some(Currency::USD),
            "JPY" => Some(Currency::JPY),
            _ => None,
        }
    }

    fn minor_per_major(&self) -> i64 {
        10_i64.pow(self.decimal_places())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::from_code(s).ok_or_else(|| CommerceError::UnknownCurrency(s.to_string()))
    }
}

/// A monetary value with currency.
///
/// Amounts are stored in the smallest unit of the currency (pence for GBP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Money {
    /// Amount in smallest currency unit.
    pub amount_minor: i64,
    /// The currency.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money value from minor units.
    pub fn new(amount_minor: i64, currency: Currency) -> Self {
        Self {
            amount_minor,
            currency,
        }
    }

    /// Create a GBP amount from pence.
    pub fn gbp(pence: i64) -> Self {
        Self::new(pence, Currency::GBP)
    }

    /// Create a Money value from a decimal amount.
    ///
    /// ```
    /// use atelier_commerce::money::{Money, Currency};
    /// let price = Money::from_decimal(49.99, Currency::GBP);
    /// assert_eq!(price.amount_minor, 4999);
    /// ```
    pub fn from_decimal(amount: f64, currency: Currency) -> Self {
        let amount_minor = (amount * currency.minor_per_major() as f64).round() as i64;
        Self::new(amount_minor, currency)
    }

    /// Parse user input such as `"49.99"`, `"£1,250"` or `"-5.5"`.
    ///
    /// More fractional digits than the currency allows is an error rather
    /// than a silent rounding.
    pub fn parse(input: &str, currency: Currency) -> Result<Self, CommerceError> {
        let invalid = || CommerceError::InvalidAmount(input.to_string());

        let mut s = input.trim();
        let negative = s.starts_with('-');
        if negative {
            s = &s[1..];
        }
        s = s.strip_prefix(currency.symbol()).unwrap_or(s);
        let cleaned: String = s.chars().filter(|c| *c != ',').collect();

        let (major, minor) = match cleaned.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (cleaned.as_str(), ""),
        };
        let places = currency.decimal_places() as usize;
        if major.is_empty() && minor.is_empty() {
            return Err(invalid());
        }
        if minor.len() > places || !major.chars().chain(minor.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let major: i64 = if major.is_empty() { 0 } else { major.parse().map_err(|_| invalid())? };
        let minor_digits = format!("{minor:0<places$}");
        let minor: i64 = if places == 0 { 0 } else { minor_digits.parse().map_err(|_| invalid())? };

        let amount = major
            .checked_mul(currency.minor_per_major())
            .and_then(|m| m.checked_add(minor))
            .ok_or_else(invalid)?;
        Ok(Self::new(if negative { -amount } else { amount }, currency))
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Check if this is zero.
    pub fn is_zero(&self) -> bool {
        self.amount_minor == 0
    }

    /// Check if this is positive.
    pub fn is_positive(&self) -> bool {
        self.amount_minor > 0
    }

    /// Check if this is negative.
    pub fn is_negative(&self) -> bool {
        self.amount_minor < 0
    }

    /// Convert to a decimal value.
    pub fn to_decimal(&self) -> f64 {
        self.amount_minor as f64 / self.currency.minor_per_major() as f64
    }

    /// Format for display, e.g. `"£1,234.50"` or `"-£5.00"`.
    pub fn display(&self) -> String {
        let sign = if self.is_negative() { "-" } else { "" };
        format!("{sign}{}{}", self.currency.symbol(), self.display_amount())
    }

    /// Format the absolute amount without symbol or sign, e.g. `"1,234.50"`.
    pub fn display_amount(&self) -> String {
        let per_major = self.currency.minor_per_major().unsigned_abs();
        let abs = self.amount_minor.unsigned_abs();
        let grouped = group_thousands(abs / per_major);
        match self.currency.decimal_places() {
            0 => grouped,
            places => format!("{grouped}.{:0width$}", abs % per_major, width = places as usize),
        }
    }

    /// Try to add another Money value, returning None if currencies don't match.
    pub fn try_add(&self, other: &Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        Some(Money::new(
            self.amount_minor.saturating_add(other.amount_minor),
            self.currency,
        ))
    }

    /// Try to subtract another Money value.
    pub fn try_subtract(&self, other: &Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        Some(Money::new(
            self.amount_minor.saturating_sub(other.amount_minor),
            self.currency,
        ))
    }

    /// Add, failing with a typed error on currency mismatch.
    pub fn checked_add(&self, other: &Money) -> Result<Money, CommerceError> {
        self.try_add(other).ok_or_else(|| self.mismatch(other))
    }

    /// Multiply by a quantity.
    pub fn times(&self, quantity: u32) -> Money {
        Money::new(
            self.amount_minor.saturating_mul(i64::from(quantity)),
            self.currency,
        )
    }

    /// Multiply by a rate (e.g. `0.20` for VAT), rounding to the nearest
    /// minor unit, halves away from zero.
    pub fn multiply_rate(&self, rate: f64) -> Money {
        let new_amount = (self.amount_minor as f64 * rate).round() as i64;
        Money::new(new_amount, self.currency)
    }

    /// Sum an iterator of Money values. `None` if any currency differs.
    pub fn try_sum<'a>(mut iter: impl Iterator<Item = &'a Money>, currency: Currency) -> Option<Money> {
        iter.try_fold(Money::zero(currency), |acc, m| acc.try_add(m))
    }

    fn mismatch(&self, other: &Money) -> CommerceError {
        CommerceError::CurrencyMismatch {
            expected: self.currency.code().to_string(),
            got: other.currency.code().to_string(),
        }
    }
}

/// Amounts in different currencies are unordered.
impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        (self.currency == other.currency).then(|| self.amount_minor.cmp(&other.amount_minor))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_minor() {
        let m = Money::gbp(4999);
        assert_eq!(m.amount_minor, 4999);
        assert_eq!(m.currency, Currency::GBP);
    }

    #[test]
    fn test_money_from_decimal() {
        let m = Money::from_decimal(49.99, Currency::GBP);
        assert_eq!(m.amount_minor, 4999);

        let m = Money::from_decimal(100.0, Currency::JPY);
        assert_eq!(m.amount_minor, 100); // JPY has no decimals
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::gbp(4999).display(), "\u{00a3}49.99");
        assert_eq!(Money::gbp(0).display(), "\u{00a3}0.00");
        assert_eq!(Money::gbp(123_456_78).display(), "\u{00a3}123,456.78");
        assert_eq!(Money::gbp(100_000_000).display(), "\u{00a3}1,000,000.00");
        assert_eq!(Money::gbp(-500).display(), "-\u{00a3}5.00");
        assert_eq!(Money::new(1500, Currency::JPY).display(), "\u{00a5}1,500");
    }

    #[test]
    fn test_money_parse() {
        assert_eq!(Money::parse("49.99", Currency::GBP).unwrap(), Money::gbp(4999));
        assert_eq!(Money::parse("£1,250", Currency::GBP).unwrap(), Money::gbp(125_000));
        assert_eq!(Money::parse("5.5", Currency::GBP).unwrap(), Money::gbp(550));
        assert_eq!(Money::parse("-0.01", Currency::GBP).unwrap(), Money::gbp(-1));
        assert_eq!(Money::parse(".75", Currency::GBP).unwrap(), Money::gbp(75));

        assert!(Money::parse("1.999", Currency::GBP).is_err());
        assert!(Money::parse("abc", Currency::GBP).is_err());
        assert!(Money::parse("", Currency::GBP).is_err());
        assert!(Money::parse("1.5", Currency::JPY).is_err());
    }

    #[test]
    fn test_money_addition() {
        let c = Money::gbp(1000).try_add(&Money::gbp(500)).unwrap();
        assert_eq!(c.amount_minor, 1500);
    }

    #[test]
    fn test_money_subtraction() {
        let c = Money::gbp(1000).try_subtract(&Money::gbp(300)).unwrap();
        assert_eq!(c.amount_minor, 700);
    }

    #[test]
    fn test_money_times() {
        assert_eq!(Money::gbp(1000).times(3).amount_minor, 3000);
        assert_eq!(Money::gbp(i64::MAX).times(2).amount_minor, i64::MAX);
    }

    #[test]
    fn test_money_rate() {
        assert_eq!(Money::gbp(30000).multiply_rate(0.20).amount_minor, 6000);
        // 4999 * 0.2 = 999.8
        assert_eq!(Money::gbp(4999).multiply_rate(0.20).amount_minor, 1000);
        // 2.5 rounds away from zero
        assert_eq!(Money::gbp(25).multiply_rate(0.1).amount_minor, 3);
    }

    #[test]
    fn test_money_currency_mismatch() {
        let gbp = Money::gbp(1000);
        let eur = Money::new(1000, Currency::EUR);
        assert!(gbp.try_add(&eur).is_none());
        assert!(matches!(
            gbp.checked_add(&eur),
            Err(CommerceError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_try_sum() {
        let values = [Money::gbp(100), Money::gbp(250)];
        assert_eq!(Money::try_sum(values.iter(), Currency::GBP), Some(Money::gbp(350)));

        let mixed = [Money::gbp(100), Money::new(1, Currency::USD)];
        assert_eq!(Money::try_sum(mixed.iter(), Currency::GBP), None);
    }

    #[test]
    fn test_ordering_within_one_currency() {
        assert!(Money::gbp(5000) >= Money::gbp(5000));
        assert!(Money::gbp(4999) < Money::gbp(5000));

        let eur = Money::new(9999, Currency::EUR);
        assert!(!(eur >= Money::gbp(5000)));
        assert!(!(eur < Money::gbp(5000)));
    }

    #[test]
    fn test_currency_from_code() {
        assert_eq!(Currency::from_code("GBP"), Some(Currency::GBP));
        assert_eq!(Currency::from_code("eur"), Some(Currency::EUR));
        assert_eq!(Currency::from_code("INVALID"), None);
        assert!("xyz".parse::<Currency>().is_err());
    }
}
