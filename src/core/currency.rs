use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// ISO 4217-style currency code.
///
/// Codes are stored upper-cased so `"eur"` and `"EUR"` compare equal.
///
/// # Examples
///
/// ```
/// use trip_settle::core::currency::CurrencyCode;
///
/// let eur = CurrencyCode::new("eur");
/// assert_eq!(eur.as_str(), "EUR");
/// assert_eq!(eur.minor_units(), 2);
/// assert_eq!(CurrencyCode::new("JPY").minor_units(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of decimal places of the currency's minor unit.
    pub fn minor_units(&self) -> u32 {
        match self.0.as_str() {
            "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF"
            | "UGX" | "UYI" | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
            "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
            _ => 2,
        }
    }

    /// Smallest representable amount, e.g. `0.01` for EUR.
    pub fn minor_unit(&self) -> Decimal {
        Decimal::new(1, self.minor_units())
    }

    /// Round an amount to this currency's minor units, half away from zero.
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.minor_units(), RoundingStrategy::MidpointAwayFromZero)
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// An exchange rate that is not strictly positive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("exchange rate must be positive, got {rate} for {currency}")]
pub struct InvalidRateError {
    pub currency: CurrencyCode,
    pub rate: Decimal,
}

/// Conversion factor from an expense currency into the trip base currency.
///
/// Fixed per expense at the time it is recorded: 1 unit of the expense
/// currency is worth `rate` units of the base currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FxRate(Decimal);

impl FxRate {
    /// Validate a rate quoted for `currency`.
    pub fn new(rate: Decimal, currency: &CurrencyCode) -> Result<Self, InvalidRateError> {
        if rate <= Decimal::ZERO {
            return Err(InvalidRateError {
                currency: currency.clone(),
                rate,
            });
        }
        Ok(Self(rate))
    }

    /// The rate used when the expense is already in the base currency.
    pub fn identity() -> Self {
        Self(Decimal::ONE)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0 == Decimal::ONE
    }
}

impl Default for FxRate {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for FxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Convert `amount` into the base currency and round it to the base
/// currency's minor units.
///
/// The rate is checked again here because rows loaded from storage bypass
/// [`FxRate::new`].
///
/// # Examples
///
/// ```
/// use trip_settle::core::currency::{normalize, CurrencyCode, FxRate};
/// use rust_decimal_macros::dec;
///
/// let gbp = CurrencyCode::new("GBP");
/// let rate = FxRate::new(dec!(1.1675), &CurrencyCode::new("EUR")).unwrap();
/// assert_eq!(normalize(dec!(10), rate, &gbp).unwrap(), dec!(11.68));
/// ```
pub fn normalize(
    amount: Decimal,
    rate: FxRate,
    base: &CurrencyCode,
) -> Result<Decimal, InvalidRateError> {
    if rate.0 <= Decimal::ZERO {
        return Err(InvalidRateError {
            currency: base.clone(),
            rate: rate.0,
        });
    }
    Ok(base.round(amount * rate.0))
}
