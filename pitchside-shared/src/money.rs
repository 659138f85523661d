use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};

/// An amount in minor units (hundredths of a dinar).
///
/// On the wire it is a plain JSON number with two decimals (`12.5` → 1250), which is
/// what the storefront sends and renders as `12.50 DT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Largest amount accepted from a client, in major units.
    pub const MAX_MAJOR: f64 = 10_000_000_000_000.0;

    pub fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Rounds half away from zero to the nearest hundredth.
    pub fn from_major(major: f64) -> Self {
        Money((major * 100.0).round() as i64)
    }

    pub fn minor(self) -> i64 {
        self.0
    }

    pub fn as_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Percentage of this amount, rounded to the nearest minor unit.
    pub fn percent(self, rate: f64) -> Money {
        Money((self.0 as f64 * rate).round() as i64)
    }

    pub fn abs_diff(self, other: Money) -> i64 {
        self.0.saturating_sub(other.0).saturating_abs()
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_mul(self, factor: i64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    /// Sums amounts, `None` once the total leaves the `i64` range.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:02} DT", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_major())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let major = f64::deserialize(deserializer)?;
        if !major.is_finite() {
            return Err(serde::de::Error::custom("amount must be a finite number"));
        }
        if major.abs() > Money::MAX_MAJOR {
            return Err(serde::de::Error::custom("amount is out of range"));
        }
        Ok(Money::from_major(major))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let m: Money = serde_json::from_str("12.5").unwrap();
        assert_eq!(m.minor(), 1250);
        assert_eq!(serde_json::to_string(&m).unwrap(), "12.5");
        assert_eq!(Money::from_major(0.1 + 0.2).minor(), 30);
    }

    #[test]
    fn test_percent_rounds_to_cents() {
        // 8% of 19.99 = 1.5992
        assert_eq!(Money::from_minor(1999).percent(0.08).minor(), 160);
        assert_eq!(Money::from_minor(1999).to_string(), "19.99 DT");
    }

    #[test]
    fn test_overflow_is_reported() {
        let big = Money::from_minor(i64::MAX / 2 + 1);
        assert_eq!(big.checked_add(big), None);
        assert_eq!(big.checked_mul(2), None);
        assert_eq!(Money::from_minor(250).checked_mul(4), Some(Money::from_minor(1000)));
        assert_eq!(
            Money::checked_sum([Money::from_minor(1), Money::from_minor(2)]),
            Some(Money::from_minor(3))
        );
        assert_eq!(Money::checked_sum([big, big]), None);
    }

    #[test]
    fn test_out_of_range_amount_is_rejected() {
        assert!(serde_json::from_str::<Money>("1e15").is_err());
        assert!(serde_json::from_str::<Money>("-1e15").is_err());
        assert!(serde_json::from_str::<Money>("1e12").is_ok());
    }
}
