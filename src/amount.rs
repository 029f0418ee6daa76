// Canonical Amounts
//
// The signed message embeds the amount as text, so it has to be pinned to a
// single decimal rendering before hashing: plain digits, no exponent, no
// grouping, at most two fractional digits (paisa), trailing zeros stripped.
// `100`, `100.0` and `1e2` all render as "100"; `100.50` renders as "100.5".

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PaymentError, Result};

const MAX_FRACTION_DIGITS: u32 = 2;

/// Amount as it arrives from a caller: a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_json::Number),
    Text(String),
}

impl From<u64> for AmountInput {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for AmountInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Non-negative amount in canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    pub fn parse(input: &AmountInput) -> Result<Self> {
        match input {
            AmountInput::Number(n) => n.to_string().parse(),
            AmountInput::Text(s) => s.parse(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl FromStr for Amount {
    type Err = PaymentError;

    fn from_str(raw: &str) -> Result<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(PaymentError::invalid("amount is required"));
        }

        let value = parse_exact(text).ok_or_else(|| {
            PaymentError::invalid(format!("amount '{}' is not a finite decimal number", text))
        })?;

        if value.is_sign_negative() && !value.is_zero() {
            return Err(PaymentError::invalid(format!("amount '{}' must not be negative", text)));
        }

        let value = value.normalize();
        if value.scale() > MAX_FRACTION_DIGITS {
            return Err(PaymentError::invalid(format!(
                "amount '{}' has more than {} decimal places",
                text, MAX_FRACTION_DIGITS
            )));
        }

        Ok(Self(value))
    }
}

/// Parse plain or exponent notation without rounding. Anything that does not
/// fit a `Decimal` exactly is rejected.
fn parse_exact(text: &str) -> Option<Decimal> {
    let allowed = |c: char| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E');
    if !text.chars().all(allowed) {
        return None;
    }

    let Some((mantissa, exponent)) = text.split_once(['e', 'E']) else {
        return Decimal::from_str_exact(text).ok();
    };
    let mantissa = Decimal::from_str_exact(mantissa).ok()?.normalize();
    let exponent: i64 = exponent.parse().ok()?;

    let scale = i64::from(mantissa.scale()) - exponent;
    if scale >= 0 {
        Decimal::try_from_i128_with_scale(mantissa.mantissa(), u32::try_from(scale).ok()?).ok()
    } else {
        let factor = 10i128.checked_pow(u32::try_from(-scale).ok()?)?;
        let digits = mantissa.mantissa().checked_mul(factor)?;
        Decimal::try_from_i128_with_scale(digits, 0).ok()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical(value: serde_json::Value) -> String {
        let input: AmountInput = serde_json::from_value(value).unwrap();
        Amount::parse(&input).unwrap().to_string()
    }

    #[test]
    fn test_equivalent_forms_share_one_rendering() {
        assert_eq!(canonical(json!(100)), "100");
        assert_eq!(canonical(json!(100.0)), "100");
        assert_eq!(canonical(json!(1e2)), "100");
        assert_eq!(canonical(json!("100")), "100");
        assert_eq!(canonical(json!("100.00")), "100");
        assert_eq!(canonical(json!("1e2")), "100");
        assert_eq!(canonical(json!("1.5E+1")), "15");
        assert_eq!(canonical(json!("12.5e-1")), "1.25");
    }

    #[test]
    fn test_fractional_amounts() {
        assert_eq!(canonical(json!(100.5)), "100.5");
        assert_eq!(canonical(json!("100.50")), "100.5");
        assert_eq!(canonical(json!("0.05")), "0.05");
        assert_eq!(canonical(json!(0)), "0");
        assert_eq!(canonical(json!("-0")), "0");
    }

    #[test]
    fn test_rejects_invalid_amounts() {
        for bad in [
            "",
            "  ",
            "abc",
            "NaN",
            "inf",
            "-1",
            "-0.5",
            "1,000",
            " 1_000 ",
            "10.005",
            "1e-3",
            "1e300",
            "0.1000000000000000000000000000001",
            "1.0000000000000000000000000000001e2",
        ] {
            let result = Amount::parse(&AmountInput::from(bad));
            assert!(
                matches!(result, Err(PaymentError::InvalidInput(_))),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_float_noise_is_rejected() {
        let input: AmountInput = serde_json::from_value(json!(0.1 + 0.2)).unwrap();
        assert!(Amount::parse(&input).is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let amount: Amount = "250.10".parse().unwrap();
        assert_eq!(serde_json::to_value(amount).unwrap(), json!("250.1"));
    }
}
