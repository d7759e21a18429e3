//! Self-healing input policy.
//!
//! Malformed numeric and date input is never rejected: it is coerced to a safe
//! value so the caller always gets a usable record. The coercions are gathered
//! here, and [`FALLBACKS`] lists them so the contract can be read in one place.
//! Required fields (owner, date, shift) are still validated by the services.

use crate::core::dates;
use serde::{Deserialize, Deserializer, de::DeserializeOwned};

/// One entry of the fallback policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallback {
    /// Field the rule applies to
    pub field: &'static str,
    /// Input the rule catches
    pub when: &'static str,
    /// Value substituted
    pub becomes: &'static str,
}

/// Every silent coercion applied by the services.
pub const FALLBACKS: &[Fallback] = &[
    Fallback {
        field: "production.liters",
        when: "NaN, infinite or negative",
        becomes: "0",
    },
    Fallback {
        field: "production.unit_price_at_sale",
        when: "NaN, infinite or negative (when provided)",
        becomes: "0",
    },
    Fallback {
        field: "production.date",
        when: "present but unparseable",
        becomes: "today",
    },
    Fallback {
        field: "production.shift",
        when: "missing on a stored record",
        becomes: "morning",
    },
    Fallback {
        field: "*.notes",
        when: "missing",
        becomes: "\"\"",
    },
    Fallback {
        field: "animal.birth_date",
        when: "unparseable",
        becomes: "\"\"",
    },
    Fallback {
        field: "feed.proportion_value",
        when: "unparseable",
        becomes: "0",
    },
    Fallback {
        field: "stored numbers",
        when: "typed text such as \"12\" or \"2,15\"",
        becomes: "the parsed number",
    },
    Fallback {
        field: "stored enum fields",
        when: "unknown value",
        becomes: "the field default",
    },
    Fallback {
        field: "stored records",
        when: "still undecodable after the rules above",
        becomes: "skipped on read",
    },
];

/// Coerces a number to a non-negative finite value; anything else becomes 0.
#[must_use]
pub fn safe_number(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

/// Parses user-typed decimal text, accepting a comma as decimal separator.
/// Unparseable text becomes 0; the sign is preserved.
#[must_use]
pub fn parse_decimal(text: &str) -> f64 {
    decimal(text).unwrap_or(0.0)
}

fn decimal(text: &str) -> Option<f64> {
    let cleaned = text.trim().replacen(',', ".", 1);
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalizes a production date; unparseable input becomes today.
#[must_use]
pub fn date_or_today(input: &str) -> String {
    dates::normalize_date(input).unwrap_or_else(dates::today_string)
}

/// Normalizes an optional date field; unparseable input becomes empty.
#[must_use]
pub fn date_or_empty(input: &str) -> String {
    dates::normalize_date(input).unwrap_or_default()
}

/// Serde hook reading an explicit `null` the same as a missing field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Serde hook for numbers that older records stored as typed text, sometimes
/// with a decimal comma. Anything unreadable becomes 0.
pub fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_number(deserializer)?.unwrap_or(0.0))
}

/// Like [`lenient_number`] for optional values: missing, `null`, blank or
/// unreadable input becomes `None`.
pub fn lenient_optional_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value.map(serde_json::from_value::<NumberOrText>) {
        Some(Ok(NumberOrText::Number(n))) if n.is_finite() => Some(n),
        Some(Ok(NumberOrText::Text(text))) => decimal(&text),
        _ => None,
    })
}

/// Serde hook for enum fields: an unknown or mistyped value reads as the
/// default instead of failing the whole record.
pub fn lenient_or_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Notes {
        #[serde(default, deserialize_with = "null_as_default")]
        notes: String,
    }

    #[test]
    fn test_null_as_default() {
        let parsed: Notes = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert_eq!(parsed.notes, "");
        let parsed: Notes = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.notes, "");
    }

    #[derive(Debug, Deserialize)]
    struct Stored {
        #[serde(default, deserialize_with = "lenient_number")]
        liters: f64,
        #[serde(default, deserialize_with = "lenient_optional_number")]
        price: Option<f64>,
        #[serde(default, deserialize_with = "lenient_or_default")]
        kind: Kind,
    }

    #[derive(Debug, Default, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum Kind {
        #[default]
        Plain,
        Fancy,
    }

    #[test]
    fn test_lenient_fields_accept_legacy_values() {
        let parsed: Stored =
            serde_json::from_str(r#"{"liters": "12", "price": "2,15", "kind": "fancy"}"#).unwrap();
        assert_eq!(parsed.liters, 12.0);
        assert_eq!(parsed.price, Some(2.15));
        assert_eq!(parsed.kind, Kind::Fancy);

        let parsed: Stored =
            serde_json::from_str(r#"{"liters": null, "price": "n/a", "kind": "weird"}"#).unwrap();
        assert_eq!(parsed.liters, 0.0);
        assert_eq!(parsed.price, None);
        assert_eq!(parsed.kind, Kind::Plain);

        let parsed: Stored = serde_json::from_str(r#"{"liters": 7.5, "kind": 3}"#).unwrap();
        assert_eq!(parsed.liters, 7.5);
        assert_eq!(parsed.price, None);
        assert_eq!(parsed.kind, Kind::Plain);
    }

    #[test]
    fn test_safe_number() {
        assert_eq!(safe_number(12.5), 12.5);
        assert_eq!(safe_number(-3.0), 0.0);
        assert_eq!(safe_number(f64::NAN), 0.0);
        assert_eq!(safe_number(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_parse_decimal_accepts_comma() {
        assert_eq!(parse_decimal("2,50"), 2.5);
        assert_eq!(parse_decimal(" 10.25 "), 10.25);
        assert_eq!(parse_decimal("abc"), 0.0);
        assert_eq!(parse_decimal("-1"), -1.0);
    }

    #[test]
    fn test_date_fallbacks() {
        assert_eq!(date_or_today("2024-01-05"), "2024-01-05");
        assert_eq!(date_or_today("garbage"), dates::today_string());
        assert_eq!(date_or_empty("garbage"), "");
    }

    #[test]
    fn test_policy_table_names_liters() {
        assert!(FALLBACKS.iter().any(|f| f.field == "production.liters"));
    }
}
