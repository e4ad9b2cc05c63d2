//! Lenient deserializers for string-typed server values.
//!
//! The Data API returns record ids and mod ids as JSON strings, and number
//! fields come back either as numbers or as `""` when empty. Use these with
//! `#[serde(deserialize_with = "...")]` on model fields.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
    Null,
}

/// Accepts `42`, `"42"`, or `42.0`.
pub fn number_from_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    match option_number_from_string(deserializer)? {
        Some(v) => Ok(v),
        None => Err(de::Error::custom("expected a number, found an empty value")),
    }
}

/// Like [`number_from_string`], but `""` and `null` become `None`.
pub fn option_number_from_string<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Int(i) => i.to_string(),
        // `Display` for f64 prints whole values without a fraction (`42.0`
        // → "42") and never saturates, so out-of-range values fail in
        // `T::from_str`.
        StringOrNumber::Float(f) => f.to_string(),
        StringOrNumber::Null => return Ok(None),
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<T>().map(Some).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "number_from_string")]
        id: i64,
        #[serde(default, deserialize_with = "option_number_from_string")]
        qty: Option<u32>,
        #[serde(default, deserialize_with = "option_number_from_string")]
        price: Option<f64>,
    }

    #[test]
    fn accepts_strings_and_numbers() {
        let row: Row = serde_json::from_str(r#"{"id": "4", "qty": 7, "price": "1.25"}"#).unwrap();
        assert_eq!(row.id, 4);
        assert_eq!(row.qty, Some(7));
        assert_eq!(row.price, Some(1.25));
    }

    #[test]
    fn empty_values_become_none() {
        let row: Row = serde_json::from_str(r#"{"id": 1, "qty": "", "price": null}"#).unwrap();
        assert_eq!(row.qty, None);
        assert_eq!(row.price, None);
    }

    #[test]
    fn missing_optional_defaults_to_none() {
        let row: Row = serde_json::from_str(r#"{"id": 9}"#).unwrap();
        assert_eq!(row.qty, None);
    }

    #[test]
    fn required_number_rejects_empty_string() {
        assert!(serde_json::from_str::<Row>(r#"{"id": ""}"#).is_err());
    }

    #[test]
    fn whole_float_parses_as_integer() {
        let row: Row = serde_json::from_str(r#"{"id": 42.0}"#).unwrap();
        assert_eq!(row.id, 42);
    }

    #[test]
    fn out_of_range_float_is_rejected() {
        assert!(serde_json::from_str::<Row>(r#"{"id": 1e20}"#).is_err());
        assert!(serde_json::from_str::<Row>(r#"{"id": 1, "qty": 5e9}"#).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(serde_json::from_str::<Row>(r#"{"id": "four"}"#).is_err());
    }
}
