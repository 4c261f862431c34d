//! Conversions between record fields and SQLite values.
//!
//! Storage encodings:
//! - UUIDs are stored as hyphenated lowercase TEXT.
//! - Instants are stored as RFC 3339 UTC TEXT with a fixed nine-digit
//!   fraction, so text order equals chronological order.
//! - Calendar dates are stored as `YYYY-MM-DD` TEXT.
//! - Decimals are stored as TEXT to keep their exact value.
//! - Booleans are stored as INTEGER 0/1.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use rust_decimal::Decimal;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A field that can be written to a SQLite column.
pub trait SqlField {
    /// Returns the storage representation of this value.
    fn to_sql_value(&self) -> Value;
}

/// A field that can be read back from a SQLite column.
pub trait FromColumn: Sized {
    /// Converts a stored value. `Value::Null` is only accepted by `Option<T>`.
    fn from_value(value: Value) -> Result<Self, BoxError>;
}

/// Reads column `name` from `row` and converts it to `T`.
pub fn column<T: FromColumn>(row: &Row<'_>, name: &str) -> rusqlite::Result<T> {
    let value: Value = row.get(name)?;
    let ty = value.data_type();
    T::from_value(value).map_err(|err| {
        let index = row.as_ref().column_index(name).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, ty, err)
    })
}

/// Formats an instant in its stored form.
pub fn format_instant(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Formats a calendar date in its stored form.
pub fn format_date(value: &NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn expect_text(value: Value) -> Result<String, BoxError> {
    match value {
        Value::Text(text) => Ok(text),
        other => Err(format!("expected TEXT, found {}", other.data_type()).into()),
    }
}

fn parse_text<T>(value: Value) -> Result<T, BoxError>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(expect_text(value)?.parse::<T>()?)
}

impl SqlField for String {
    fn to_sql_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl SqlField for &str {
    fn to_sql_value(&self) -> Value {
        Value::Text((*self).to_string())
    }
}

impl SqlField for Uuid {
    fn to_sql_value(&self) -> Value {
        Value::Text(self.hyphenated().to_string())
    }
}

impl SqlField for DateTime<Utc> {
    fn to_sql_value(&self) -> Value {
        Value::Text(format_instant(self))
    }
}

impl SqlField for NaiveDate {
    fn to_sql_value(&self) -> Value {
        Value::Text(format_date(self))
    }
}

impl SqlField for Decimal {
    fn to_sql_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl SqlField for bool {
    fn to_sql_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }
}

impl SqlField for i64 {
    fn to_sql_value(&self) -> Value {
        Value::Integer(*self)
    }
}

impl SqlField for f64 {
    fn to_sql_value(&self) -> Value {
        Value::Real(*self)
    }
}

impl<T: SqlField> SqlField for Option<T> {
    fn to_sql_value(&self) -> Value {
        match self {
            Some(value) => value.to_sql_value(),
            None => Value::Null,
        }
    }
}

impl FromColumn for String {
    fn from_value(value: Value) -> Result<Self, BoxError> {
        expect_text(value)
    }
}

impl FromColumn for Uuid {
    fn from_value(value: Value) -> Result<Self, BoxError> {
        parse_text(value)
    }
}

impl FromColumn for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, BoxError> {
        let text = expect_text(value)?;
        Ok(DateTime::parse_from_rfc3339(&text)?.with_timezone(&Utc))
    }
}

impl FromColumn for NaiveDate {
    fn from_value(value: Value) -> Result<Self, BoxError> {
        let text = expect_text(value)?;
        Ok(NaiveDate::parse_from_str(&text, "%Y-%m-%d")?)
    }
}

impl FromColumn for Decimal {
    fn from_value(value: Value) -> Result<Self, BoxError> {
        parse_text(value)
    }
}

impl FromColumn for bool {
    fn from_value(value: Value) -> Result<Self, BoxError> {
        match value {
            Value::Integer(i) => Ok(i != 0),
            other => Err(format!("expected INTEGER, found {}", other.data_type()).into()),
        }
    }
}

impl FromColumn for i64 {
    fn from_value(value: Value) -> Result<Self, BoxError> {
        match value {
            Value::Integer(i) => Ok(i),
            other => Err(format!("expected INTEGER, found {}", other.data_type()).into()),
        }
    }
}

impl FromColumn for f64 {
    fn from_value(value: Value) -> Result<Self, BoxError> {
        match value {
            Value::Real(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            other => Err(format!("expected REAL, found {}", other.data_type()).into()),
        }
    }
}

impl<T: FromColumn> FromColumn for Option<T> {
    fn from_value(value: Value) -> Result<Self, BoxError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_instant_format_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let fractional = whole + chrono::Duration::nanoseconds(1_500);
        let a = format_instant(&whole);
        let b = format_instant(&fractional);
        assert_eq!(a, "2024-03-01T08:00:00.000000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    #[test]
    fn test_option_null_roundtrip() {
        let none: Option<Uuid> = None;
        assert_eq!(none.to_sql_value(), Value::Null);
        let back: Option<Uuid> = FromColumn::from_value(Value::Null).unwrap();
        assert_eq!(back, None);
    }

    #[test]
    fn test_typed_conversions() {
        let id = Uuid::new_v4();
        assert_eq!(Uuid::from_value(id.to_sql_value()).unwrap(), id);

        let amount = Decimal::new(12345, 2);
        assert_eq!(Decimal::from_value(amount.to_sql_value()).unwrap(), amount);

        let date = NaiveDate::from_ymd_opt(1980, 2, 29).unwrap();
        assert_eq!(date.to_sql_value(), Value::Text("1980-02-29".into()));
        assert_eq!(NaiveDate::from_value(date.to_sql_value()).unwrap(), date);

        assert_eq!(true.to_sql_value(), Value::Integer(1));
        assert!(!bool::from_value(Value::Integer(0)).unwrap());
    }

    #[test]
    fn test_mismatched_storage_type_rejected() {
        assert!(String::from_value(Value::Integer(3)).is_err());
        assert!(Uuid::from_value(Value::Text("not-a-uuid".into())).is_err());
    }
}
