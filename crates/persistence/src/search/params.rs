//! Typed search parameter values.
//!
//! Filter values arrive as plain strings. Dates and numbers accept the FHIR
//! comparison prefixes (`eq`, `ne`, `gt`, `ge`, `lt`, `le`); a missing prefix
//! means `eq`.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::error::ValidationError;

/// Comparison prefix of a date or number parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparator {
    /// Splits a recognized prefix off `value`.
    fn split(value: &str) -> (Comparator, &str) {
        let prefix = value.get(..2).unwrap_or("");
        let comparator = match prefix {
            "eq" => Comparator::Eq,
            "ne" => Comparator::Ne,
            "gt" => Comparator::Gt,
            "ge" => Comparator::Ge,
            "lt" => Comparator::Lt,
            "le" => Comparator::Le,
            _ => return (Comparator::Eq, value),
        };
        (comparator, &value[2..])
    }

    /// SQL operator for point comparisons.
    pub(crate) fn operator(self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "<>",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
        }
    }
}

/// A date parameter covering the half-open interval `[start, end)`.
///
/// `2024-03-01` covers the whole UTC day, `2024-03` the month, `2024` the
/// year; a full timestamp covers exactly that instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParam {
    pub comparator: Comparator,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateParam {
    /// Parses a prefixed FHIR date, date-time or partial date.
    pub fn parse(value: &str) -> Result<Self, String> {
        let (comparator, raw) = Comparator::split(value.trim());
        let (start, end) = parse_range(raw).ok_or_else(|| format!("invalid date '{raw}'"))?;
        Ok(Self {
            comparator,
            start,
            end,
        })
    }

    /// The interval as calendar dates, `[start, end)`.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        let start = self.start.date_naive();
        let last_covered = (self.end - TimeDelta::nanoseconds(1)).date_naive();
        let end = last_covered
            .checked_add_days(Days::new(1))
            .unwrap_or(last_covered);
        (start, end)
    }
}

fn parse_range(raw: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        let start = instant.with_timezone(&Utc);
        return Some((start, start + TimeDelta::nanoseconds(1)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        let start = naive.and_utc();
        return Some((start, start + TimeDelta::nanoseconds(1)));
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return day_span(day, day.checked_add_days(Days::new(1))?);
    }
    let parts: Vec<&str> = raw.split('-').collect();
    match parts.as_slice() {
        [year, month] if year.len() == 4 && month.len() == 2 => {
            let first = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)?;
            day_span(first, first.checked_add_months(Months::new(1))?)
        }
        [year] if year.len() == 4 => {
            let first = NaiveDate::from_ymd_opt(year.parse().ok()?, 1, 1)?;
            day_span(first, first.with_year(first.year() + 1)?)
        }
        _ => None,
    }
}

fn day_span(start: NaiveDate, end: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    Some((
        start.and_hms_opt(0, 0, 0)?.and_utc(),
        end.and_hms_opt(0, 0, 0)?.and_utc(),
    ))
}

/// A numeric parameter such as `ge0.5`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberParam {
    pub comparator: Comparator,
    pub value: f64,
}

impl NumberParam {
    pub fn parse(value: &str) -> Result<Self, String> {
        let (comparator, raw) = Comparator::split(value.trim());
        let value = raw
            .parse::<f64>()
            .map_err(|_| format!("invalid number '{raw}'"))?;
        if !value.is_finite() {
            return Err(format!("invalid number '{raw}'"));
        }
        Ok(Self { comparator, value })
    }
}

fn invalid(key: &str, message: String) -> ValidationError {
    ValidationError::InvalidSearchParameter {
        parameter: key.to_string(),
        message,
    }
}

/// Parses a code or free-text filter value. Blank values are rejected.
pub fn token(key: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(key, "value must not be blank".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Parses a reference filter value.
pub fn uuid(key: &str, value: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(value.trim()).map_err(|e| invalid(key, format!("invalid id: {e}")))
}

/// Parses a date filter value.
pub fn date(key: &str, value: &str) -> Result<DateParam, ValidationError> {
    DateParam::parse(value).map_err(|e| invalid(key, e))
}

/// Parses a numeric filter value.
pub fn number(key: &str, value: &str) -> Result<NumberParam, ValidationError> {
    NumberParam::parse(value).map_err(|e| invalid(key, e))
}

/// Parses an integer filter value, with optional comparison prefix.
pub fn integer(key: &str, value: &str) -> Result<NumberParam, ValidationError> {
    let param = number(key, value)?;
    if param.value.fract() != 0.0 {
        return Err(invalid(key, format!("expected an integer, got '{value}'")));
    }
    Ok(param)
}

/// Parses a `true`/`false` filter value.
pub fn boolean(key: &str, value: &str) -> Result<bool, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(invalid(key, format!("expected true or false, got '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_precision_covers_whole_day() {
        let param = DateParam::parse("ge2024-03-01").unwrap();
        assert_eq!(param.comparator, Comparator::Ge);
        assert_eq!(param.start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(param.end, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_blank_token_rejected() {
        assert_eq!(token("status", " active ").unwrap(), "active");
        assert!(matches!(
            token("status", "  "),
            Err(ValidationError::InvalidSearchParameter { .. })
        ));
    }

    #[test]
    fn test_partial_dates() {
        let month = DateParam::parse("2024-02").unwrap();
        assert_eq!(month.comparator, Comparator::Eq);
        assert_eq!(month.end, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        let year = DateParam::parse("lt2023").unwrap();
        assert_eq!(year.comparator, Comparator::Lt);
        assert_eq!(year.start, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(year.end, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_instant_precision() {
        let param = DateParam::parse("le2024-03-01T10:30:00+02:00").unwrap();
        assert_eq!(param.start, Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap());
        assert_eq!(param.end - param.start, TimeDelta::nanoseconds(1));
        assert_eq!(
            param.date_range(),
            (
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
            )
        );
    }

    #[test]
    fn test_invalid_dates() {
        assert!(DateParam::parse("yesterday").is_err());
        assert!(DateParam::parse("2024-13-01").is_err());
        assert!(date("date", "ge").is_err());
    }

    #[test]
    fn test_number_prefixes() {
        let param = NumberParam::parse("gt0.25").unwrap();
        assert_eq!(param.comparator, Comparator::Gt);
        assert_eq!(param.value, 0.25);
        assert_eq!(NumberParam::parse("7").unwrap().comparator, Comparator::Eq);
        assert!(NumberParam::parse("NaN").is_err());
        assert!(integer("cycle", "2.5").is_err());
    }

    #[test]
    fn test_scalar_helpers() {
        assert!(uuid("patient", "not-a-uuid").is_err());
        assert!(boolean("active", "TRUE").unwrap());
        assert!(boolean("active", "yes").is_err());
    }
}
