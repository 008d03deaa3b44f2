//! Core data types for the Tally store
//!
//! This module defines the fundamental types used throughout the store:
//! - `Category`: a named grouping for metrics and change events
//! - `UnitType` / `UnitSpec`: value typing and range constraints
//! - `Metric`: definition of a trackable quantity
//! - `Entry`: a single timestamped observation
//! - `ChangeEvent`: a free-text lifestyle annotation
//! - `EventTime`: the fixed enumeration of ways to date a change event

use crate::store::error::ValueError;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalize a user-supplied name: trim whitespace and lowercase.
///
/// All name uniqueness in the store is case-insensitive; normalizing at the
/// edge means plain equality works everywhere else.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Convert a date (and optional time) into a UTC timestamp in milliseconds.
///
/// A missing time defaults to midday. Midday is never shifted onto an
/// adjacent calendar day by timezone offsets up to twelve hours, so a
/// date-only entry stays on the day the user picked.
pub fn timestamp_for(date: NaiveDate, time: Option<NaiveTime>) -> i64 {
    let time = time.unwrap_or_else(midday);
    date.and_time(time).and_utc().timestamp_millis()
}

fn midday() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap()
}

/// A named grouping for metrics and change events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// Normalized name, unique case-insensitively
    pub name: String,
}

/// How entry values for a metric are typed and validated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    /// Any real number
    Float,
    /// Whole numbers only
    Integer,
    /// Whole numbers within an inclusive `[range_start, range_end]`
    IntegerRange,
}

impl UnitType {
    /// Parse from the wire/file representation
    pub fn parse(s: &str) -> Option<UnitType> {
        match s.trim().to_lowercase().as_str() {
            "float" => Some(UnitType::Float),
            "integer" => Some(UnitType::Integer),
            "integer_range" => Some(UnitType::IntegerRange),
            _ => None,
        }
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitType::Float => write!(f, "float"),
            UnitType::Integer => write!(f, "integer"),
            UnitType::IntegerRange => write!(f, "integer_range"),
        }
    }
}

/// Unit specification embedded on a metric
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitSpec {
    /// Display name of the unit (e.g. "kg", "hours")
    #[serde(default)]
    pub name: Option<String>,
    /// Value typing for validation
    pub unit_type: UnitType,
    /// Inclusive lower bound (integer_range only)
    #[serde(default)]
    pub range_start: Option<i64>,
    /// Inclusive upper bound (integer_range only)
    #[serde(default)]
    pub range_end: Option<i64>,
}

impl UnitSpec {
    /// Create a unitless spec of the given type
    pub fn new(unit_type: UnitType) -> Self {
        Self {
            name: None,
            unit_type,
            range_start: None,
            range_end: None,
        }
    }

    /// Builder: set the unit display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: set the valid range
    pub fn range(mut self, start: i64, end: i64) -> Self {
        self.range_start = Some(start);
        self.range_end = Some(end);
        self
    }

    /// Check that the unit configuration itself is usable.
    ///
    /// `integer_range` requires both bounds with `range_start < range_end`.
    /// Other types must not carry bounds.
    pub fn validate_config(&self) -> Result<(), ValueError> {
        match self.unit_type {
            UnitType::IntegerRange => match (self.range_start, self.range_end) {
                (Some(start), Some(end)) if start < end => Ok(()),
                (Some(start), Some(end)) => Err(ValueError::InvalidRangeConfig {
                    reason: format!("range start {} must be below range end {}", start, end),
                }),
                _ => Err(ValueError::InvalidRangeConfig {
                    reason: "integer_range requires both range_start and range_end".to_string(),
                }),
            },
            _ => {
                if self.range_start.is_some() || self.range_end.is_some() {
                    Err(ValueError::InvalidRangeConfig {
                        reason: format!("unit type {} does not take a range", self.unit_type),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Validate a raw value against this spec.
    ///
    /// Returns the value to store on success (integral types are coerced to
    /// a whole number). All applicable failures are accumulated, not just
    /// the first: an integer-range check still tests both bounds.
    pub fn validate_value(&self, raw: f64) -> Result<f64, Vec<ValueError>> {
        let mut errors = Vec::new();

        match self.unit_type {
            UnitType::Float => {}
            UnitType::Integer | UnitType::IntegerRange => {
                if raw.fract() != 0.0 {
                    errors.push(ValueError::NonInteger { value: raw });
                }
            }
        }

        if self.unit_type == UnitType::IntegerRange {
            if let Some(min) = self.range_start {
                if raw < min as f64 {
                    errors.push(ValueError::BelowMin { value: raw, min });
                }
            }
            if let Some(max) = self.range_end {
                if raw > max as f64 {
                    errors.push(ValueError::AboveMax { value: raw, max });
                }
            }
        }

        if errors.is_empty() {
            Ok(match self.unit_type {
                UnitType::Float => raw,
                UnitType::Integer | UnitType::IntegerRange => raw.trunc(),
            })
        } else {
            Err(errors)
        }
    }
}

/// Definition of a metric (what's being tracked)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    /// Unique identifier
    pub id: i64,
    /// Normalized name, unique case-insensitively (archived metrics included)
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Optional owning category
    #[serde(default)]
    pub category_id: Option<i64>,
    /// Embedded unit specification
    pub unit: UnitSpec,
    /// Soft-hide flag; archived metrics keep their data
    #[serde(default)]
    pub is_archived: bool,
}

/// Payload for creating or fully updating a metric
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub unit: UnitSpec,
}

impl MetricSpec {
    /// Create a spec with required fields
    pub fn new(name: impl Into<String>, unit: UnitSpec) -> Self {
        Self {
            name: name.into(),
            description: None,
            category_id: None,
            unit,
        }
    }

    /// Builder: set description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Builder: set owning category
    pub fn category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// One timestamped numeric observation for a metric
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    /// Unique identifier
    pub id: i64,
    /// Owning metric
    pub metric_id: i64,
    /// Measured value (integral for integer-typed units)
    pub value: f64,
    /// Unix timestamp in milliseconds
    pub recorded_at: i64,
}

/// A timestamped free-text annotation attached to a category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    /// Unique identifier
    pub id: i64,
    /// Owning category
    pub category_id: i64,
    /// Required title, trimmed non-empty
    pub title: String,
    /// Optional notes; empty input normalizes to absent
    #[serde(default)]
    pub notes: Option<String>,
    /// Unix timestamp in milliseconds
    pub recorded_at: i64,
}

/// When a change event happened, as offered to the user
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventTime {
    /// The current instant
    Now,
    /// Today at midday
    Today,
    /// Yesterday at midday
    Yesterday,
    /// A caller-supplied date and optional time (midday if absent)
    Custom(NaiveDate, Option<NaiveTime>),
}

impl EventTime {
    /// Resolve to a UTC timestamp in milliseconds, relative to `now`
    pub fn resolve(&self, now: DateTime<Utc>) -> i64 {
        match self {
            EventTime::Now => now.timestamp_millis(),
            EventTime::Today => timestamp_for(now.date_naive(), None),
            EventTime::Yesterday => timestamp_for(now.date_naive() - Duration::days(1), None),
            EventTime::Custom(date, time) => timestamp_for(*date, *time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Sleep "), "sleep");
        assert_eq!(normalize_name("HEART rate"), "heart rate");
    }

    #[test]
    fn test_timestamp_defaults_to_midday() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let ts = timestamp_for(date, None);
        let dt = DateTime::from_timestamp_millis(ts).unwrap();
        assert_eq!(dt.date_naive(), date);
        assert_eq!(dt.time(), NaiveTime::from_hms_opt(12, 0, 0).unwrap());
    }

    #[test]
    fn test_unit_type_parse() {
        assert_eq!(UnitType::parse("float"), Some(UnitType::Float));
        assert_eq!(UnitType::parse(" Integer "), Some(UnitType::Integer));
        assert_eq!(UnitType::parse("integer_range"), Some(UnitType::IntegerRange));
        assert_eq!(UnitType::parse("percentage"), None);
    }

    #[test]
    fn test_float_accepts_anything_finite() {
        let unit = UnitSpec::new(UnitType::Float);
        assert_eq!(unit.validate_value(7.25), Ok(7.25));
        assert_eq!(unit.validate_value(-3.0), Ok(-3.0));
    }

    #[test]
    fn test_integer_rejects_fractional() {
        let unit = UnitSpec::new(UnitType::Integer);
        assert_eq!(unit.validate_value(80.0), Ok(80.0));

        let errs = unit.validate_value(80.5).unwrap_err();
        assert_eq!(errs, vec![ValueError::NonInteger { value: 80.5 }]);
    }

    #[test]
    fn test_integer_range_bounds_inclusive() {
        let unit = UnitSpec::new(UnitType::IntegerRange).range(1, 10);
        assert_eq!(unit.validate_value(1.0), Ok(1.0));
        assert_eq!(unit.validate_value(10.0), Ok(10.0));

        let errs = unit.validate_value(0.0).unwrap_err();
        assert_eq!(errs, vec![ValueError::BelowMin { value: 0.0, min: 1 }]);

        let errs = unit.validate_value(11.0).unwrap_err();
        assert_eq!(errs, vec![ValueError::AboveMax { value: 11.0, max: 10 }]);
    }

    #[test]
    fn test_integer_range_accumulates_errors() {
        // A fractional out-of-range value fails both checks at once.
        let unit = UnitSpec::new(UnitType::IntegerRange).range(1, 10);
        let errs = unit.validate_value(10.5).unwrap_err();
        assert_eq!(
            errs,
            vec![
                ValueError::NonInteger { value: 10.5 },
                ValueError::AboveMax { value: 10.5, max: 10 },
            ]
        );
    }

    #[test]
    fn test_range_config_validation() {
        assert!(UnitSpec::new(UnitType::IntegerRange)
            .range(1, 10)
            .validate_config()
            .is_ok());

        // Missing bounds
        assert!(UnitSpec::new(UnitType::IntegerRange)
            .validate_config()
            .is_err());

        // Inverted bounds
        assert!(UnitSpec::new(UnitType::IntegerRange)
            .range(10, 1)
            .validate_config()
            .is_err());

        // Bounds on a float unit
        assert!(UnitSpec::new(UnitType::Float)
            .range(1, 10)
            .validate_config()
            .is_err());
    }

    #[test]
    fn test_event_time_resolution() {
        let now = Utc.with_ymd_and_hms(2026, 2, 3, 18, 30, 0).unwrap();

        assert_eq!(EventTime::Now.resolve(now), now.timestamp_millis());

        let today = DateTime::from_timestamp_millis(EventTime::Today.resolve(now)).unwrap();
        assert_eq!(today.date_naive(), now.date_naive());
        assert_eq!(today.time(), NaiveTime::from_hms_opt(12, 0, 0).unwrap());

        let yesterday =
            DateTime::from_timestamp_millis(EventTime::Yesterday.resolve(now)).unwrap();
        assert_eq!(
            yesterday.date_naive(),
            NaiveDate::from_ymd_opt(2026, 2, 2).unwrap()
        );

        let custom = EventTime::Custom(
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            NaiveTime::from_hms_opt(8, 45, 0),
        );
        let resolved = DateTime::from_timestamp_millis(custom.resolve(now)).unwrap();
        assert_eq!(resolved.time(), NaiveTime::from_hms_opt(8, 45, 0).unwrap());
    }
}
