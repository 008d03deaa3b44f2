//! Store error types
//!
//! Defines all errors that can occur in the store layer, including the
//! per-value validation errors that accumulate when an entry is checked
//! against its metric's unit type.

use thiserror::Error;

/// A single validation failure for an entry value
///
/// More than one of these can apply to the same write attempt; callers
/// collect them and report the full set rather than stopping at the first.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// Value has a non-zero fractional part but the unit is integer-typed
    #[error("value {value} is not a whole number")]
    NonInteger { value: f64 },

    /// Value is below the configured range start
    #[error("value {value} is below the minimum of {min}")]
    BelowMin { value: f64, min: i64 },

    /// Value is above the configured range end
    #[error("value {value} is above the maximum of {max}")]
    AboveMax { value: f64, max: i64 },

    /// The unit's range configuration itself is unusable
    #[error("invalid range configuration: {reason}")]
    InvalidRangeConfig { reason: String },
}

/// Errors that can occur in the store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying SQLite error
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O failure opening or preparing the database file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A case-insensitive name collision on create (non-fatal, informational)
    #[error("{kind} '{name}' already exists")]
    DuplicateName { kind: &'static str, name: String },

    /// Referenced row does not exist
    #[error("{kind} with id {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    /// One or more value validation failures; nothing was written
    #[error("invalid value: {}", format_value_errors(.0))]
    InvalidValue(Vec<ValueError>),

    /// A metric's range edit would strand existing entry values
    #[error("cannot set range {bound} to {proposed}: existing entry has value {existing}")]
    RangeConflict {
        bound: &'static str,
        proposed: i64,
        existing: f64,
    },

    /// Required title was empty after trimming
    #[error("title must not be empty")]
    EmptyTitle,

    /// Name was empty after trimming
    #[error("name must not be empty")]
    EmptyName,
}

fn format_value_errors(errors: &[ValueError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::DuplicateName {
            kind: "category",
            name: "sleep".to_string(),
        };
        assert_eq!(err.to_string(), "category 'sleep' already exists");

        let err = StoreError::RangeConflict {
            bound: "start",
            proposed: 10,
            existing: 5.0,
        };
        assert_eq!(
            err.to_string(),
            "cannot set range start to 10: existing entry has value 5"
        );
    }

    #[test]
    fn test_accumulated_value_errors_display() {
        let err = StoreError::InvalidValue(vec![
            ValueError::NonInteger { value: 2.5 },
            ValueError::BelowMin { value: 2.5, min: 3 },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("not a whole number"));
        assert!(msg.contains("below the minimum of 3"));
    }
}
