//! Tally store - SQLite-backed CRUD for the tracking data model
//!
//! The store owns the four relations (categories, metrics, entries,
//! change_events) and enforces the write-time contracts:
//!
//! - names are normalized and unique case-insensitively
//! - entry values are validated against the owning metric's unit type,
//!   with all failures accumulated and nothing written on error
//! - a metric's integer range may only be narrowed as far as its existing
//!   entry values permit
//! - archiving is a soft hide, never a delete
//!
//! Concurrency is a single connection behind a mutex; the workload is one
//! user session doing request/response CRUD, so last writer wins.

pub mod error;
pub mod schema;
pub mod types;

pub use error::{StoreError, StoreResult, ValueError};
pub use types::{
    normalize_name, timestamp_for, Category, ChangeEvent, Entry, EventTime, Metric, MetricSpec,
    UnitSpec, UnitType,
};

use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed store for categories, metrics, entries, and change events
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a store at the given path
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (tests, ephemeral sessions)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    // ==================== Categories ====================

    /// Add a category; rejects a case-insensitive duplicate
    pub fn add_category(&self, name: &str) -> StoreResult<Category> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let conn = self.conn();
        let existing: Option<i64> = conn
            .query_row("SELECT id FROM categories WHERE name = ?1", [&name], |r| {
                r.get(0)
            })
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::DuplicateName {
                kind: "category",
                name,
            });
        }

        conn.execute("INSERT INTO categories (name) VALUES (?1)", [&name])?;
        let id = conn.last_insert_rowid();
        tracing::debug!(category = %name, id, "Added category");
        Ok(Category { id, name })
    }

    /// Look up a category by normalized name
    pub fn find_category(&self, name: &str) -> StoreResult<Option<Category>> {
        let name = normalize_name(name);
        let conn = self.conn();
        let found = conn
            .query_row(
                "SELECT id, name FROM categories WHERE name = ?1",
                [&name],
                |r| {
                    Ok(Category {
                        id: r.get(0)?,
                        name: r.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    /// Find a category by name, creating it if absent.
    ///
    /// Backs the inline "create new" flow during metric definition and the
    /// category column of imports.
    pub fn ensure_category(&self, name: &str) -> StoreResult<Category> {
        if let Some(cat) = self.find_category(name)? {
            return Ok(cat);
        }
        self.add_category(name)
    }

    /// Get a category by id
    pub fn get_category(&self, id: i64) -> StoreResult<Category> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name FROM categories WHERE id = ?1",
            [id],
            |r| {
                Ok(Category {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            },
        )
        .optional()?
        .ok_or(StoreError::NotFound {
            kind: "category",
            id,
        })
    }

    /// List all categories, ordered by name
    pub fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], |r| {
            Ok(Category {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ==================== Metrics ====================

    /// Create a metric.
    ///
    /// The name is normalized and must be unique case-insensitively among
    /// all metrics, archived ones included. The unit spec must be valid.
    pub fn create_metric(&self, spec: &MetricSpec) -> StoreResult<Metric> {
        let name = normalize_name(&spec.name);
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        spec.unit
            .validate_config()
            .map_err(|e| StoreError::InvalidValue(vec![e]))?;

        let conn = self.conn();
        let existing: Option<i64> = conn
            .query_row("SELECT id FROM metrics WHERE name = ?1", [&name], |r| {
                r.get(0)
            })
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::DuplicateName {
                kind: "metric",
                name,
            });
        }

        conn.execute(
            "INSERT INTO metrics
                (name, description, category_id, unit_name, unit_type, range_start, range_end, is_archived)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
            params![
                name,
                spec.description,
                spec.category_id,
                spec.unit.name,
                spec.unit.unit_type.to_string(),
                spec.unit.range_start,
                spec.unit.range_end,
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(metric = %name, id, "Created metric");

        Ok(Metric {
            id,
            name,
            description: spec.description.clone(),
            category_id: spec.category_id,
            unit: spec.unit.clone(),
            is_archived: false,
        })
    }

    /// Get a metric by id
    pub fn get_metric(&self, id: i64) -> StoreResult<Metric> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description, category_id, unit_name, unit_type,
                    range_start, range_end, is_archived
             FROM metrics WHERE id = ?1",
            [id],
            row_to_metric,
        )
        .optional()?
        .ok_or(StoreError::NotFound { kind: "metric", id })
    }

    /// Look up a metric by normalized name (archived included)
    pub fn find_metric(&self, name: &str) -> StoreResult<Option<Metric>> {
        let name = normalize_name(name);
        let conn = self.conn();
        let found = conn
            .query_row(
                "SELECT id, name, description, category_id, unit_name, unit_type,
                        range_start, range_end, is_archived
                 FROM metrics WHERE name = ?1",
                [&name],
                row_to_metric,
            )
            .optional()?;
        Ok(found)
    }

    /// List metrics, ordered by name; archived metrics only on request
    pub fn list_metrics(&self, include_archived: bool) -> StoreResult<Vec<Metric>> {
        let conn = self.conn();
        let sql = if include_archived {
            "SELECT id, name, description, category_id, unit_name, unit_type,
                    range_start, range_end, is_archived
             FROM metrics ORDER BY name"
        } else {
            "SELECT id, name, description, category_id, unit_name, unit_type,
                    range_start, range_end, is_archived
             FROM metrics WHERE is_archived = 0 ORDER BY name"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], row_to_metric)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Full-payload metric update.
    ///
    /// For an integer-range unit the proposed bounds are checked against the
    /// metric's existing entry values: the range may grow freely but may
    /// only shrink to the tightest bound still covering all recorded data.
    pub fn update_metric(&self, id: i64, spec: &MetricSpec) -> StoreResult<Metric> {
        let current = self.get_metric(id)?;

        let name = normalize_name(&spec.name);
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        spec.unit
            .validate_config()
            .map_err(|e| StoreError::InvalidValue(vec![e]))?;

        if name != current.name {
            let conn = self.conn();
            let clash: Option<i64> = conn
                .query_row(
                    "SELECT id FROM metrics WHERE name = ?1 AND id != ?2",
                    params![name, id],
                    |r| r.get(0),
                )
                .optional()?;
            if clash.is_some() {
                return Err(StoreError::DuplicateName {
                    kind: "metric",
                    name,
                });
            }
        }

        if spec.unit.unit_type == UnitType::IntegerRange {
            if let Some((actual_min, actual_max)) = self.entry_value_bounds(id)? {
                if let Some(start) = spec.unit.range_start {
                    if (start as f64) > actual_min {
                        return Err(StoreError::RangeConflict {
                            bound: "start",
                            proposed: start,
                            existing: actual_min,
                        });
                    }
                }
                if let Some(end) = spec.unit.range_end {
                    if (end as f64) < actual_max {
                        return Err(StoreError::RangeConflict {
                            bound: "end",
                            proposed: end,
                            existing: actual_max,
                        });
                    }
                }
            }
        }

        let conn = self.conn();
        conn.execute(
            "UPDATE metrics SET
                name = ?1, description = ?2, category_id = ?3,
                unit_name = ?4, unit_type = ?5, range_start = ?6, range_end = ?7
             WHERE id = ?8",
            params![
                name,
                spec.description,
                spec.category_id,
                spec.unit.name,
                spec.unit.unit_type.to_string(),
                spec.unit.range_start,
                spec.unit.range_end,
                id,
            ],
        )?;
        tracing::info!(metric = %name, id, "Updated metric");

        Ok(Metric {
            id,
            name,
            description: spec.description.clone(),
            category_id: spec.category_id,
            unit: spec.unit.clone(),
            is_archived: current.is_archived,
        })
    }

    /// Flip the archived flag; every other field is untouched
    pub fn set_archived(&self, id: i64, archived: bool) -> StoreResult<Metric> {
        let mut metric = self.get_metric(id)?;
        let conn = self.conn();
        conn.execute(
            "UPDATE metrics SET is_archived = ?1 WHERE id = ?2",
            params![archived as i64, id],
        )?;
        metric.is_archived = archived;
        tracing::info!(metric = %metric.name, id, archived, "Toggled archive flag");
        Ok(metric)
    }

    /// Min and max entry values recorded for a metric, if it has any
    pub fn entry_value_bounds(&self, metric_id: i64) -> StoreResult<Option<(f64, f64)>> {
        let conn = self.conn();
        let bounds: (Option<f64>, Option<f64>) = conn.query_row(
            "SELECT MIN(value), MAX(value) FROM entries WHERE metric_id = ?1",
            [metric_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(match bounds {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        })
    }

    // ==================== Entries ====================

    /// Record an observation for a metric on a given date.
    ///
    /// A missing time defaults to midday. The raw value is validated against
    /// the metric's unit type; on any validation failure the full error set
    /// is returned and nothing is written.
    pub fn add_entry(
        &self,
        metric_id: i64,
        raw_value: f64,
        date: NaiveDate,
        time: Option<NaiveTime>,
    ) -> StoreResult<Entry> {
        self.add_entry_at(metric_id, raw_value, timestamp_for(date, time))
    }

    /// Record an observation at an explicit timestamp (millis)
    pub fn add_entry_at(
        &self,
        metric_id: i64,
        raw_value: f64,
        recorded_at: i64,
    ) -> StoreResult<Entry> {
        let metric = self.get_metric(metric_id)?;
        let value = metric
            .unit
            .validate_value(raw_value)
            .map_err(StoreError::InvalidValue)?;

        let conn = self.conn();
        conn.execute(
            "INSERT INTO entries (metric_id, value, recorded_at) VALUES (?1, ?2, ?3)",
            params![metric_id, value, recorded_at],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(metric = %metric.name, value, recorded_at, "Recorded entry");

        Ok(Entry {
            id,
            metric_id,
            value,
            recorded_at,
        })
    }

    /// Get an entry by id
    pub fn get_entry(&self, id: i64) -> StoreResult<Entry> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, metric_id, value, recorded_at FROM entries WHERE id = ?1",
            [id],
            row_to_entry,
        )
        .optional()?
        .ok_or(StoreError::NotFound { kind: "entry", id })
    }

    /// Full-payload entry update; the value is re-validated against the
    /// owning metric exactly as at creation. Last write wins.
    pub fn update_entry(&self, id: i64, raw_value: f64, recorded_at: i64) -> StoreResult<Entry> {
        let entry = self.get_entry(id)?;
        let metric = self.get_metric(entry.metric_id)?;
        let value = metric
            .unit
            .validate_value(raw_value)
            .map_err(StoreError::InvalidValue)?;

        let conn = self.conn();
        conn.execute(
            "UPDATE entries SET value = ?1, recorded_at = ?2 WHERE id = ?3",
            params![value, recorded_at, id],
        )?;

        Ok(Entry {
            id,
            metric_id: entry.metric_id,
            value,
            recorded_at,
        })
    }

    /// Delete an entry; no history is kept
    pub fn delete_entry(&self, id: i64) -> StoreResult<()> {
        let conn = self.conn();
        let affected = conn.execute("DELETE FROM entries WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(StoreError::NotFound { kind: "entry", id });
        }
        Ok(())
    }

    /// All entries for a metric, timestamp ascending
    pub fn entries_for_metric(&self, metric_id: i64) -> StoreResult<Vec<Entry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, metric_id, value, recorded_at FROM entries
             WHERE metric_id = ?1 ORDER BY recorded_at ASC",
        )?;
        let rows = stmt.query_map([metric_id], row_to_entry)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ==================== Change events ====================

    /// Record a change event against a category.
    ///
    /// The title must be non-empty after trimming; empty notes normalize to
    /// absent. `when` resolves per the fixed enumeration (Now / Today /
    /// Yesterday / Custom).
    pub fn add_change_event(
        &self,
        category_id: i64,
        title: &str,
        notes: Option<&str>,
        when: EventTime,
    ) -> StoreResult<ChangeEvent> {
        self.get_category(category_id)?;

        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        let notes = normalize_notes(notes);
        let recorded_at = when.resolve(Utc::now());

        let conn = self.conn();
        conn.execute(
            "INSERT INTO change_events (category_id, title, notes, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![category_id, title, notes, recorded_at],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(category_id, title, "Recorded change event");

        Ok(ChangeEvent {
            id,
            category_id,
            title: title.to_string(),
            notes,
            recorded_at,
        })
    }

    /// Full-payload change event update
    pub fn update_change_event(
        &self,
        id: i64,
        title: &str,
        notes: Option<&str>,
        recorded_at: i64,
    ) -> StoreResult<ChangeEvent> {
        let current = self.get_change_event(id)?;

        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        let notes = normalize_notes(notes);

        let conn = self.conn();
        conn.execute(
            "UPDATE change_events SET title = ?1, notes = ?2, recorded_at = ?3 WHERE id = ?4",
            params![title, notes, recorded_at, id],
        )?;

        Ok(ChangeEvent {
            id,
            category_id: current.category_id,
            title: title.to_string(),
            notes,
            recorded_at,
        })
    }

    /// Get a change event by id
    pub fn get_change_event(&self, id: i64) -> StoreResult<ChangeEvent> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, category_id, title, notes, recorded_at
             FROM change_events WHERE id = ?1",
            [id],
            row_to_change_event,
        )
        .optional()?
        .ok_or(StoreError::NotFound {
            kind: "change event",
            id,
        })
    }

    /// Delete a change event
    pub fn delete_change_event(&self, id: i64) -> StoreResult<()> {
        let conn = self.conn();
        let affected = conn.execute("DELETE FROM change_events WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(StoreError::NotFound {
                kind: "change event",
                id,
            });
        }
        Ok(())
    }

    /// Change events, most recent first, optionally for one category
    pub fn list_change_events(&self, category_id: Option<i64>) -> StoreResult<Vec<ChangeEvent>> {
        let conn = self.conn();
        match category_id {
            Some(cid) => {
                let mut stmt = conn.prepare(
                    "SELECT id, category_id, title, notes, recorded_at FROM change_events
                     WHERE category_id = ?1 ORDER BY recorded_at DESC",
                )?;
                let rows = stmt.query_map([cid], row_to_change_event)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, category_id, title, notes, recorded_at FROM change_events
                     ORDER BY recorded_at DESC",
                )?;
                let rows = stmt.query_map([], row_to_change_event)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
        }
    }

    // ==================== Maintenance ====================

    /// Delete every row in every table. Used by the maintenance CLI.
    pub fn purge(&self) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute_batch(
            "DELETE FROM entries;
             DELETE FROM change_events;
             DELETE FROM metrics;
             DELETE FROM categories;",
        )?;
        tracing::warn!("Purged all store data");
        Ok(())
    }

    /// Row counts per table: (categories, metrics, entries, change events)
    pub fn counts(&self) -> StoreResult<(usize, usize, usize, usize)> {
        let conn = self.conn();
        let count = |table: &str| -> rusqlite::Result<usize> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
                r.get::<_, i64>(0).map(|n| n as usize)
            })
        };
        Ok((
            count("categories")?,
            count("metrics")?,
            count("entries")?,
            count("change_events")?,
        ))
    }
}

fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn row_to_metric(row: &Row<'_>) -> rusqlite::Result<Metric> {
    let unit_type_str: String = row.get(5)?;
    let unit_type = UnitType::parse(&unit_type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown unit type '{}'", unit_type_str).into(),
        )
    })?;

    Ok(Metric {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category_id: row.get(3)?,
        unit: UnitSpec {
            name: row.get(4)?,
            unit_type,
            range_start: row.get(6)?,
            range_end: row.get(7)?,
        },
        is_archived: row.get::<_, i64>(8)? != 0,
    })
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        metric_id: row.get(1)?,
        value: row.get(2)?,
        recorded_at: row.get(3)?,
    })
}

fn row_to_change_event(row: &Row<'_>) -> rusqlite::Result<ChangeEvent> {
    Ok(ChangeEvent {
        id: row.get(0)?,
        category_id: row.get(1)?,
        title: row.get(2)?,
        notes: row.get(3)?,
        recorded_at: row.get(4)?,
    })
}
