//! Bulk CSV export and import
//!
//! The file format is flat tabular rows of two kinds, distinguished by a
//! `kind` column: entry rows carry metric name, category, value, unit
//! name/type/bounds, archived flag, and timestamp; change rows carry title,
//! notes, category, and timestamp. Legacy files without the `kind` column
//! are treated entirely as entry rows.
//!
//! Import is row-granular: each row is validated (unit type tag against the
//! fixed enumeration, non-empty change titles, numeric value, parseable
//! timestamp) and failures are collected with line numbers and reported
//! together while valid rows still land. Metrics and categories named by
//! entry rows are created on demand, so exporting and re-importing into an
//! empty store reproduces the same data.

use crate::store::{
    MetricSpec, Store, StoreError, UnitSpec, UnitType,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use thiserror::Error;

/// Column order of the export format
const HEADER: [&str; 12] = [
    "kind",
    "metric",
    "category",
    "value",
    "unit",
    "unit_type",
    "range_start",
    "range_end",
    "archived",
    "title",
    "notes",
    "recorded_at",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fatal transfer failures (unreadable file, store unavailable)
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One malformed import row, reported but not fatal
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRowError {
    /// 1-based line number in the file (header is line 1)
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ImportRowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Outcome of an import: what landed and what didn't
#[derive(Debug, Default)]
pub struct ImportReport {
    pub entries_imported: usize,
    pub changes_imported: usize,
    pub metrics_created: usize,
    pub errors: Vec<ImportRowError>,
}

/// Export every entry and change event to the flat CSV format
pub fn export_csv(store: &Store) -> Result<String, TransferError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    let categories: HashMap<i64, String> = store
        .list_categories()?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    for metric in store.list_metrics(true)? {
        let category = metric
            .category_id
            .and_then(|id| categories.get(&id))
            .cloned()
            .unwrap_or_default();

        let unit_type = metric.unit.unit_type.to_string();
        let range_start = opt_i64(metric.unit.range_start);
        let range_end = opt_i64(metric.unit.range_end);

        for entry in store.entries_for_metric(metric.id)? {
            let value = format_value(entry.value);
            let recorded_at = format_timestamp(entry.recorded_at);
            writer.write_record([
                "entry",
                metric.name.as_str(),
                category.as_str(),
                value.as_str(),
                metric.unit.name.as_deref().unwrap_or(""),
                unit_type.as_str(),
                range_start.as_str(),
                range_end.as_str(),
                if metric.is_archived { "true" } else { "false" },
                "",
                "",
                recorded_at.as_str(),
            ])?;
        }
    }

    for event in store.list_change_events(None)? {
        let category = categories
            .get(&event.category_id)
            .cloned()
            .unwrap_or_default();
        let recorded_at = format_timestamp(event.recorded_at);
        writer.write_record([
            "change",
            "",
            category.as_str(),
            "",
            "",
            "",
            "",
            "",
            "",
            event.title.as_str(),
            event.notes.as_deref().unwrap_or(""),
            recorded_at.as_str(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Import a CSV file into the store.
///
/// Rows dispatch on the `kind` column; a file without one is a legacy file
/// and every row is an entry row.
pub fn import_csv(store: &Store, data: &str) -> Result<ImportReport, TransferError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data.as_bytes());

    let headers = reader.headers()?.clone();
    let columns: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_lowercase(), idx))
        .collect();
    let legacy = !columns.contains_key("kind");

    let mut report = ImportReport::default();

    for (row_idx, result) in reader.records().enumerate() {
        let line = row_idx + 2; // line 1 is the header

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                report.errors.push(ImportRowError {
                    line,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let get = |names: &[&str]| -> Option<String> {
            names
                .iter()
                .filter_map(|name| columns.get(*name))
                .filter_map(|idx| record.get(*idx))
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(str::to_string)
        };

        let kind = if legacy {
            "entry".to_string()
        } else {
            get(&["kind"]).unwrap_or_else(|| "entry".to_string())
        };

        let outcome = match kind.to_lowercase().as_str() {
            "entry" => import_entry_row(store, &get, &mut report),
            "change" => import_change_row(store, &get),
            other => Err(format!("unknown row kind '{}'", other)),
        };

        match outcome {
            Ok(RowKind::Entry) => report.entries_imported += 1,
            Ok(RowKind::Change) => report.changes_imported += 1,
            Err(message) => report.errors.push(ImportRowError { line, message }),
        }
    }

    tracing::info!(
        entries = report.entries_imported,
        changes = report.changes_imported,
        failed = report.errors.len(),
        "Import finished"
    );
    Ok(report)
}

enum RowKind {
    Entry,
    Change,
}

fn import_entry_row(
    store: &Store,
    get: &dyn Fn(&[&str]) -> Option<String>,
    report: &mut ImportReport,
) -> Result<RowKind, String> {
    let metric_name = get(&["metric"]).ok_or("entry row is missing a metric name")?;

    let unit_type_tag = get(&["unit_type", "type"]).ok_or("entry row is missing a unit type")?;
    let unit_type =
        UnitType::parse(&unit_type_tag).ok_or_else(|| format!("bad unit type '{}'", unit_type_tag))?;

    let value: f64 = get(&["value"])
        .ok_or("entry row is missing a value")?
        .parse()
        .map_err(|_| "value is not a number".to_string())?;

    let recorded_at = parse_timestamp(
        &get(&["recorded_at", "date"]).ok_or("entry row is missing a timestamp")?,
    )?;

    let metric = match store.find_metric(&metric_name).map_err(|e| e.to_string())? {
        Some(metric) => metric,
        None => {
            // Unknown metric: create it from the row's declared shape
            let mut unit = UnitSpec {
                name: get(&["unit"]),
                unit_type,
                range_start: None,
                range_end: None,
            };
            if unit_type == UnitType::IntegerRange {
                unit.range_start = parse_opt_i64(get(&["range_start"]))?;
                unit.range_end = parse_opt_i64(get(&["range_end"]))?;
            }

            let mut spec = MetricSpec::new(metric_name.clone(), unit);
            if let Some(category) = get(&["category"]) {
                let cat = store.ensure_category(&category).map_err(|e| e.to_string())?;
                spec = spec.category(cat.id);
            }

            let metric = store.create_metric(&spec).map_err(|e| e.to_string())?;
            report.metrics_created += 1;

            if matches!(get(&["archived"]).as_deref(), Some("true") | Some("1")) {
                store
                    .set_archived(metric.id, true)
                    .map_err(|e| e.to_string())?
            } else {
                metric
            }
        }
    };

    store
        .add_entry_at(metric.id, value, recorded_at)
        .map_err(|e| e.to_string())?;
    Ok(RowKind::Entry)
}

fn import_change_row(
    store: &Store,
    get: &dyn Fn(&[&str]) -> Option<String>,
) -> Result<RowKind, String> {
    let title = get(&["title"]).ok_or("change row has an empty title")?;
    let category = get(&["category"]).ok_or("change row is missing a category")?;
    let recorded_at = parse_timestamp(
        &get(&["recorded_at", "date"]).ok_or("change row is missing a timestamp")?,
    )?;

    let cat = store.ensure_category(&category).map_err(|e| e.to_string())?;
    let notes = get(&["notes"]);

    store
        .add_change_event(
            cat.id,
            &title,
            notes.as_deref(),
            crate::store::EventTime::Custom(
                DateTime::from_timestamp_millis(recorded_at)
                    .ok_or("timestamp out of range")?
                    .date_naive(),
                Some(
                    DateTime::from_timestamp_millis(recorded_at)
                        .ok_or("timestamp out of range")?
                        .time(),
                ),
            ),
        )
        .map_err(|e| e.to_string())?;
    Ok(RowKind::Change)
}

fn parse_timestamp(s: &str) -> Result<i64, String> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
        return Ok(dt.and_utc().timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        // Date-only rows land at midday, same as manual entry
        return Ok(crate::store::timestamp_for(date, None));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    Err(format!("cannot parse timestamp '{}'", s))
}

fn parse_opt_i64(s: Option<String>) -> Result<Option<i64>, String> {
    match s {
        None => Ok(None),
        Some(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("'{}' is not a whole number", s)),
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

/// Integers print without a trailing `.0` so re-import round-trips cleanly
fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        // No integer cast: whole-number floats can exceed the i64 range
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn opt_i64(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
