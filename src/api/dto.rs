//! API Data Transfer Objects
//!
//! Request and response types for the HTTP surface. Incoming payloads
//! carry unit types and event times as plain strings and are parsed
//! into domain types at the route boundary, so parse failures surface
//! as validation errors rather than opaque deserialization failures.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::session::{ChangeSet, CommitOutcome};
use crate::store::{Category, ChangeEvent, Entry, EventTime, Metric, UnitType};
use crate::transfer::ImportReport;

// ============================================================================
// Request DTOs
// ============================================================================

/// Create a category
#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

/// Create or replace a metric definition
#[derive(Debug, Deserialize)]
pub struct MetricRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Existing category to attach to
    #[serde(default)]
    pub category_id: Option<i64>,
    /// Category name to create-or-reuse; takes precedence over `category_id`
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit_name: Option<String>,
    pub unit_type: String,
    #[serde(default)]
    pub range_start: Option<i64>,
    #[serde(default)]
    pub range_end: Option<i64>,
}

/// Record an observation
#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    pub metric_id: i64,
    pub value: f64,
    /// Observation date (`YYYY-MM-DD`)
    pub date: NaiveDate,
    /// Optional time of day; defaults to midday
    #[serde(default)]
    pub time: Option<NaiveTime>,
}

/// Full-payload entry update
#[derive(Debug, Deserialize)]
pub struct UpdateEntryRequest {
    pub value: f64,
    pub recorded_at: i64,
}

/// Record a change event
#[derive(Debug, Deserialize)]
pub struct CreateChangeRequest {
    pub category_id: i64,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// One of `now`, `today`, `yesterday`, `custom`
    #[serde(default = "default_when")]
    pub when: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time: Option<NaiveTime>,
}

fn default_when() -> String {
    "now".to_string()
}

impl CreateChangeRequest {
    /// Parse the `when`/`date`/`time` trio into an [`EventTime`]
    pub fn event_time(&self) -> Result<EventTime, String> {
        match self.when.as_str() {
            "now" => Ok(EventTime::Now),
            "today" => Ok(EventTime::Today),
            "yesterday" => Ok(EventTime::Yesterday),
            "custom" => match self.date {
                Some(date) => Ok(EventTime::Custom(date, self.time)),
                None => Err("custom event time requires a date".to_string()),
            },
            other => Err(format!("unknown event time '{}'", other)),
        }
    }
}

/// Full-payload change event update
#[derive(Debug, Deserialize)]
pub struct UpdateChangeRequest {
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub recorded_at: i64,
}

/// Stage a draft on a session, replacing any previous one
#[derive(Debug, Deserialize)]
pub struct StageDraftRequest {
    #[serde(default)]
    pub selected_metric: Option<i64>,
    pub draft: ChangeSet,
}

/// List query for metrics
#[derive(Debug, Default, Deserialize)]
pub struct MetricListQuery {
    #[serde(default)]
    pub include_archived: bool,
}

/// List query for change events
#[derive(Debug, Default, Deserialize)]
pub struct ChangeListQuery {
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// Chart query parameters
#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    #[serde(default = "default_range")]
    pub range: String,
}

fn default_range() -> String {
    "all_time".to_string()
}

// ============================================================================
// Auth DTOs
// ============================================================================

/// Email + password credentials
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Password recovery request
#[derive(Debug, Deserialize)]
pub struct RecoverRequest {
    pub email: String,
}

/// Recovery token verification
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

/// Invite a user by email (admin)
#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Metric with its unit fields flattened for clients
#[derive(Debug, Serialize)]
pub struct MetricResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub unit_name: Option<String>,
    pub unit_type: UnitType,
    pub range_start: Option<i64>,
    pub range_end: Option<i64>,
    pub is_archived: bool,
}

impl From<Metric> for MetricResponse {
    fn from(m: Metric) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            category_id: m.category_id,
            unit_name: m.unit.name,
            unit_type: m.unit.unit_type,
            range_start: m.unit.range_start,
            range_end: m.unit.range_end,
            is_archived: m.is_archived,
        }
    }
}

/// Category list envelope
#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub total: usize,
    pub categories: Vec<Category>,
}

/// Metric list envelope
#[derive(Debug, Serialize)]
pub struct MetricListResponse {
    pub total: usize,
    pub metrics: Vec<MetricResponse>,
}

/// Entry list envelope
#[derive(Debug, Serialize)]
pub struct EntryListResponse {
    pub total: usize,
    pub entries: Vec<Entry>,
}

/// Change event list envelope
#[derive(Debug, Serialize)]
pub struct ChangeListResponse {
    pub total: usize,
    pub changes: Vec<ChangeEvent>,
}

/// Session handle returned on creation
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub created_at: String,
}

/// Draft commit result
#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub deleted: usize,
    pub updated: usize,
    pub added: usize,
}

impl From<CommitOutcome> for CommitResponse {
    fn from(o: CommitOutcome) -> Self {
        Self {
            deleted: o.deleted,
            updated: o.updated,
            added: o.added,
        }
    }
}

/// CSV import result
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub entries_imported: usize,
    pub changes_imported: usize,
    pub metrics_created: usize,
    pub errors: Vec<ImportRowErrorDto>,
}

/// A single rejected import row
#[derive(Debug, Serialize)]
pub struct ImportRowErrorDto {
    pub line: usize,
    pub message: String,
}

impl From<ImportReport> for ImportResponse {
    fn from(r: ImportReport) -> Self {
        Self {
            entries_imported: r.entries_imported,
            changes_imported: r.changes_imported,
            metrics_created: r.metrics_created,
            errors: r
                .errors
                .into_iter()
                .map(|e| ImportRowErrorDto {
                    line: e.line,
                    message: e.message,
                })
                .collect(),
        }
    }
}

/// Generic deletion acknowledgement
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub categories: usize,
    pub metrics: usize,
    pub entries: usize,
    pub changes: usize,
}
