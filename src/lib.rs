//! # Tally
//!
//! Personal metric tracking - a full-stack Rust application for recording,
//! validating, and analyzing life metrics over an embedded SQLite store.
//!
//! ## Features
//!
//! - **Typed metrics**: float, integer, and bounded integer-range units
//!   with accumulated validation errors
//! - **Categories and change events**: group metrics and annotate the
//!   timeline with life changes
//! - **Statistics**: summary stats, resampled chart series, and trend
//!   smoothing per time range
//! - **Draft editing**: stage entry edits in a session and commit them
//!   all-or-nothing
//! - **CSV transfer**: export everything to one CSV and re-import it into
//!   an empty store
//! - **Auth passthrough**: optional upstream auth provider integration
//!
//! ## Modules
//!
//! - [`store`]: SQLite-backed store for categories, metrics, entries, and
//!   change events
//! - [`stats`]: summary statistics and chart aggregation
//! - [`session`]: editing sessions and draft commit
//! - [`transfer`]: CSV export and import
//! - [`auth`]: upstream auth provider client
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tally::store::{MetricSpec, Store, UnitSpec, UnitType};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Store::open_in_memory()?;
//!
//!     let body = store.ensure_category("body")?;
//!     let weight = store.create_metric(&MetricSpec {
//!         name: "weight".to_string(),
//!         description: None,
//!         category_id: Some(body.id),
//!         unit: UnitSpec::new(UnitType::Float).name("kg"),
//!     })?;
//!
//!     let today = chrono::Utc::now().date_naive();
//!     store.add_entry(weight.id, 81.4, today, None)?;
//!
//!     let entries = store.entries_for_metric(weight.id)?;
//!     println!("{} entries", entries.len());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod session;
pub mod stats;
pub mod store;
pub mod transfer;

// Re-export top-level types for convenience
pub use store::{
    Category, ChangeEvent, Entry, EventTime, Metric, MetricSpec, Store, StoreError, StoreResult,
    UnitSpec, UnitType, ValueError,
};

pub use stats::{
    build_chart_series, compute_stats, ChartPoint, ChartRange, ChartSeries, Granularity,
    Observation, StatsSummary,
};

pub use session::{ChangeSet, CommitError, CommitOutcome, SessionContext, Sessions};

pub use transfer::{export_csv, import_csv, ImportReport, TransferError};

pub use auth::{AuthClient, AuthConfig, AuthError, AuthSession, AuthUser};

pub use api::{build_router, serve, ApiError, ApiResult, AppState};

pub use config::Config;
