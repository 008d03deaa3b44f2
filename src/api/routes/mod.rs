//! API Routes
//!
//! Route handlers organized by functionality.

pub mod auth;
pub mod categories;
pub mod changes;
pub mod entries;
pub mod health;
pub mod metrics;
pub mod sessions;
pub mod transfer;
