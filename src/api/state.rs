//! Shared Application State
//!
//! State handed to every request handler. The store and session
//! registry are always present; the auth client is optional so the
//! server runs fully offline when no provider is configured.

use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthClient;
use crate::session::Sessions;
use crate::store::Store;

/// Shared state for all API handlers
#[derive(Clone)]
pub struct AppState {
    /// Metric store
    pub store: Arc<Store>,
    /// Upstream auth client, if configured
    pub auth: Option<Arc<AuthClient>>,
    /// Live editing sessions
    pub sessions: Arc<Sessions>,
    /// Server start time, for uptime reporting
    pub start_time: Instant,
}

impl AppState {
    /// Create application state without an auth provider
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(store),
            auth: None,
            sessions: Arc::new(Sessions::new()),
            start_time: Instant::now(),
        }
    }

    /// Builder: attach an auth client
    pub fn with_auth(mut self, auth: AuthClient) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    /// Seconds since the server started
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
