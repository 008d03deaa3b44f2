//! Tally API Server
//!
//! Binary entry point: loads configuration, opens the store, and
//! serves the REST API. An auth client is attached only when a
//! provider key is configured, so the server runs fully offline by
//! default.

use std::path::Path;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally::api::{serve, AppState};
use tally::auth::{AuthClient, AuthConfig};
use tally::config::Config;
use tally::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load_default();
    init_tracing(&config);

    tracing::info!("Tally v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(db_path = %config.store.db_path, "Opening store");

    let store = Store::open(Path::new(&config.store.db_path))?;
    let mut state = AppState::new(store);

    if config.auth.api_key.is_empty() {
        tracing::info!("No auth provider configured, auth routes disabled");
    } else {
        let auth = AuthClient::new(AuthConfig {
            base_url: config.auth.base_url.clone(),
            api_key: config.auth.api_key.clone(),
            request_timeout_ms: config.auth.request_timeout_ms,
        })?;
        tracing::info!(provider = %config.auth.base_url, "Auth provider configured");
        state = state.with_auth(auth);
    }

    serve(state, &config.api).await?;
    Ok(())
}

/// Wire up the subscriber from the logging section.
///
/// `RUST_LOG` wins over the configured level; `format = "json"`
/// switches to structured output for log shippers.
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("tally={}", config.logging.level)),
    );

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
