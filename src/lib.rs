pub mod api;
pub mod auth;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod feed;
pub mod prepare;
pub mod simulator;
pub mod store;

use tracing_subscriber::EnvFilter;

/// Log to stderr, filtered by `RUST_LOG` (defaults to info for this crate and request traces).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("moveeasy=info,prepare_data=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
