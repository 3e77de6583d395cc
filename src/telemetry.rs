//! Logging Setup
//!
//! Installs a `tracing` subscriber for hosts that do not bring their own.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "kvcache=info";

/// Installs a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`.
///
/// Returns false if a global subscriber was already installed, so repeated
/// calls (for example from several tests) are harmless.
pub fn init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
