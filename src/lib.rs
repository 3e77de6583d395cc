//! kvcache - A backend-agnostic key/value cache layer
//!
//! One cache contract (has, get, set, forget, empty_by_match, empty) over an
//! embedded ordered store and a Redis server, with TTLs and batched prefix
//! eviction.

pub mod cache;
pub mod config;
pub mod error;
pub mod telemetry;

pub use cache::{Backend, Cache, CacheStats, EmbeddedCache, RedisCache};
pub use config::{BackendKind, Config};
pub use error::{CacheError, Result};
pub use telemetry::init_tracing;
