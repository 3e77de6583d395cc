//! Integration Tests for the Cache Contract
//!
//! Runs the same scenarios against every backend through the public API.
//! Redis scenarios only run when `REDIS_HOST` points at a reachable server.

use std::thread::sleep;
use std::time::Duration;

use kvcache::{init_tracing, Backend, BackendKind, Cache, CacheError, Config};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// == Helper Functions ==

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user_id: u64,
    roles: Vec<String>,
    remember: bool,
}

fn embedded_backend(eviction_batch: usize) -> (TempDir, Backend) {
    init_tracing("kvcache=debug");
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        backend: BackendKind::Embedded,
        embedded_path: dir.path().join("cache"),
        prefix: "itest".to_string(),
        eviction_batch,
        ..Config::default()
    };
    let backend = Backend::open(&config).unwrap();
    (dir, backend)
}

/// Opens a Redis backend under a namespace unique to `test_name`, or returns
/// None when no server is configured.
fn redis_backend(test_name: &str, eviction_batch: usize) -> Option<(Config, Backend)> {
    if std::env::var("REDIS_HOST").is_err() {
        eprintln!("REDIS_HOST not set, skipping {}", test_name);
        return None;
    }
    init_tracing("kvcache=debug");

    let config = Config {
        backend: BackendKind::Redis,
        prefix: format!("kvcache-test-{}-{}", test_name, std::process::id()),
        eviction_batch,
        redis_pool_size: 4,
        redis_connect_timeout: 2,
        ..Config::from_env()
    };
    let backend = Backend::open(&config).unwrap();
    backend.empty().unwrap();
    Some((config, backend))
}

fn check_roundtrip(cache: &impl Cache) {
    let session = Session {
        user_id: 42,
        roles: vec!["admin".to_string(), "editor".to_string()],
        remember: true,
    };

    cache.set("session:42", &session, None).unwrap();
    cache.set("count", &17u64, None).unwrap();
    cache.set("name", "ada", None).unwrap();

    assert_eq!(cache.get::<Session>("session:42").unwrap(), session);
    assert_eq!(cache.get::<u64>("count").unwrap(), 17);
    assert_eq!(cache.get::<String>("name").unwrap(), "ada");
}

fn check_existence_transitions(cache: &impl Cache) {
    assert!(!cache.has("foo").unwrap());

    cache.set("foo", "bar", None).unwrap();
    assert!(cache.has("foo").unwrap());

    cache.forget("foo").unwrap();
    assert!(!cache.has("foo").unwrap());

    // Idempotent
    cache.forget("foo").unwrap();
}

fn check_ttl_expiry(cache: &impl Cache) {
    cache.set("flash", "soon gone", Some(1)).unwrap();
    assert_eq!(cache.get::<String>("flash").unwrap(), "soon gone");

    sleep(Duration::from_millis(2100));

    let result = cache.get::<String>("flash");
    assert!(matches!(result, Err(CacheError::NotFound(_))));
}

fn check_prefix_isolation(cache: &impl Cache) {
    cache.set("a:1", &1, None).unwrap();
    cache.set("a:2", &2, None).unwrap();
    cache.set("b:1", &3, None).unwrap();

    cache.empty_by_match("a:").unwrap();

    assert!(!cache.has("a:1").unwrap());
    assert!(!cache.has("a:2").unwrap());
    assert_eq!(cache.get::<i32>("b:1").unwrap(), 3);
}

fn check_batch_boundary(cache: &impl Cache) {
    for i in 0..7 {
        cache.set(&format!("bulk:{}", i), &i, None).unwrap();
    }

    cache.empty_by_match("bulk:").unwrap();

    for i in 0..7 {
        let result = cache.get::<i32>(&format!("bulk:{}", i));
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }
    assert!(cache.stats().eviction_batches > 1);
}

fn check_empty(cache: &impl Cache) {
    cache.set("one", &1, None).unwrap();
    cache.set("two", &2, None).unwrap();

    cache.empty().unwrap();

    assert!(!cache.has("one").unwrap());
    assert!(!cache.has("two").unwrap());
}

// == Embedded Backend ==

#[test]
fn test_embedded_roundtrip() {
    let (_dir, cache) = embedded_backend(100);
    check_roundtrip(&cache);
}

#[test]
fn test_embedded_existence_transitions() {
    let (_dir, cache) = embedded_backend(100);
    check_existence_transitions(&cache);
}

#[test]
fn test_embedded_ttl_expiry() {
    let (_dir, cache) = embedded_backend(100);
    check_ttl_expiry(&cache);
}

#[test]
fn test_embedded_prefix_isolation() {
    let (_dir, cache) = embedded_backend(100);
    check_prefix_isolation(&cache);
}

#[test]
fn test_embedded_batch_boundary() {
    let (_dir, cache) = embedded_backend(3);
    check_batch_boundary(&cache);
}

#[test]
fn test_embedded_empty() {
    let (_dir, cache) = embedded_backend(100);
    check_empty(&cache);
}

#[test]
fn test_embedded_shared_across_threads() {
    let (_dir, cache) = embedded_backend(100);
    let cache = std::sync::Arc::new(cache);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    cache.set(&format!("t{}:{}", t, i), &i, None).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4 {
        for i in 0..25 {
            assert_eq!(cache.get::<i32>(&format!("t{}:{}", t, i)).unwrap(), i);
        }
    }
    assert_eq!(cache.stats().writes, 100);
}

// == Redis Backend ==

#[test]
fn test_redis_roundtrip() {
    let Some((_config, cache)) = redis_backend("roundtrip", 100) else {
        return;
    };
    check_roundtrip(&cache);
    cache.empty().unwrap();
}

#[test]
fn test_redis_existence_transitions() {
    let Some((_config, cache)) = redis_backend("exists", 100) else {
        return;
    };
    check_existence_transitions(&cache);
}

#[test]
fn test_redis_ttl_expiry() {
    let Some((_config, cache)) = redis_backend("ttl", 100) else {
        return;
    };
    check_ttl_expiry(&cache);
}

#[test]
fn test_redis_prefix_isolation() {
    let Some((_config, cache)) = redis_backend("isolation", 100) else {
        return;
    };
    check_prefix_isolation(&cache);
    cache.empty().unwrap();
}

#[test]
fn test_redis_batch_boundary() {
    let Some((_config, cache)) = redis_backend("batches", 3) else {
        return;
    };
    check_batch_boundary(&cache);
}

#[test]
fn test_redis_empty() {
    let Some((_config, cache)) = redis_backend("empty", 100) else {
        return;
    };
    check_empty(&cache);
}

#[test]
fn test_redis_corrupt_payload() -> anyhow::Result<()> {
    let Some((config, cache)) = redis_backend("corrupt", 100) else {
        return Ok(());
    };

    let client = redis::Client::open(config.redis_connection_info())?;
    let mut conn = client.get_connection()?;
    redis::cmd("SET")
        .arg(format!("{}:broken", config.prefix))
        .arg(&b"\x00junk"[..])
        .query::<()>(&mut conn)?;

    let result = cache.get::<String>("broken");
    assert!(matches!(result, Err(CacheError::CorruptPayload(_))));

    // EXISTS never decodes, so the key still reads as present
    assert!(cache.has("broken")?);

    cache.empty()?;
    Ok(())
}
