//! Cache trait and Redis implementation
//!
//! Values are stored as JSON. Connection failures degrade gracefully: lookups
//! report the key as absent and writes are skipped, so a Redis outage never
//! blocks payment processing.

use super::{error::CacheResult, RedisPool};
use crate::cache::CacheError;
use async_trait::async_trait;
use bb8::PooledConnection;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

type RedisConnection<'a> = PooledConnection<'a, RedisConnectionManager>;

/// Marker-style cache: write once, ask whether present, clear by pattern
#[async_trait]
pub trait Cache {
    /// Set a value only if the key is absent. Returns whether it was written.
    async fn set_if_absent<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<bool>;

    /// Check if a key exists in cache
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Delete every key matching a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;
}

/// Redis implementation of the Cache trait
#[derive(Clone)]
pub struct RedisCache {
    pool: RedisPool,
}

impl RedisCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    async fn get_connection(&self) -> CacheResult<RedisConnection<'_>> {
        self.pool.get().await.map_err(|e| {
            warn!("Failed to get Redis connection: {}", e);
            e.into()
        })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn set_if_absent<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<bool> {
        if ttl.is_zero() {
            return Err(CacheError::TtlError("TTL must be positive".to_string()));
        }

        let mut conn = match self.get_connection().await {
            Ok(conn) => conn,
            Err(_) => return Ok(false), // Graceful degradation
        };

        let json_str = serde_json::to_string(value)?;

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(json_str)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut *conn)
            .await
            .map_err(|e| {
                warn!("Redis SET NX failed for key '{}': {}", key, e);
                e
            })?;

        let written = reply.is_some();
        debug!("Cache set_if_absent for key: {} (written: {})", key, written);
        Ok(written)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = match self.get_connection().await {
            Ok(conn) => conn,
            Err(_) => return Ok(false), // Graceful degradation
        };

        let result: i32 = conn.exists(key).await.map_err(|e| {
            warn!("Redis EXISTS failed for key '{}': {}", key, e);
            e
        })?;

        Ok(result > 0)
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = match self.get_connection().await {
            Ok(conn) => conn,
            Err(_) => return Ok(0), // Graceful degradation
        };

        let keys: Vec<String> = conn.keys(pattern).await.map_err(|e| {
            warn!("Redis KEYS failed for pattern '{}': {}", pattern, e);
            e
        })?;

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: u64 = conn.del(&keys).await.map_err(|e| {
            warn!("Redis DEL failed for pattern '{}': {}", pattern, e);
            e
        })?;

        debug!("Cache delete_pattern '{}' deleted {} keys", pattern, deleted);
        Ok(deleted)
    }
}

/// TTL constants for cached data
pub mod ttl {
    use std::time::Duration;

    /// Webhook delivery markers: one day covers the provider's retry window
    pub const DELIVERY_MARKERS: Duration = Duration::from_secs(24 * 3600);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running Redis instance
    // Run with: REDIS_URL=redis://localhost:6379 cargo test --features cache

    async fn cache() -> RedisCache {
        let pool = super::super::init_cache_pool(super::super::CacheConfig::default())
            .await
            .unwrap();
        RedisCache::new(pool)
    }

    #[tokio::test]
    async fn test_zero_ttl_is_refused() {
        let pool = bb8::Pool::builder()
            .build_unchecked(RedisConnectionManager::new("redis://127.0.0.1:1").unwrap());
        let cache = RedisCache::new(pool);

        let result = cache.set_if_absent("test:ttl", &1, Duration::ZERO).await;
        assert!(matches!(result, Err(CacheError::TtlError(_))));
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_set_if_absent_writes_once() {
        let cache = cache().await;
        let key = "test:set_if_absent";
        cache.delete_pattern(key).await.unwrap();

        let first = cache
            .set_if_absent(key, &"a", Duration::from_secs(60))
            .await
            .unwrap();
        let second = cache
            .set_if_absent(key, &"b", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
        assert!(cache.exists(key).await.unwrap());

        assert_eq!(cache.delete_pattern(key).await.unwrap(), 1);
        assert!(!cache.exists(key).await.unwrap());
    }
}
