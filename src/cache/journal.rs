//! Redis-backed webhook delivery journal

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::cache::{ttl, Cache, RedisCache};
use super::error::CacheResult;
use super::keys::DeliveryKey;
use crate::payments::dispatch::DeliveryJournal;

pub struct RedisDeliveryJournal {
    cache: RedisCache,
}

impl RedisDeliveryJournal {
    pub fn new(cache: RedisCache) -> Self {
        Self { cache }
    }

    /// Drop every delivery marker, so the next deliveries are processed in full
    pub async fn forget_all(&self) -> CacheResult<u64> {
        let removed = self.cache.delete_pattern(&DeliveryKey::pattern()).await?;
        info!("Cleared {} webhook delivery markers", removed);
        Ok(removed)
    }
}

#[async_trait]
impl DeliveryJournal for RedisDeliveryJournal {
    async fn is_delivered(&self, event: &str, reference: &str) -> bool {
        let key = DeliveryKey::new(event, reference).to_string();
        match self.cache.exists(&key).await {
            Ok(seen) => seen,
            Err(e) => {
                warn!("Delivery journal lookup failed for '{}': {}", key, e);
                false
            }
        }
    }

    async fn mark_delivered(&self, event: &str, reference: &str) {
        let key = DeliveryKey::new(event, reference).to_string();
        match self
            .cache
            .set_if_absent(&key, &Utc::now().timestamp(), ttl::DELIVERY_MARKERS)
            .await
        {
            Ok(written) => debug!("Delivery marked for '{}' (new: {})", key, written),
            Err(e) => warn!("Failed to mark delivery '{}': {}", key, e),
        }
    }
}
