use std::future::Future;
use std::time::Duration;

use redis::Client as RedisClient;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::resume::metrics::MetricsSnapshot;
use crate::resume::projection::ResumeSectionDto;
use crate::resume::store::StoreCounts;

/// Time-bounded read-through cache for one derived view of the store.
///
/// Uses Redis when a client is configured so replicas share one copy, and an
/// in-process slot otherwise. Redis failures are logged and treated as misses.
/// A zero TTL disables caching.
///
/// Every value is tagged with the generation that was current when its load
/// started. [`invalidate`](Self::invalidate) bumps the generation, so a load
/// that overlaps an invalidation is returned to its caller but never stored.
/// In Redis the generation is part of the value key; stale writes land on a
/// key nobody reads and expire with the TTL.
pub struct TtlCache<T> {
    name: &'static str,
    ttl: Duration,
    redis: Option<RedisClient>,
    local: RwLock<LocalSlot<T>>,
}

struct LocalSlot<T> {
    generation: u64,
    value: Option<(Instant, T)>,
}

enum RedisLookup<T> {
    Hit(T),
    Miss { generation: u64 },
}

impl<T> TtlCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(name: &'static str, ttl: Duration, redis: Option<RedisClient>) -> Self {
        Self {
            name,
            ttl,
            redis,
            local: RwLock::new(LocalSlot {
                generation: 0,
                value: None,
            }),
        }
    }

    /// Returns the cached value, or runs `load` and caches its result unless
    /// the cache was invalidated while `load` was running.
    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if self.ttl.is_zero() {
            return load().await;
        }
        match &self.redis {
            Some(client) => self.redis_get_or_load(client, load).await,
            None => self.local_get_or_load(load).await,
        }
    }

    pub async fn invalidate(&self) {
        {
            let mut slot = self.local.write().await;
            slot.generation = slot.generation.wrapping_add(1);
            slot.value = None;
        }
        if let Some(client) = &self.redis {
            if let Err(e) = self.redis_invalidate(client).await {
                warn!("{} cache invalidation failed: {e}", self.name);
            }
        }
        debug!("{} cache invalidated", self.name);
    }

    async fn local_get_or_load<F, Fut>(&self, load: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let generation = {
            let slot = self.local.read().await;
            if let Some((stored_at, value)) = &slot.value {
                if stored_at.elapsed() < self.ttl {
                    return Ok(value.clone());
                }
            }
            slot.generation
        };

        let value = load().await?;

        let mut slot = self.local.write().await;
        if slot.generation == generation {
            slot.value = Some((Instant::now(), value.clone()));
        } else {
            debug!("{} cache invalidated during load; result not stored", self.name);
        }
        Ok(value)
    }

    async fn redis_get_or_load<F, Fut>(&self, client: &RedisClient, load: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let generation = match self.redis_lookup(client).await {
            Ok(RedisLookup::Hit(value)) => return Ok(value),
            Ok(RedisLookup::Miss { generation }) => Some(generation),
            Err(e) => {
                warn!("{} cache read failed: {e}", self.name);
                None
            }
        };

        let value = load().await?;

        if let Some(generation) = generation {
            if let Err(e) = self.redis_put(client, generation, &value).await {
                warn!("{} cache write failed: {e}", self.name);
            }
        }
        Ok(value)
    }

    fn generation_key(&self) -> String {
        format!("folio:{}:generation", self.name)
    }

    fn value_key(&self, generation: u64) -> String {
        format!("folio:{}:{generation}", self.name)
    }

    async fn redis_lookup(&self, client: &RedisClient) -> anyhow::Result<RedisLookup<T>> {
        let mut con = client.get_multiplexed_async_connection().await?;
        let generation: Option<u64> = redis::cmd("GET")
            .arg(self.generation_key())
            .query_async(&mut con)
            .await?;
        let generation = generation.unwrap_or(0);

        let raw: Option<String> = redis::cmd("GET")
            .arg(self.value_key(generation))
            .query_async(&mut con)
            .await?;
        Ok(match raw {
            Some(json) => RedisLookup::Hit(serde_json::from_str(&json)?),
            None => RedisLookup::Miss { generation },
        })
    }

    async fn redis_put(&self, client: &RedisClient, generation: u64, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string(value)?;
        let mut con = client.get_multiplexed_async_connection().await?;
        redis::cmd("SET")
            .arg(self.value_key(generation))
            .arg(json)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut con)
            .await?;
        Ok(())
    }

    async fn redis_invalidate(&self, client: &RedisClient) -> anyhow::Result<()> {
        let mut con = client.get_multiplexed_async_connection().await?;
        let next: u64 = redis::cmd("INCR")
            .arg(self.generation_key())
            .query_async(&mut con)
            .await?;
        redis::cmd("DEL")
            .arg(self.value_key(next.wrapping_sub(1)))
            .query_async::<_, ()>(&mut con)
            .await?;
        Ok(())
    }
}

/// TTLs for the cached read endpoints, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub projection: u64,
    pub stats: u64,
    pub metrics: u64,
}

/// Every cached view derived from the resume store.
pub struct ResumeCaches {
    pub projection: TtlCache<Vec<ResumeSectionDto>>,
    pub stats: TtlCache<StoreCounts>,
    pub metrics: TtlCache<MetricsSnapshot>,
}

impl ResumeCaches {
    pub fn new(ttls: CacheTtls, redis: Option<RedisClient>) -> Self {
        Self {
            projection: TtlCache::new(
                "resume-projection",
                Duration::from_secs(ttls.projection),
                redis.clone(),
            ),
            stats: TtlCache::new("db-stats", Duration::from_secs(ttls.stats), redis.clone()),
            metrics: TtlCache::new("metrics", Duration::from_secs(ttls.metrics), redis),
        }
    }

    /// Called after the store changed.
    pub async fn invalidate(&self) {
        tokio::join!(
            self.projection.invalidate(),
            self.stats.invalidate(),
            self.metrics.invalidate(),
        );
    }
}
