use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::Expiry;
use rand::Rng;
use tracing::debug;

use super::HotCache;

/// 自定义过期策略：统一 TTL 加 ±10% 随机抖动，避免缓存集中失效
struct UrlEntryExpiry {
    default_ttl: Duration,
}

impl UrlEntryExpiry {
    fn apply_jitter(ttl_secs: u64) -> u64 {
        if ttl_secs == 0 {
            return 0;
        }
        let jitter_range = (ttl_secs / 10).max(1);
        let jitter = rand::rng().random_range(0..=jitter_range * 2);
        ttl_secs.saturating_sub(jitter_range).saturating_add(jitter)
    }
}

impl Expiry<String, String> for UrlEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        _value: &String,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(Duration::from_secs(Self::apply_jitter(
            self.default_ttl.as_secs(),
        )))
    }
}

/// 进程内热缓存（moka）
pub struct MemoryCache {
    inner: Cache<String, String>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64, ttl_secs: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(UrlEntryExpiry {
                default_ttl: Duration::from_secs(ttl_secs),
            })
            .build();

        debug!(
            "MemoryCache initialized with max capacity: {}, TTL: {}s",
            max_capacity, ttl_secs
        );
        Self { inner }
    }
}

#[async_trait]
impl HotCache for MemoryCache {
    async fn get(&self, short_key: &str) -> Option<String> {
        self.inner.get(short_key).await
    }

    async fn put(&self, short_key: &str, original_url: &str) {
        self.inner
            .insert(short_key.to_string(), original_url.to_string())
            .await;
    }

    async fn invalidate(&self, short_key: &str) {
        self.inner.invalidate(short_key).await;
    }
}
