//! 热缓存：系统短键 → 原始 URL
//!
//! 仅以系统短键为键（别名在进缓存前已被解析掉），带 TTL。
//! 所有操作 fail-soft：后端故障时 get 退化为 miss，put/invalidate
//! 退化为 no-op，仅记录日志。密码保护的映射不进缓存（由调用方保证）。

mod memory;
mod null;
mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::config::AppConfig;

pub use memory::MemoryCache;
pub use null::NullCache;
pub use redis::RedisCache;

#[async_trait]
pub trait HotCache: Send + Sync {
    /// 查询缓存，错误退化为 None
    async fn get(&self, short_key: &str) -> Option<String>;

    /// 写入缓存并设置 TTL，错误退化为 no-op
    async fn put(&self, short_key: &str, original_url: &str);

    /// 删除缓存项，错误退化为 no-op
    async fn invalidate(&self, short_key: &str);
}

/// 按配置构建缓存插件（memory / redis / null）
pub async fn build_cache(config: &AppConfig) -> Arc<dyn HotCache> {
    match config.cache.cache_type.as_str() {
        "redis" => match RedisCache::new(&config.cache.redis_url, config.cache_ttl_secs()).await {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                warn!("Redis cache unavailable ({}), falling back to memory", e);
                Arc::new(MemoryCache::new(
                    config.cache.memory_capacity,
                    config.cache_ttl_secs(),
                ))
            }
        },
        "null" => Arc::new(NullCache),
        _ => Arc::new(MemoryCache::new(
            config.cache.memory_capacity,
            config.cache_ttl_secs(),
        )),
    }
}
