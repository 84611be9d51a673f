use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, error, trace};

use super::HotCache;

const KEY_PREFIX: &str = "short:";

/// Redis 热缓存
///
/// ConnectionManager 自动处理重连；所有错误只记录日志，
/// 不向调用方传播。
pub struct RedisCache {
    connection: ConnectionManager,
    ttl_secs: u64,
}

impl RedisCache {
    pub async fn new(redis_url: &str, ttl_secs: u64) -> Result<Self, String> {
        if redis_url.is_empty() {
            return Err("REDIS_URL not set".to_string());
        }

        let client = redis::Client::open(redis_url)
            .map_err(|e| format!("Failed to create Redis client: {e}"))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| format!("Failed to create Redis ConnectionManager: {e}"))?;

        debug!(
            "RedisCache initialized with prefix: '{}', TTL: {}s",
            KEY_PREFIX, ttl_secs
        );

        Ok(Self {
            connection,
            ttl_secs,
        })
    }

    fn make_key(short_key: &str) -> String {
        format!("{}{}", KEY_PREFIX, short_key)
    }
}

#[async_trait]
impl HotCache for RedisCache {
    async fn get(&self, short_key: &str) -> Option<String> {
        let mut conn = self.connection.clone();

        match conn.get::<_, Option<String>>(Self::make_key(short_key)).await {
            Ok(Some(url)) => {
                trace!("Cache HIT for key: {}", short_key);
                Some(url)
            }
            Ok(None) => {
                trace!("Cache MISS for key: {}", short_key);
                None
            }
            Err(e) => {
                // 连接错误退化为 miss，由存储兜底
                error!("Redis get error (will auto-reconnect): {}", e);
                None
            }
        }
    }

    async fn put(&self, short_key: &str, original_url: &str) {
        let mut conn = self.connection.clone();

        if let Err(e) = conn
            .set_ex::<_, _, ()>(Self::make_key(short_key), original_url, self.ttl_secs)
            .await
        {
            error!("Redis put error for key '{}': {}", short_key, e);
        } else {
            trace!(
                "Cached URL for key: {} (TTL: {}s)",
                short_key, self.ttl_secs
            );
        }
    }

    async fn invalidate(&self, short_key: &str) {
        let mut conn = self.connection.clone();

        match conn.del::<_, i64>(Self::make_key(short_key)).await {
            Ok(n) if n > 0 => trace!("Invalidated cache for key: {}", short_key),
            Ok(_) => trace!("Key not found in cache for removal: {}", short_key),
            Err(e) => error!("Redis delete error for key '{}': {}", short_key, e),
        }
    }
}
