//! 重定向路径的速率限制
//!
//! 固定窗口计数：对 `rate:{ip}` 做 INCR，首个请求设置窗口期
//! EXPIRE，计数 ≤ 上限则放行。计数存储不可用时放行（fail-open）。

mod middleware;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, warn};

pub use middleware::RateLimitMiddleware;

const KEY_PREFIX: &str = "rate:";

pub struct RateLimiter {
    connection: Option<ConnectionManager>,
    max_requests: u64,
    window_secs: u64,
}

impl RateLimiter {
    /// 构建限流器；Redis 不可达时进入 fail-open 模式
    pub async fn new(redis_url: &str, max_requests: u64, window_secs: u64) -> Self {
        let connection = if redis_url.is_empty() {
            warn!("Rate limiter has no Redis backend, all requests admitted");
            None
        } else {
            match redis::Client::open(redis_url) {
                Ok(client) => match ConnectionManager::new(client).await {
                    Ok(conn) => {
                        debug!(
                            "Rate limiter initialized: {} requests / {}s window",
                            max_requests, window_secs
                        );
                        Some(conn)
                    }
                    Err(e) => {
                        warn!("Rate limiter Redis unavailable, failing open: {}", e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Rate limiter Redis client error, failing open: {}", e);
                    None
                }
            }
        };

        Self {
            connection,
            max_requests,
            window_secs,
        }
    }

    pub fn limit(&self) -> u64 {
        self.max_requests
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    fn make_key(client_ip: &str) -> String {
        format!("{}{}", KEY_PREFIX, client_ip)
    }

    /// 是否放行本次请求
    ///
    /// 原子自增；自增后为 1 说明是窗口首个请求，设置过期。
    /// 任何 Redis 错误都放行并记 WARN。
    pub async fn is_allowed(&self, client_ip: &str) -> bool {
        let Some(conn) = &self.connection else {
            return true;
        };
        let mut conn = conn.clone();
        let key = Self::make_key(client_ip);

        let count: u64 = match conn.incr(&key, 1u64).await {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    "Rate limit store error for IP {}, allowing request: {}",
                    client_ip, e
                );
                return true;
            }
        };

        if count == 1 {
            if let Err(e) = conn.expire::<_, ()>(&key, self.window_secs as i64).await {
                warn!("Failed to set rate window expiry for {}: {}", client_ip, e);
            }
        }

        let allowed = count <= self.max_requests;
        if !allowed {
            warn!("Rate limit exceeded for IP: {}, count: {}", client_ip, count);
        }
        allowed
    }

    /// 当前窗口剩余配额
    pub async fn remaining(&self, client_ip: &str) -> u64 {
        let Some(conn) = &self.connection else {
            return self.max_requests;
        };
        let mut conn = conn.clone();

        match conn
            .get::<_, Option<u64>>(Self::make_key(client_ip))
            .await
        {
            Ok(Some(used)) => self.max_requests.saturating_sub(used),
            Ok(None) => self.max_requests,
            Err(e) => {
                warn!("Rate limit store error reading count for {}: {}", client_ip, e);
                self.max_requests
            }
        }
    }

    /// 距窗口重置的秒数；无活动窗口返回 -1
    pub async fn reset_in_seconds(&self, client_ip: &str) -> i64 {
        let Some(conn) = &self.connection else {
            return -1;
        };
        let mut conn = conn.clone();

        match conn.ttl::<_, i64>(Self::make_key(client_ip)).await {
            Ok(ttl) if ttl > 0 => ttl,
            Ok(_) => -1,
            Err(e) => {
                warn!("Rate limit store error reading TTL for {}: {}", client_ip, e);
                -1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 无 Redis 后端时所有查询都按 fail-open 处理
    #[tokio::test]
    async fn test_fail_open_without_backend() {
        let limiter = RateLimiter::new("", 100, 60).await;

        assert!(limiter.is_allowed("203.0.113.1").await);
        assert_eq!(limiter.remaining("203.0.113.1").await, 100);
        assert_eq!(limiter.reset_in_seconds("203.0.113.1").await, -1);
    }
}
