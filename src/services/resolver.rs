//! 重定向解析状态机
//!
//! 一个映射在解析时刻处于五种状态之一：
//! Missing / Inactive / Expired / Gated / Open。
//! 状态在这里收敛为封闭的枚举，HTTP 层只负责映射到状态码。

use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache::HotCache;
use crate::errors::Result;
use crate::storage::MappingStore;
use crate::utils::password::verify_password;

/// 解析结果（对本层全部终态）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// 可重定向：携带目标 URL 与系统短键（点击计数用）
    Redirect {
        original_url: String,
        short_key: String,
    },
    NotFound,
    NeedsPassword,
    BadPassword,
    Inactive,
    Expired,
}

pub struct Resolver {
    mappings: MappingStore,
    cache: Arc<dyn HotCache>,
}

impl Resolver {
    pub fn new(mappings: MappingStore, cache: Arc<dyn HotCache>) -> Self {
        Self { mappings, cache }
    }

    /// 按 effective key 解析，可附带访问密码
    ///
    /// 顺序：存在性 → 密码门 → 激活 → 过期 → 缓存。
    /// 密码门在缓存之前：受保护的映射永远不触缓存。
    pub async fn resolve(&self, key: &str, password: Option<&str>) -> Result<ResolveOutcome> {
        let Some(mapping) = self.mappings.find_by_effective_key(key).await? else {
            debug!("Redirect key not found: {}", key);
            return Ok(ResolveOutcome::NotFound);
        };

        let gated = mapping.is_password_protected();

        if gated {
            match password {
                None => return Ok(ResolveOutcome::NeedsPassword),
                Some(supplied) => {
                    let hash = mapping.password_hash.as_deref().unwrap_or_default();
                    if !verify_password(supplied, hash) {
                        debug!("Bad password for key: {}", key);
                        return Ok(ResolveOutcome::BadPassword);
                    }
                }
            }
        }

        if !mapping.is_active {
            debug!("Inactive mapping refused: {}", key);
            return Ok(ResolveOutcome::Inactive);
        }

        if mapping.is_expired() {
            // 失效前清掉缓存，下一次请求不会拿到陈旧的重定向
            self.cache.invalidate(&mapping.short_key).await;
            debug!("Expired mapping refused: {}", key);
            return Ok(ResolveOutcome::Expired);
        }

        let short_key = mapping.short_key.clone();

        if !gated {
            if let Some(cached) = self.cache.get(&short_key).await {
                trace!("Cache hit for short key: {}", short_key);
                return Ok(ResolveOutcome::Redirect {
                    original_url: cached,
                    short_key,
                });
            }
            self.cache.put(&short_key, &mapping.original_url).await;
        }

        Ok(ResolveOutcome::Redirect {
            original_url: mapping.original_url,
            short_key,
        })
    }
}
