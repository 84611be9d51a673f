use async_trait::async_trait;

use super::HotCache;

/// 空缓存实现：永远 miss，所有写入丢弃
pub struct NullCache;

#[async_trait]
impl HotCache for NullCache {
    async fn get(&self, _short_key: &str) -> Option<String> {
        None
    }

    async fn put(&self, _short_key: &str, _original_url: &str) {}

    async fn invalidate(&self, _short_key: &str) {}
}
