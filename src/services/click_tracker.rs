//! 异步点击追踪
//!
//! HTTP 层在响应前同步截取请求快照（IP / UA / Referer），
//! 之后的富化与落库全部在分析执行器里进行：后台任务不持有
//! 任何请求对象。

use std::sync::Arc;

use actix_web::HttpRequest;
use chrono::Utc;
use tracing::warn;

use crate::services::executor::AnalyticsExecutor;
use crate::services::geoip::GeoIpClient;
use crate::services::user_agent::parse_user_agent;
use crate::storage::models::ClickRecord;
use crate::storage::{ClickStore, MappingStore};
use crate::utils::ip::{extract_client_ip, is_lookup_worthy};

/// 请求上下文的不可变快照
#[derive(Debug, Clone, Default)]
pub struct ClickSnapshot {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

impl ClickSnapshot {
    /// 在请求线程上同步截取（请求对象不能带进后台任务）
    pub fn capture(req: &HttpRequest) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(String::from)
        };

        Self {
            client_ip: extract_client_ip(req),
            user_agent: header("user-agent"),
            referer: header("referer"),
        }
    }
}

#[derive(Clone)]
pub struct ClickTracker {
    mappings: MappingStore,
    clicks: ClickStore,
    geoip: Arc<GeoIpClient>,
    executor: Arc<AnalyticsExecutor>,
}

impl ClickTracker {
    pub fn new(
        mappings: MappingStore,
        clicks: ClickStore,
        geoip: Arc<GeoIpClient>,
        executor: Arc<AnalyticsExecutor>,
    ) -> Self {
        Self {
            mappings,
            clicks,
            geoip,
            executor,
        }
    }

    /// 记录一次点击，立即返回
    ///
    /// 富化与持久化在 worker 上执行；302 响应不等待这里的任何 IO。
    pub async fn track(&self, effective_key: &str, snapshot: ClickSnapshot) {
        let key = effective_key.to_string();
        let mappings = self.mappings.clone();
        let clicks = self.clicks.clone();
        let geoip = Arc::clone(&self.geoip);
        let clicked_at = Utc::now();

        self.executor
            .submit(async move {
                // 1. 解析 effective key（容忍 Missing：记日志后丢弃）
                let mapping = match mappings.find_by_effective_key(&key).await {
                    Ok(Some(m)) => m,
                    Ok(None) => {
                        warn!("Cannot track click, mapping not found for key: {}", key);
                        return;
                    }
                    Err(e) => {
                        warn!("Click tracking lookup failed for {}: {}", key, e);
                        return;
                    }
                };

                // 2. 以系统短键原子自增点击计数
                if let Err(e) = mappings.increment_clicks(&mapping.short_key).await {
                    warn!("Click count increment failed for {}: {}", mapping.short_key, e);
                }

                // 3. UA 维度
                let parsed = parse_user_agent(snapshot.user_agent.as_deref());

                // 4. 公网 IP 才查 GeoIP，失败只留空字段
                let geo = match snapshot.client_ip.as_deref() {
                    Some(ip) if is_lookup_worthy(ip) => geoip.lookup(ip).await,
                    _ => None,
                }
                .unwrap_or_default();

                // 5. 部分富化也照样落库
                let record = ClickRecord {
                    url_mapping_id: mapping.id,
                    clicked_at: Some(clicked_at),
                    client_ip: snapshot.client_ip,
                    user_agent: snapshot.user_agent,
                    referer: snapshot.referer,
                    browser_name: parsed.browser_name,
                    browser_version: parsed.browser_version,
                    os_name: parsed.os_name,
                    os_version: parsed.os_version,
                    device_type: Some(parsed.device_type.as_str().to_string()),
                    country_code: geo.country_code,
                    country_name: geo.country_name,
                    city: geo.city,
                    region: geo.region,
                    timezone: geo.timezone,
                };

                if let Err(e) = clicks.insert(record).await {
                    warn!("Click event persist failed for {}: {}", key, e);
                }
            })
            .await;
    }
}
