//! GeoIP 查询（外部 API，尽力而为）
//!
//! 使用 ip-api.com 的免费接口；失败只产生空的地理字段，
//! 绝不影响点击记录本身。

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, trace, warn};

/// 查询结果中点击记录需要的字段
#[derive(Debug, Clone, Default)]
pub struct GeoInfo {
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: Option<String>,
    country: Option<String>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    city: Option<String>,
    timezone: Option<String>,
}

pub struct GeoIpClient {
    client: reqwest::Client,
    base_url: String,
}

impl GeoIpClient {
    pub fn new() -> Self {
        Self::with_base_url("http://ip-api.com")
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 查询公网 IP 的地理信息；任何失败返回 None
    ///
    /// 私有/本地地址的过滤由调用方完成（查了也没意义）。
    pub async fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        let url = format!(
            "{}/json/{}?fields=status,message,country,countryCode,region,regionName,city,timezone,query",
            self.base_url, ip
        );

        let resp = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("GeoIP request failed for {}: {}", ip, e);
                return None;
            }
        };

        let body: ApiResponse = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!("GeoIP response parse failed for {}: {}", ip, e);
                return None;
            }
        };

        if body.status.as_deref() != Some("success") {
            debug!(
                "GeoIP lookup returned non-success for {}: {:?}",
                ip, body.status
            );
            return None;
        }

        trace!(
            "GeoIP lookup for {}: country={:?}, city={:?}",
            ip, body.country_code, body.city
        );

        Some(GeoInfo {
            country_code: body.country_code,
            country_name: body.country,
            city: body.city,
            region: body.region_name,
            timezone: body.timezone,
        })
    }
}

impl Default for GeoIpClient {
    fn default() -> Self {
        Self::new()
    }
}
