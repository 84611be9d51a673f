//! Ollama HTTP 客户端
//!
//! 单次补全请求（非流式）加健康门：任何失败都会清掉可用标记，
//! 30 秒内的探测结果被缓存，探测打 `GET /api/tags`。

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const GENERATE_TIMEOUT_SECS: u64 = 45;
const HEALTH_TIMEOUT_SECS: u64 = 5;
const HEALTH_CHECK_INTERVAL_MS: i64 = 30_000;
const TIMEOUT_RETRIES: u32 = 2;
const RETRY_BACKOFF_SECS: u64 = 1;

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    available: AtomicBool,
    last_health_check_ms: AtomicI64,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(GENERATE_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            available: AtomicBool::new(true),
            last_health_check_ms: AtomicI64::new(0),
        }
    }

    /// 发起一次补全请求
    ///
    /// temperature 0 保证输出尽量确定；超时最多重试 2 次，
    /// 每次退避 1 秒。失败会清掉可用标记。
    pub async fn generate(&self, prompt: &str) -> Result<String, String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: 0.0,
                top_p: 0.9,
                num_predict: 1000,
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        let mut attempt = 0;

        loop {
            let result = self.http.post(&url).json(&request).send().await;

            match result {
                Ok(resp) => {
                    if !resp.status().is_success() {
                        self.mark_unavailable();
                        return Err(format!("Ollama returned HTTP {}", resp.status()));
                    }
                    let body: GenerateResponse = resp.json().await.map_err(|e| {
                        self.mark_unavailable();
                        format!("Ollama response decode failed: {}", e)
                    })?;
                    if body.response.is_empty() {
                        return Err("Empty response from Ollama".to_string());
                    }
                    return Ok(body.response);
                }
                Err(e) if e.is_timeout() && attempt < TIMEOUT_RETRIES => {
                    attempt += 1;
                    warn!(
                        "Ollama call timed out, retrying ({}/{})",
                        attempt, TIMEOUT_RETRIES
                    );
                    tokio::time::sleep(Duration::from_secs(RETRY_BACKOFF_SECS)).await;
                }
                Err(e) => {
                    self.mark_unavailable();
                    return Err(format!("Ollama call failed: {}", e));
                }
            }
        }
    }

    /// 查询上游是否可用，探测结果缓存 30 秒
    pub async fn check_available(&self) -> bool {
        let now = chrono::Utc::now().timestamp_millis();
        let last = self.last_health_check_ms.load(Ordering::Relaxed);
        if now - last < HEALTH_CHECK_INTERVAL_MS {
            return self.available.load(Ordering::Relaxed);
        }

        self.last_health_check_ms.store(now, Ordering::Relaxed);

        let url = format!("{}/api/tags", self.base_url);
        let result = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await;

        let healthy = match result {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => body.contains("models"),
                Err(_) => false,
            },
            Ok(resp) => {
                warn!("Ollama health check returned HTTP {}", resp.status());
                false
            }
            Err(e) => {
                warn!("Ollama health check failed: {}", e);
                false
            }
        };

        self.available.store(healthy, Ordering::Relaxed);
        if healthy {
            debug!("Ollama health check passed");
        }
        healthy
    }

    /// 调用失败时清除可用标记（下一次探测前短路）
    pub fn mark_unavailable(&self) {
        self.available.store(false, Ordering::Relaxed);
    }
}
