use serde::{Deserialize, Serialize};

/// 应用程序配置
///
/// 所有字段均可通过环境变量覆盖（`.env` 文件亦可），未设置时使用默认值。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// 对外短链接前缀，用于拼接返回的 short_url 和 QR 内容
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

/// 缓存系统配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// memory / redis / null
    #[serde(rename = "type")]
    #[serde(default = "default_cache_type")]
    pub cache_type: String,
    #[serde(default = "default_cache_ttl_hours")]
    pub ttl_hours: u64,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: u64,
}

/// 速率限制配置（仅作用于重定向路径）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_max")]
    pub max_requests: u64,
    #[serde(default = "default_rate_limit_window")]
    pub window_secs: u64,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

/// Ollama (本地 LLM) 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_ai_cache_days")]
    pub cache_days: i64,
}

/// 网页元数据抓取配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_metadata_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_metadata_max_body")]
    pub max_body_size: usize,
}

/// 点击分析执行器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// 0 = 自动（CPU 核数 × 4）
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "default_analytics_queue")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}
fn default_server_port() -> u16 {
    8080
}
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_database_url() -> String {
    "sqlite://linklet.db?mode=rwc".to_string()
}
fn default_cache_type() -> String {
    "memory".to_string()
}
fn default_cache_ttl_hours() -> u64 {
    24
}
fn default_redis_url() -> String {
    String::new()
}
fn default_memory_capacity() -> u64 {
    10_000
}
fn default_rate_limit_max() -> u64 {
    100
}
fn default_rate_limit_window() -> u64 {
    60
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "llama3.2:1b".to_string()
}
fn default_ai_cache_days() -> i64 {
    7
}
fn default_metadata_timeout() -> u64 {
    10
}
fn default_metadata_max_body() -> usize {
    1_048_576
}
fn default_analytics_queue() -> usize {
    1024
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "plain".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            base_url: default_base_url(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: default_cache_type(),
            ttl_hours: default_cache_ttl_hours(),
            redis_url: default_redis_url(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max(),
            window_secs: default_rate_limit_window(),
            redis_url: default_redis_url(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
            cache_days: default_ai_cache_days(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_metadata_timeout(),
            max_body_size: default_metadata_max_body(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: default_analytics_queue(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            format: default_log_format(),
        }
    }
}

fn env_string(key: &str, current: &mut String) {
    if let Ok(v) = std::env::var(key) {
        if !v.is_empty() {
            *current = v;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, current: &mut T) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(parsed) = v.parse::<T>() {
            *current = parsed;
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置（dotenv 已在入口处装载）
    pub fn load() -> Self {
        let mut config = AppConfig::default();

        env_string("SERVER_HOST", &mut config.server.host);
        env_parse("SERVER_PORT", &mut config.server.port);
        env_string("APP_BASE_URL", &mut config.server.base_url);
        // 去掉尾部斜杠，拼接时统一补
        while config.server.base_url.ends_with('/') {
            config.server.base_url.pop();
        }

        env_string("DATABASE_URL", &mut config.database.database_url);

        env_string("CACHE_TYPE", &mut config.cache.cache_type);
        env_parse("CACHE_TTL_HOURS", &mut config.cache.ttl_hours);
        env_string("REDIS_URL", &mut config.cache.redis_url);
        env_parse("CACHE_MEMORY_CAPACITY", &mut config.cache.memory_capacity);

        env_parse("RATE_LIMIT_MAX_REQUESTS", &mut config.rate_limit.max_requests);
        env_parse("RATE_LIMIT_WINDOW_SECS", &mut config.rate_limit.window_secs);
        config.rate_limit.redis_url = config.cache.redis_url.clone();
        env_string("RATE_LIMIT_REDIS_URL", &mut config.rate_limit.redis_url);

        env_string("OLLAMA_BASE_URL", &mut config.ollama.base_url);
        env_string("OLLAMA_MODEL", &mut config.ollama.model);
        env_parse("AI_CACHE_DAYS", &mut config.ollama.cache_days);

        env_parse(
            "METADATA_FETCH_TIMEOUT",
            &mut config.metadata.fetch_timeout_secs,
        );
        env_parse("METADATA_MAX_BODY_SIZE", &mut config.metadata.max_body_size);

        env_parse("ANALYTICS_WORKERS", &mut config.analytics.workers);
        env_parse(
            "ANALYTICS_QUEUE_CAPACITY",
            &mut config.analytics.queue_capacity,
        );

        env_string("LOG_LEVEL", &mut config.logging.level);
        if let Ok(v) = std::env::var("LOG_FILE") {
            if !v.is_empty() {
                config.logging.file = Some(v);
            }
        }
        env_string("LOG_FORMAT", &mut config.logging.format);

        config
    }

    /// 分析执行器的实际 worker 数
    pub fn analytics_workers(&self) -> usize {
        if self.analytics.workers > 0 {
            self.analytics.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            cores * 4
        }
    }

    /// 缓存 TTL（秒）
    pub fn cache_ttl_secs(&self) -> u64 {
        self.cache.ttl_hours * 3600
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.ttl_hours, 24);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.ollama.cache_days, 7);
        assert_eq!(config.metadata.max_body_size, 1_048_576);
    }

    #[test]
    fn test_analytics_workers_auto() {
        let config = AppConfig::default();
        assert!(config.analytics_workers() >= 4);
    }

    #[test]
    fn test_cache_ttl_secs() {
        let config = AppConfig::default();
        assert_eq!(config.cache_ttl_secs(), 86_400);
    }
}
