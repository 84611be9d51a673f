use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 短链映射的领域模型
///
/// `short_key` 在插入后由 Shortener 分配；从存储读出的记录
/// 在极短的创建窗口外都已带键。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mapping {
    pub id: i64,
    pub short_key: String,
    pub alias: Option<String>,
    pub original_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub click_count: i64,
    pub password_hash: Option<String>,

    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_image_url: Option<String>,
    pub meta_favicon_url: Option<String>,
    pub meta_fetched_at: Option<DateTime<Utc>>,

    pub ai_summary: Option<String>,
    pub ai_category: Option<String>,
    pub ai_tags: Option<String>,
    pub ai_safety_score: Option<f64>,
    pub ai_analyzed_at: Option<DateTime<Utc>>,
}

impl Mapping {
    /// 别名优先的公开标识
    pub fn effective_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.short_key)
    }

    /// 是否设有访问密码（由哈希的存在推导）
    pub fn is_password_protected(&self) -> bool {
        self.password_hash.is_some()
    }

    /// 检查是否已过期（expires_at == now 视为过期）
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| exp <= Utc::now())
            .unwrap_or(false)
    }
}

/// 设备类型分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
    Bot,
    Unknown,
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Unknown
    }
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "Desktop",
            DeviceType::Mobile => "Mobile",
            DeviceType::Tablet => "Tablet",
            DeviceType::Bot => "Bot",
            DeviceType::Unknown => "Unknown",
        }
    }
}

/// 单次点击的完整记录（追加写，不修改）
#[derive(Debug, Clone, Default)]
pub struct ClickRecord {
    pub url_mapping_id: i64,
    pub clicked_at: Option<DateTime<Utc>>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub device_type: Option<String>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub timezone: Option<String>,
}

/// AI 分析结果（内容寻址缓存行的领域形式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub url_hash: String,
    pub original_url: String,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub safety_score: Option<f64>,
    pub is_safe: bool,
    pub safety_reasons: Option<String>,
    pub analyzed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Annotation {
    /// 唯一的新鲜度判定
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn mapping() -> Mapping {
        Mapping {
            id: 1,
            short_key: "abc123".to_string(),
            alias: None,
            original_url: "https://example.com".to_string(),
            created_at: Utc::now(),
            expires_at: None,
            is_active: true,
            click_count: 0,
            password_hash: None,
            meta_title: None,
            meta_description: None,
            meta_image_url: None,
            meta_favicon_url: None,
            meta_fetched_at: None,
            ai_summary: None,
            ai_category: None,
            ai_tags: None,
            ai_safety_score: None,
            ai_analyzed_at: None,
        }
    }

    #[test]
    fn test_effective_key_prefers_alias() {
        let mut m = mapping();
        assert_eq!(m.effective_key(), "abc123");
        m.alias = Some("demo".to_string());
        assert_eq!(m.effective_key(), "demo");
    }

    #[test]
    fn test_password_protection_derived() {
        let mut m = mapping();
        assert!(!m.is_password_protected());
        m.password_hash = Some("$argon2id$...".to_string());
        assert!(m.is_password_protected());
    }

    #[test]
    fn test_expiry_boundary() {
        let mut m = mapping();
        assert!(!m.is_expired());

        m.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(m.is_expired());

        m.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(!m.is_expired());

        // 恰好等于 now 视为过期
        m.expires_at = Some(Utc::now());
        assert!(m.is_expired());
    }

    #[test]
    fn test_annotation_expiry() {
        let fresh = Annotation {
            url_hash: "h".into(),
            original_url: "https://example.com".into(),
            summary: None,
            category: None,
            tags: None,
            safety_score: None,
            is_safe: true,
            safety_reasons: None,
            analyzed_at: Utc::now(),
            expires_at: Utc::now() + Duration::days(7),
        };
        assert!(!fresh.is_expired());

        let stale = Annotation {
            expires_at: Utc::now() - Duration::seconds(1),
            ..fresh
        };
        assert!(stale.is_expired());
    }

    #[test]
    fn test_device_type_strings() {
        assert_eq!(DeviceType::Desktop.as_str(), "Desktop");
        assert_eq!(DeviceType::Bot.as_str(), "Bot");
        assert_eq!(DeviceType::Unknown.as_str(), "Unknown");
    }
}
