//! HTTP 层的请求/响应类型（JSON 字段统一 camelCase）

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::ai::AiAnalysis;
use crate::services::metadata::PageMetadata;

fn default_true() -> bool {
    true
}

/// 创建单条短链接的请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlRequest {
    pub original_url: String,
    #[serde(default)]
    pub custom_alias: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// ISO-8601；无时区偏移按 UTC 解释
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default = "default_true")]
    pub fetch_metadata: bool,
    #[serde(default = "default_true")]
    pub enable_ai_analysis: bool,
    #[serde(default)]
    pub generate_qr_code: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateRequest {
    pub urls: Vec<CreateUrlRequest>,
    /// 批级开关，设置时覆盖每条的开关
    #[serde(default)]
    pub fetch_metadata: Option<bool>,
    #[serde(default)]
    pub enable_ai_analysis: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataBlock {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub favicon_url: Option<String>,
    pub site_name: Option<String>,
    #[serde(rename = "type")]
    pub page_type: Option<String>,
}

impl From<&PageMetadata> for MetadataBlock {
    fn from(meta: &PageMetadata) -> Self {
        Self {
            title: meta.title.clone(),
            description: meta.description.clone(),
            image_url: meta.image_url.clone(),
            favicon_url: meta.favicon_url.clone(),
            site_name: meta.site_name.clone(),
            page_type: meta.page_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysisBlock {
    pub summary: String,
    pub category: String,
    pub tags: Vec<String>,
    pub safety_score: f64,
    pub is_safe: bool,
    pub safety_reasons: Vec<String>,
    pub alias_suggestions: Vec<String>,
    pub from_cache: bool,
}

impl From<&AiAnalysis> for AiAnalysisBlock {
    fn from(a: &AiAnalysis) -> Self {
        Self {
            summary: a.summary.clone(),
            category: a.category.clone(),
            tags: a.tags.clone(),
            safety_score: a.safety_score,
            is_safe: a.is_safe,
            safety_reasons: a.safety_reasons.clone(),
            alias_suggestions: a.alias_suggestions.clone(),
            from_cache: a.from_cache,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlResponse {
    pub short_url: String,
    pub short_key: String,
    pub custom_alias: Option<String>,
    pub is_password_protected: bool,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<AiAnalysisBlock>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkError {
    pub index: usize,
    pub original_url: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateResponse {
    pub success_count: usize,
    pub failed_count: usize,
    pub results: Vec<CreateUrlResponse>,
    pub errors: Vec<BulkError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlListItem {
    pub short_key: String,
    pub custom_alias: Option<String>,
    pub effective_key: String,
    pub original_url: String,
    pub short_url: String,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_password_protected: bool,
    pub meta_title: Option<String>,
    pub ai_category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlStatsResponse {
    pub original_url: String,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub short_key: String,
    pub original_url: String,
    pub total_clicks: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub clicks_by_country: BTreeMap<String, i64>,
    pub clicks_by_device: BTreeMap<String, i64>,
    pub clicks_by_browser: BTreeMap<String, i64>,
    pub clicks_by_os: BTreeMap<String, i64>,
    pub clicks_by_referer: BTreeMap<String, i64>,
    /// 最近 30 天按日（UTC）聚合
    pub clicks_over_time: BTreeMap<String, i64>,
    pub ai_summary: Option<String>,
    pub ai_category: Option<String>,
    pub ai_tags: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub favicon_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedResponse {
    pub password_required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordVerifyRequest {
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedirectQuery {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeQuery {
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub fg_color: Option<String>,
    #[serde(default)]
    pub bg_color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateUrlRequest =
            serde_json::from_str(r#"{"originalUrl": "https://example.com"}"#).unwrap();
        assert_eq!(req.original_url, "https://example.com");
        assert!(req.fetch_metadata);
        assert!(req.enable_ai_analysis);
        assert!(!req.generate_qr_code);
        assert!(req.custom_alias.is_none());
    }

    #[test]
    fn test_create_request_camel_case() {
        let req: CreateUrlRequest = serde_json::from_str(
            r#"{"originalUrl": "https://a.test", "customAlias": "demo", "fetchMetadata": false, "generateQrCode": true}"#,
        )
        .unwrap();
        assert_eq!(req.custom_alias.as_deref(), Some("demo"));
        assert!(!req.fetch_metadata);
        assert!(req.generate_qr_code);
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let resp = CreateUrlResponse {
            short_url: "http://localhost:8080/abc123".into(),
            short_key: "abc123".into(),
            custom_alias: None,
            is_password_protected: false,
            expires_at: None,
            qr_code: None,
            metadata: None,
            ai_analysis: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"shortUrl\""));
        assert!(json.contains("\"isPasswordProtected\""));
        assert!(!json.contains("\"qrCode\""));
    }
}
