//! 网页元数据抓取
//!
//! 抓取目标页面并提取 Open Graph / Twitter Card / 基础 HTML 元数据，
//! 以及供 LLM 提示词使用的正文文本（截断到 5000 字符）。
//! 全部字段可缺失；任何失败只产出裸 URL 结果。连续失败会短路
//! 一段时间，避免反复打不可用的目标。

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; LinkletBot/1.0)";
const TEXT_CONTENT_CAP: usize = 5000;

/// 连续失败计数门：失败 5 次后冷却 60 秒
const FAILURE_THRESHOLD: u32 = 5;
const COOLDOWN_MS: i64 = 60_000;

/// 提取到的页面元数据，全部可选
#[derive(Debug, Clone, Default)]
pub struct PageMetadata {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub favicon_url: Option<String>,
    pub site_name: Option<String>,
    pub page_type: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
    pub canonical_url: Option<String>,
    pub text_content: Option<String>,
}

impl PageMetadata {
    fn bare(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

struct FailureGate {
    consecutive: AtomicU32,
    opened_at_ms: AtomicI64,
}

impl FailureGate {
    fn new() -> Self {
        Self {
            consecutive: AtomicU32::new(0),
            opened_at_ms: AtomicI64::new(0),
        }
    }

    fn is_open(&self) -> bool {
        if self.consecutive.load(Ordering::Relaxed) < FAILURE_THRESHOLD {
            return false;
        }
        let opened = self.opened_at_ms.load(Ordering::Relaxed);
        let now = chrono::Utc::now().timestamp_millis();
        if now - opened >= COOLDOWN_MS {
            // 冷却结束，放行一次探测
            self.consecutive.store(FAILURE_THRESHOLD - 1, Ordering::Relaxed);
            return false;
        }
        true
    }

    fn record_failure(&self) {
        let n = self.consecutive.fetch_add(1, Ordering::Relaxed) + 1;
        if n >= FAILURE_THRESHOLD {
            self.opened_at_ms
                .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
        }
    }

    fn record_success(&self) {
        self.consecutive.store(0, Ordering::Relaxed);
    }
}

pub struct MetadataFetcher {
    client: reqwest::Client,
    max_body_size: usize,
    gate: FailureGate,
}

impl MetadataFetcher {
    pub fn new(timeout_secs: u64, max_body_size: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();

        Self {
            client,
            max_body_size,
            gate: FailureGate::new(),
        }
    }

    /// 抓取并提取元数据；失败时返回只含 URL 的结果
    pub async fn fetch(&self, url: &str) -> PageMetadata {
        if self.gate.is_open() {
            debug!("Metadata fetcher circuit open, skipping fetch for {}", url);
            return PageMetadata::bare(url);
        }

        match self.fetch_html(url).await {
            Ok(body) => {
                self.gate.record_success();
                extract_metadata(&body, url)
            }
            Err(e) => {
                self.gate.record_failure();
                warn!("Failed to fetch metadata for URL: {}, error: {}", url, e);
                PageMetadata::bare(url)
            }
        }
    }

    async fn fetch_html(&self, url: &str) -> Result<String, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }

        if let Some(len) = resp.content_length() {
            if len as usize > self.max_body_size {
                return Err(format!("body too large: {} bytes", len));
            }
        }

        let body = resp.text().await.map_err(|e| e.to_string())?;
        if body.len() > self.max_body_size {
            // Content-Length 缺失时的兜底截断
            let mut end = self.max_body_size;
            while end > 0 && !body.is_char_boundary(end) {
                end -= 1;
            }
            return Ok(body[..end].to_string());
        }
        Ok(body)
    }
}

/// 从 HTML 文档中提取元数据
///
/// 优先级与字段和提取顺序：
/// - title: og:title → twitter:title → `<title>`
/// - description: og:description → twitter:description → meta[name=description]
/// - image: og:image → twitter:image（相对地址基于页面 URL 解析）
/// - favicon: link[rel=icon] 及变体 → /favicon.ico
pub fn extract_metadata(html: &str, url: &str) -> PageMetadata {
    let doc = Html::parse_document(html);

    let title = meta_content(&doc, "og:title")
        .or_else(|| meta_content(&doc, "twitter:title"))
        .or_else(|| {
            select_first(&doc, "title").map(|el| el.text().collect::<String>().trim().to_string())
        })
        .filter(|s| !s.is_empty());

    let description = meta_content(&doc, "og:description")
        .or_else(|| meta_content(&doc, "twitter:description"))
        .or_else(|| meta_name(&doc, "description"));

    let image_url = meta_content(&doc, "og:image")
        .or_else(|| meta_content(&doc, "twitter:image"))
        .and_then(|img| resolve_relative(url, &img));

    let favicon_url = extract_favicon(&doc, url);

    let canonical_url = select_first(&doc, r#"link[rel="canonical"]"#)
        .and_then(|el| el.value().attr("href"))
        .map(String::from);

    // 正文文本，供下游 LLM 提示词使用
    let text_content = {
        let text = html2text::from_read(html.as_bytes(), 80);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(truncate_chars(trimmed, TEXT_CONTENT_CAP))
        }
    };

    PageMetadata {
        url: url.to_string(),
        title,
        description,
        image_url,
        favicon_url,
        site_name: meta_content(&doc, "og:site_name"),
        page_type: meta_content(&doc, "og:type"),
        author: meta_name(&doc, "author"),
        keywords: meta_name(&doc, "keywords"),
        canonical_url,
        text_content,
    }
}

fn select_first<'a>(doc: &'a Html, css: &str) -> Option<scraper::ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector).next()
}

/// meta[property=...] 与 meta[name=...] 双路查找
fn meta_content(doc: &Html, property: &str) -> Option<String> {
    let by_property = format!(r#"meta[property="{}"]"#, property);
    let by_name = format!(r#"meta[name="{}"]"#, property);

    select_first(doc, &by_property)
        .or_else(|| select_first(doc, &by_name))
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn meta_name(doc: &Html, name: &str) -> Option<String> {
    select_first(doc, &format!(r#"meta[name="{}"]"#, name))
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_favicon(doc: &Html, url: &str) -> Option<String> {
    const SELECTORS: &[&str] = &[
        r#"link[rel="icon"]"#,
        r#"link[rel="shortcut icon"]"#,
        r#"link[rel="apple-touch-icon"]"#,
        r#"link[rel="apple-touch-icon-precomposed"]"#,
    ];

    for css in SELECTORS {
        if let Some(href) = select_first(doc, css).and_then(|el| el.value().attr("href")) {
            if let Some(resolved) = resolve_relative(url, href) {
                return Some(resolved);
            }
        }
    }

    // 约定路径兜底
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{}/favicon.ico", parsed.scheme(), host))
}

/// 相对地址基于页面 URL 解析为绝对地址
fn resolve_relative(base: &str, candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        return Some(candidate.to_string());
    }
    if let Some(rest) = candidate.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    Url::parse(base)
        .ok()?
        .join(candidate)
        .ok()
        .map(|u| u.to_string())
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<!DOCTYPE html>
<html><head>
<title>Fallback Title</title>
<meta property="og:title" content="OG Title">
<meta property="og:description" content="OG Description">
<meta property="og:image" content="/img/cover.png">
<meta property="og:site_name" content="Example">
<meta property="og:type" content="article">
<meta name="author" content="Jane Doe">
<meta name="keywords" content="a,b,c">
<link rel="icon" href="/static/favicon.svg">
<link rel="canonical" href="https://example.com/page">
</head><body><p>Hello world content.</p></body></html>"#;

    #[test]
    fn test_og_priority() {
        let meta = extract_metadata(SAMPLE, "https://example.com/page");
        assert_eq!(meta.title.as_deref(), Some("OG Title"));
        assert_eq!(meta.description.as_deref(), Some("OG Description"));
        assert_eq!(
            meta.image_url.as_deref(),
            Some("https://example.com/img/cover.png")
        );
        assert_eq!(
            meta.favicon_url.as_deref(),
            Some("https://example.com/static/favicon.svg")
        );
        assert_eq!(meta.site_name.as_deref(), Some("Example"));
        assert_eq!(meta.page_type.as_deref(), Some("article"));
        assert_eq!(meta.author.as_deref(), Some("Jane Doe"));
        assert_eq!(meta.canonical_url.as_deref(), Some("https://example.com/page"));
        assert!(meta.text_content.unwrap().contains("Hello world"));
    }

    #[test]
    fn test_title_fallback_chain() {
        let html = "<html><head><title>Only Title</title></head><body></body></html>";
        let meta = extract_metadata(html, "https://example.com");
        assert_eq!(meta.title.as_deref(), Some("Only Title"));
    }

    #[test]
    fn test_favicon_default() {
        let html = "<html><head></head><body></body></html>";
        let meta = extract_metadata(html, "https://example.com/deep/path");
        assert_eq!(
            meta.favicon_url.as_deref(),
            Some("https://example.com/favicon.ico")
        );
    }

    #[test]
    fn test_resolve_relative_variants() {
        assert_eq!(
            resolve_relative("https://example.com/a/b", "https://cdn.test/x.png"),
            Some("https://cdn.test/x.png".to_string())
        );
        assert_eq!(
            resolve_relative("https://example.com/a/b", "//cdn.test/x.png"),
            Some("https://cdn.test/x.png".to_string())
        );
        assert_eq!(
            resolve_relative("https://example.com/a/b", "/x.png"),
            Some("https://example.com/x.png".to_string())
        );
        assert_eq!(resolve_relative("https://example.com", ""), None);
    }

    #[test]
    fn test_failure_gate_opens_and_cools() {
        let gate = FailureGate::new();
        assert!(!gate.is_open());
        for _ in 0..FAILURE_THRESHOLD {
            gate.record_failure();
        }
        assert!(gate.is_open());
        gate.record_success();
        assert!(!gate.is_open());
    }
}
