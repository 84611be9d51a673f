//! 创建路径编排
//!
//! 校验 → 别名检查 → 密码哈希 → 落库 → 铸键（碰撞重试）→
//! 元数据抓取 → AI 分析（同步命中缓存 + 后台补分析）→ 装饰 →
//! 缓存预热 → 响应。富化失败绝不影响创建本身。

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::api::types::{
    AiAnalysisBlock, AnalyticsResponse, BulkCreateRequest, BulkCreateResponse, BulkError,
    CreateUrlRequest, CreateUrlResponse, MetadataBlock, PreviewResponse, ProtectedResponse,
    UrlListItem, UrlStatsResponse,
};
use crate::cache::HotCache;
use crate::errors::{LinkletError, Result};
use crate::services::ai::AiService;
use crate::services::metadata::MetadataFetcher;
use crate::services::qr;
use crate::storage::AssignOutcome;
use crate::storage::models::Mapping;
use crate::storage::{ClickStore, MappingStore};
use crate::utils::KeyMinter;
use crate::utils::password::{hash_password, is_valid_password};
use crate::utils::time_parser::parse_expires_at;
use crate::utils::url_validator::{sanitize, validate_url};

static ALIAS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,50}$").unwrap());

const MINT_MAX_RETRIES: usize = 10;
const MINT_ESCALATED_LENGTH: usize = 10;
const RECENT_LIST_LIMIT: u64 = 20;
const ANALYTICS_WINDOW_DAYS: i64 = 30;

#[derive(Clone)]
pub struct Shortener {
    mappings: MappingStore,
    clicks: ClickStore,
    cache: Arc<dyn HotCache>,
    minter: KeyMinter,
    metadata: Arc<MetadataFetcher>,
    ai: AiService,
    base_url: String,
}

impl Shortener {
    pub fn new(
        mappings: MappingStore,
        clicks: ClickStore,
        cache: Arc<dyn HotCache>,
        metadata: Arc<MetadataFetcher>,
        ai: AiService,
        base_url: &str,
    ) -> Self {
        Self {
            mappings,
            clicks,
            cache,
            minter: KeyMinter::new(),
            metadata,
            ai,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn short_url(&self, effective_key: &str) -> String {
        format!("{}/{}", self.base_url, effective_key)
    }

    /// 创建一条短链接
    pub async fn create(&self, request: &CreateUrlRequest) -> Result<CreateUrlResponse> {
        let original_url = sanitize(&request.original_url).to_string();
        validate_url(&original_url)?;

        // 别名：格式 + 与别名/短键两个命名空间都不冲突
        let alias = match request.custom_alias.as_deref().filter(|a| !a.is_empty()) {
            Some(alias) => {
                if !ALIAS_PATTERN.is_match(alias) {
                    return Err(LinkletError::validation(
                        "Custom alias must be 3-50 characters of letters, digits, '-' or '_'",
                    ));
                }
                if self.mappings.exists_alias(alias).await?
                    || self.mappings.exists_short_key(alias).await?
                {
                    return Err(LinkletError::duplicate_alias(format!(
                        "Custom alias already exists: {}",
                        alias
                    )));
                }
                Some(alias.to_string())
            }
            None => None,
        };

        // 密码：长度校验后哈希，保护状态由哈希的存在推导
        let password_hash = match request.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => {
                if !is_valid_password(password) {
                    return Err(LinkletError::validation(
                        "Password must be 4-128 characters",
                    ));
                }
                Some(hash_password(password)?)
            }
            None => None,
        };

        let expires_at = match request.expires_at.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_expires_at(raw)?),
            None => None,
        };

        // 先落库拿 id，再铸键分配
        let id = self
            .mappings
            .insert(
                &original_url,
                alias.as_deref(),
                expires_at,
                password_hash.as_deref(),
            )
            .await?;
        debug!("Created URL mapping with id: {}", id);

        let short_key = self.assign_unique_short_key(id).await?;

        // 元数据抓取（尽力而为）
        let metadata = if request.fetch_metadata {
            let meta = self.metadata.fetch(&original_url).await;
            if let Err(e) = self
                .mappings
                .update_metadata(
                    id,
                    meta.title.as_deref(),
                    meta.description.as_deref(),
                    meta.image_url.as_deref(),
                    meta.favicon_url.as_deref(),
                )
                .await
            {
                warn!("Metadata decoration failed for {}: {}", short_key, e);
            }
            Some(meta)
        } else {
            None
        };

        // AI 分析：同步打一次（热路径命中注解缓存），再派发后台补分析
        let ai_analysis = if request.enable_ai_analysis {
            let title = metadata.as_ref().and_then(|m| m.title.as_deref());
            let description = metadata.as_ref().and_then(|m| m.description.as_deref());

            let analysis = self.ai.analyze(&original_url, title, description).await;

            let tags = analysis.tags.join(",");
            if let Err(e) = self
                .mappings
                .update_ai_decorations(
                    id,
                    Some(analysis.summary.as_str()).filter(|s| !s.is_empty()),
                    Some(analysis.category.as_str()),
                    if tags.is_empty() { None } else { Some(&tags) },
                    Some(analysis.safety_score),
                )
                .await
            {
                warn!("AI decoration failed for {}: {}", short_key, e);
            }

            self.ai
                .analyze_in_background(
                    id,
                    original_url.clone(),
                    title.map(String::from),
                    description.map(String::from),
                )
                .await;

            Some(analysis)
        } else {
            None
        };

        // 非密码保护才进热缓存
        let protected = password_hash.is_some();
        if !protected {
            self.cache.put(&short_key, &original_url).await;
        }

        let effective_key = alias.as_deref().unwrap_or(&short_key);
        let short_url = self.short_url(effective_key);

        let qr_code = if request.generate_qr_code {
            match qr::render_data_url(&short_url) {
                Ok(data_url) => Some(data_url),
                Err(e) => {
                    warn!("QR generation failed for {}: {}", short_key, e);
                    None
                }
            }
        } else {
            None
        };

        info!("Created short URL: {} -> {}", effective_key, original_url);

        Ok(CreateUrlResponse {
            short_url,
            short_key,
            custom_alias: alias,
            is_password_protected: protected,
            expires_at,
            qr_code,
            metadata: metadata.as_ref().map(MetadataBlock::from),
            ai_analysis: ai_analysis.as_ref().map(|a| AiAnalysisBlock::from(a)),
        })
    }

    /// 铸造全局唯一短键并分配给映射
    ///
    /// 默认长度最多尝试 10 次（对短键和别名两个索引都探测）；
    /// 用尽后升级到 10 位直至唯一。分配时的并发冲突由唯一约束
    /// 裁决，Conflict 则整体重来。
    async fn assign_unique_short_key(&self, id: i64) -> Result<String> {
        loop {
            let key = self.mint_unique_key().await?;
            match self.mappings.assign_short_key(id, &key).await? {
                AssignOutcome::Assigned => return Ok(key),
                AssignOutcome::Conflict => {
                    debug!("Short key {} lost the assignment race, re-minting", key);
                }
            }
        }
    }

    async fn mint_unique_key(&self) -> Result<String> {
        for attempt in 1..=MINT_MAX_RETRIES {
            let key = self.minter.mint();
            if !self.mappings.exists_short_key(&key).await?
                && !self.mappings.exists_alias(&key).await?
            {
                return Ok(key);
            }
            debug!(
                "Short key collision detected: {}, retrying (attempt {}/{})",
                key, attempt, MINT_MAX_RETRIES
            );
        }

        warn!(
            "Failed to generate unique short key after {} attempts, using longer key",
            MINT_MAX_RETRIES
        );
        loop {
            let key = self.minter.mint_of_length(MINT_ESCALATED_LENGTH);
            if !self.mappings.exists_short_key(&key).await?
                && !self.mappings.exists_alias(&key).await?
            {
                return Ok(key);
            }
        }
    }

    /// 批量创建：逐条处理，单条失败不断批
    pub async fn create_bulk(&self, request: &BulkCreateRequest) -> BulkCreateResponse {
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for (index, item) in request.urls.iter().enumerate() {
            if item.original_url.trim().is_empty() {
                errors.push(BulkError {
                    index,
                    original_url: String::new(),
                    error: "Original URL is required".to_string(),
                });
                continue;
            }

            // 批级开关覆盖每条的开关
            let mut item = item.clone();
            if let Some(fetch) = request.fetch_metadata {
                item.fetch_metadata = fetch;
            }
            if let Some(ai) = request.enable_ai_analysis {
                item.enable_ai_analysis = ai;
            }

            match self.create(&item).await {
                Ok(response) => results.push(response),
                Err(e) => {
                    warn!("Bulk create failed at index {}: {}", index, e);
                    let mut message = e.message().to_string();
                    if message.len() > 200 {
                        message.truncate(197);
                        message.push_str("...");
                    }
                    errors.push(BulkError {
                        index,
                        original_url: item.original_url.clone(),
                        error: message,
                    });
                }
            }
        }

        BulkCreateResponse {
            success_count: results.len(),
            failed_count: errors.len(),
            results,
            errors,
        }
    }

    async fn require_mapping(&self, key: &str) -> Result<Mapping> {
        self.mappings
            .find_by_effective_key(key)
            .await?
            .ok_or_else(|| LinkletError::not_found(format!("Short URL not found: {}", key)))
    }

    /// 最近 20 条活跃映射
    pub async fn list_recent(&self) -> Result<Vec<UrlListItem>> {
        let mappings = self.mappings.list_recent(RECENT_LIST_LIMIT).await?;

        Ok(mappings
            .into_iter()
            .map(|m| {
                let effective_key = m.effective_key().to_string();
                UrlListItem {
                    short_url: self.short_url(&effective_key),
                    effective_key,
                    short_key: m.short_key,
                    custom_alias: m.alias,
                    original_url: m.original_url,
                    click_count: m.click_count,
                    created_at: m.created_at,
                    expires_at: m.expires_at,
                    is_password_protected: m.password_hash.is_some(),
                    meta_title: m.meta_title,
                    ai_category: m.ai_category,
                }
            })
            .collect())
    }

    /// 基础计数
    pub async fn stats(&self, key: &str) -> Result<UrlStatsResponse> {
        let mapping = self.require_mapping(key).await?;
        Ok(UrlStatsResponse {
            original_url: mapping.original_url,
            click_count: mapping.click_count,
            created_at: mapping.created_at,
            expires_at: mapping.expires_at,
        })
    }

    /// 维度细分统计
    pub async fn analytics(&self, key: &str) -> Result<AnalyticsResponse> {
        let mapping = self.require_mapping(key).await?;
        let since = Utc::now() - Duration::days(ANALYTICS_WINDOW_DAYS);

        let clicks_by_country = self.clicks.count_by_country(mapping.id).await?;
        let clicks_by_device = self.clicks.count_by_device(mapping.id).await?;
        let clicks_by_browser = self.clicks.count_by_browser(mapping.id).await?;
        let clicks_by_os = self.clicks.count_by_os(mapping.id).await?;
        let clicks_by_referer = self.clicks.count_by_referer(mapping.id).await?;
        let clicks_over_time: BTreeMap<String, i64> =
            self.clicks.count_by_day(mapping.id, since).await?;

        Ok(AnalyticsResponse {
            short_key: mapping.effective_key().to_string(),
            original_url: mapping.original_url.clone(),
            total_clicks: mapping.click_count,
            created_at: mapping.created_at,
            expires_at: mapping.expires_at,
            clicks_by_country,
            clicks_by_device,
            clicks_by_browser,
            clicks_by_os,
            clicks_by_referer,
            clicks_over_time,
            ai_summary: mapping.ai_summary,
            ai_category: mapping.ai_category,
            ai_tags: mapping.ai_tags,
            meta_title: mapping.meta_title,
            meta_description: mapping.meta_description,
            meta_image_url: mapping.meta_image_url,
        })
    }

    /// 密码门前的预览信息（装饰字段）
    pub async fn preview(&self, key: &str) -> Result<PreviewResponse> {
        let mapping = self.require_mapping(key).await?;
        Ok(PreviewResponse {
            title: mapping.meta_title,
            description: mapping.meta_description,
            image_url: mapping.meta_image_url,
            favicon_url: mapping.meta_favicon_url,
        })
    }

    /// 是否需要密码（未知 key 返回 false，不泄露存在性）
    pub async fn is_protected(&self, key: &str) -> Result<ProtectedResponse> {
        let protected = self
            .mappings
            .find_by_effective_key(key)
            .await?
            .map(|m| m.is_password_protected())
            .unwrap_or(false);
        Ok(ProtectedResponse {
            password_required: protected,
        })
    }

    /// 为 QR 接口取 effective key 对应的短 URL
    pub async fn short_url_for(&self, key: &str) -> Result<String> {
        let mapping = self.require_mapping(key).await?;
        Ok(self.short_url(mapping.effective_key()))
    }
}
