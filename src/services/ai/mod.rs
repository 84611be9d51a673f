//! AI 富化子系统
//!
//! 对目标 URL 做本地 LLM 分析（摘要、分类、标签、安全评分、别名建议），
//! 结果按 SHA-256(url) 内容寻址缓存 7 天。上游不可用时由健康门
//! 短路并退回中性结果；任何失败都不会影响创建路径。

mod client;
mod parser;
mod prompt;

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::services::executor::AnalyticsExecutor;
use crate::storage::models::Annotation;
use crate::storage::{AnnotationStore, MappingStore};

pub use client::OllamaClient;
pub use parser::{CATEGORIES, parse_analysis, validate_category};

/// 一次分析的完整结果
#[derive(Debug, Clone, PartialEq)]
pub struct AiAnalysis {
    pub summary: String,
    pub category: String,
    pub tags: Vec<String>,
    pub safety_score: f64,
    pub is_safe: bool,
    pub safety_reasons: Vec<String>,
    pub alias_suggestions: Vec<String>,
    pub from_cache: bool,
}

/// 上游不可用时的中性兜底结果
pub fn default_analysis() -> AiAnalysis {
    AiAnalysis {
        summary: "AI analysis is currently unavailable. Please try again later.".to_string(),
        category: "Other".to_string(),
        tags: Vec::new(),
        safety_score: 0.8,
        is_safe: true,
        safety_reasons: Vec::new(),
        alias_suggestions: Vec::new(),
        from_cache: false,
    }
}

/// SHA-256(url) 的十六进制串，内容寻址键
pub fn hash_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn split_joined(value: Option<&str>) -> Vec<String> {
    value
        .map(|s| {
            s.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn annotation_to_analysis(annotation: Annotation, from_cache: bool) -> AiAnalysis {
    AiAnalysis {
        summary: annotation.summary.unwrap_or_default(),
        category: annotation.category.unwrap_or_else(|| "Other".to_string()),
        tags: split_joined(annotation.tags.as_deref()),
        safety_score: annotation.safety_score.unwrap_or(0.8),
        is_safe: annotation.is_safe,
        safety_reasons: split_joined(annotation.safety_reasons.as_deref()),
        alias_suggestions: Vec::new(),
        from_cache,
    }
}

#[derive(Clone)]
pub struct AiService {
    client: Arc<OllamaClient>,
    annotations: AnnotationStore,
    mappings: MappingStore,
    executor: Arc<AnalyticsExecutor>,
}

impl AiService {
    pub fn new(
        client: Arc<OllamaClient>,
        annotations: AnnotationStore,
        mappings: MappingStore,
        executor: Arc<AnalyticsExecutor>,
    ) -> Self {
        Self {
            client,
            annotations,
            mappings,
            executor,
        }
    }

    /// 分析一个 URL，永不失败
    ///
    /// 顺序：注解缓存 → 健康门 → 生成 → 阶梯解析 → 清洗 → 回写缓存。
    pub async fn analyze(
        &self,
        url: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> AiAnalysis {
        let url_hash = hash_url(url);

        // 1. 内容寻址缓存命中即返回
        match self.annotations.find_fresh(&url_hash).await {
            Ok(Some(annotation)) => {
                debug!("AI analysis cache hit for URL: {}", url);
                return annotation_to_analysis(annotation, true);
            }
            Ok(None) => {}
            Err(e) => warn!("Annotation cache lookup failed: {}", e),
        }

        // 2. 健康门短路
        if !self.client.check_available().await {
            warn!("Ollama is not available, returning default analysis");
            return default_analysis();
        }

        info!("Performing AI analysis for URL: {}", url);

        // 3-5. 生成、解析、清洗
        let prompt = prompt::build_analysis_prompt(url, title, description);
        let raw = match self.client.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Ollama call failed for URL {}: {}", url, e);
                return default_analysis();
            }
        };

        let analysis = parse_analysis(&raw);

        // 6. 回写注解缓存（失败只记日志）
        if let Err(e) = self
            .annotations
            .upsert(
                &url_hash,
                url,
                Some(&analysis.summary).filter(|s| !s.is_empty()).map(|s| s.as_str()),
                Some(analysis.category.as_str()),
                Some(analysis.tags.join(",")).filter(|s| !s.is_empty()).as_deref(),
                Some(analysis.safety_score),
                analysis.is_safe,
                Some(analysis.safety_reasons.join(","))
                    .filter(|s| !s.is_empty())
                    .as_deref(),
            )
            .await
        {
            warn!("Failed to cache AI analysis: {}", e);
        }

        analysis
    }

    /// 创建完成后的后台补分析
    ///
    /// 在分析执行器上运行；映射已带 ai_analyzed_at 时跳过。
    pub async fn analyze_in_background(
        &self,
        mapping_id: i64,
        url: String,
        title: Option<String>,
        description: Option<String>,
    ) {
        let service = self.clone();

        self.executor
            .submit(async move {
                let mapping = match service.mappings.find_by_id(mapping_id).await {
                    Ok(Some(m)) => m,
                    Ok(None) => {
                        warn!("URL mapping not found for async analysis: {}", mapping_id);
                        return;
                    }
                    Err(e) => {
                        warn!("Async analysis lookup failed for {}: {}", mapping_id, e);
                        return;
                    }
                };

                if mapping.ai_analyzed_at.is_some() {
                    debug!("URL already analyzed, skipping: {}", url);
                    return;
                }

                info!("Starting async AI analysis for URL: {}", url);
                let analysis = service
                    .analyze(&url, title.as_deref(), description.as_deref())
                    .await;

                if !analysis.from_cache {
                    let tags = analysis.tags.join(",");
                    if let Err(e) = service
                        .mappings
                        .update_ai_decorations(
                            mapping_id,
                            Some(&analysis.summary).filter(|s| !s.is_empty()).map(|s| s.as_str()),
                            Some(analysis.category.as_str()),
                            if tags.is_empty() { None } else { Some(&tags) },
                            Some(analysis.safety_score),
                        )
                        .await
                    {
                        warn!("Async AI decoration update failed for {}: {}", mapping_id, e);
                    } else {
                        info!("Async AI analysis completed for URL: {}", url);
                    }
                }
            })
            .await;
    }
}
