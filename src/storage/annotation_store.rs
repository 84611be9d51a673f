use chrono::{Duration, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::debug;

use crate::errors::Result;
use crate::storage::models::Annotation;
use migration::entities::ai_annotation;

/// AI 分析结果的内容寻址缓存
///
/// 以 SHA-256(original_url) 为键；过期行惰性删除，
/// `Annotation::is_expired` 是唯一的新鲜度判定。
#[derive(Clone)]
pub struct AnnotationStore {
    db: DatabaseConnection,
    ttl_days: i64,
}

fn model_to_annotation(model: ai_annotation::Model) -> Annotation {
    Annotation {
        url_hash: model.url_hash,
        original_url: model.original_url,
        summary: model.summary,
        category: model.category,
        tags: model.tags,
        safety_score: model.safety_score,
        is_safe: model.is_safe,
        safety_reasons: model.safety_reasons,
        analyzed_at: model.analyzed_at,
        expires_at: model.expires_at,
    }
}

impl AnnotationStore {
    pub fn new(db: DatabaseConnection, ttl_days: i64) -> Self {
        Self { db, ttl_days }
    }

    /// 按 URL 哈希查找缓存的分析结果
    ///
    /// 过期行顺手删除并按未命中处理。
    pub async fn find_fresh(&self, url_hash: &str) -> Result<Option<Annotation>> {
        let model = ai_annotation::Entity::find()
            .filter(ai_annotation::Column::UrlHash.eq(url_hash))
            .one(&self.db)
            .await?;

        match model {
            Some(model) => {
                let annotation = model_to_annotation(model);
                if annotation.is_expired() {
                    debug!("Expired annotation dropped for hash: {}", url_hash);
                    self.delete(url_hash).await?;
                    Ok(None)
                } else {
                    Ok(Some(annotation))
                }
            }
            None => Ok(None),
        }
    }

    /// 写入或替换分析结果，expires_at = now + ttl_days
    ///
    /// 并发写采用 last-writer-wins 的 ON CONFLICT upsert。
    pub async fn upsert(
        &self,
        url_hash: &str,
        original_url: &str,
        summary: Option<&str>,
        category: Option<&str>,
        tags: Option<&str>,
        safety_score: Option<f64>,
        is_safe: bool,
        safety_reasons: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        let active = ai_annotation::ActiveModel {
            url_hash: Set(url_hash.to_string()),
            original_url: Set(original_url.to_string()),
            summary: Set(summary.map(String::from)),
            category: Set(category.map(String::from)),
            tags: Set(tags.map(String::from)),
            safety_score: Set(safety_score),
            is_safe: Set(is_safe),
            safety_reasons: Set(safety_reasons.map(String::from)),
            analyzed_at: Set(now),
            expires_at: Set(now + Duration::days(self.ttl_days)),
            ..Default::default()
        };

        ai_annotation::Entity::insert(active)
            .on_conflict(
                OnConflict::column(ai_annotation::Column::UrlHash)
                    .update_columns([
                        ai_annotation::Column::OriginalUrl,
                        ai_annotation::Column::Summary,
                        ai_annotation::Column::Category,
                        ai_annotation::Column::Tags,
                        ai_annotation::Column::SafetyScore,
                        ai_annotation::Column::IsSafe,
                        ai_annotation::Column::SafetyReasons,
                        ai_annotation::Column::AnalyzedAt,
                        ai_annotation::Column::ExpiresAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        debug!("Annotation upserted for hash: {}", url_hash);
        Ok(())
    }

    pub async fn delete(&self, url_hash: &str) -> Result<()> {
        ai_annotation::Entity::delete_many()
            .filter(ai_annotation::Column::UrlHash.eq(url_hash))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
