use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use tracing::{debug, error};

use crate::errors::{LinkletError, Result};
use crate::storage::models::Mapping;
use migration::entities::url_mapping;

/// 短键分配结果
///
/// 并发创建撞键时由唯一约束裁决，Conflict 让调用方重新铸键。
#[derive(Debug, PartialEq, Eq)]
pub enum AssignOutcome {
    Assigned,
    Conflict,
}

/// 映射存储
///
/// url_mappings 表的全部读写入口。点击计数的自增通过列表达式
/// 在数据库侧原子完成。
#[derive(Clone)]
pub struct MappingStore {
    db: DatabaseConnection,
}

fn model_to_mapping(model: url_mapping::Model) -> Mapping {
    Mapping {
        id: model.id,
        // 创建窗口内 short_key 可能尚未分配
        short_key: model.short_key.unwrap_or_default(),
        alias: model.alias,
        original_url: model.original_url,
        created_at: model.created_at,
        expires_at: model.expires_at,
        is_active: model.is_active,
        click_count: model.click_count,
        password_hash: model.password_hash,
        meta_title: model.meta_title,
        meta_description: model.meta_description,
        meta_image_url: model.meta_image_url,
        meta_favicon_url: model.meta_favicon_url,
        meta_fetched_at: model.meta_fetched_at,
        ai_summary: model.ai_summary,
        ai_category: model.ai_category,
        ai_tags: model.ai_tags,
        ai_safety_score: model.ai_safety_score,
        ai_analyzed_at: model.ai_analyzed_at,
    }
}

/// 判断是否为唯一约束冲突
fn is_unique_violation(err: &DbErr) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("unique") || msg.contains("duplicate")
}

impl MappingStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 插入新映射（short_key 留空，由调用方铸键后分配），返回 id
    pub async fn insert(
        &self,
        original_url: &str,
        alias: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
        password_hash: Option<&str>,
    ) -> Result<i64> {
        let active = url_mapping::ActiveModel {
            short_key: Set(None),
            alias: Set(alias.map(String::from)),
            original_url: Set(original_url.to_string()),
            created_at: Set(Utc::now()),
            expires_at: Set(expires_at),
            is_active: Set(true),
            click_count: Set(0),
            password_hash: Set(password_hash.map(String::from)),
            ..Default::default()
        };

        let res = url_mapping::Entity::insert(active)
            .exec(&self.db)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    LinkletError::duplicate_alias(format!(
                        "Custom alias already exists: {}",
                        alias.unwrap_or_default()
                    ))
                } else {
                    e.into()
                }
            })?;

        debug!("Inserted url mapping with id: {}", res.last_insert_id);
        Ok(res.last_insert_id)
    }

    /// 为映射分配短键
    ///
    /// 并发撞键时唯一索引会拒绝更新，返回 Conflict 供重试。
    pub async fn assign_short_key(&self, id: i64, short_key: &str) -> Result<AssignOutcome> {
        let active = url_mapping::ActiveModel {
            id: Set(id),
            short_key: Set(Some(short_key.to_string())),
            ..Default::default()
        };

        match url_mapping::Entity::update(active).exec(&self.db).await {
            Ok(_) => Ok(AssignOutcome::Assigned),
            Err(e) if is_unique_violation(&e) => {
                debug!("Short key collision on assign: {}", short_key);
                Ok(AssignOutcome::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 按 effective key 查找：short_key = k OR alias = k，至多一条
    pub async fn find_by_effective_key(&self, key: &str) -> Result<Option<Mapping>> {
        let model = url_mapping::Entity::find()
            .filter(
                Condition::any()
                    .add(url_mapping::Column::ShortKey.eq(key))
                    .add(url_mapping::Column::Alias.eq(key)),
            )
            .one(&self.db)
            .await?;

        Ok(model.map(model_to_mapping))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Mapping>> {
        let model = url_mapping::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(model_to_mapping))
    }

    pub async fn exists_short_key(&self, key: &str) -> Result<bool> {
        let count = url_mapping::Entity::find()
            .filter(url_mapping::Column::ShortKey.eq(key))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn exists_alias(&self, alias: &str) -> Result<bool> {
        let count = url_mapping::Entity::find()
            .filter(url_mapping::Column::Alias.eq(alias))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    /// 原子自增点击计数（以系统短键定位）
    pub async fn increment_clicks(&self, short_key: &str) -> Result<()> {
        url_mapping::Entity::update_many()
            .col_expr(
                url_mapping::Column::ClickCount,
                Expr::col(url_mapping::Column::ClickCount).add(1),
            )
            .filter(url_mapping::Column::ShortKey.eq(short_key))
            .exec(&self.db)
            .await
            .map_err(|e| {
                error!("点击计数更新失败 {}: {}", short_key, e);
                LinkletError::from(e)
            })?;
        Ok(())
    }

    /// 将已过期的活跃映射标记为 inactive，返回影响行数
    pub async fn mark_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = url_mapping::Entity::update_many()
            .col_expr(url_mapping::Column::IsActive, Expr::value(false))
            .filter(url_mapping::Column::ExpiresAt.lte(now))
            .filter(url_mapping::Column::IsActive.eq(true))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }

    /// 最近创建的活跃映射，按创建时间倒序
    pub async fn list_recent(&self, limit: u64) -> Result<Vec<Mapping>> {
        let models = url_mapping::Entity::find()
            .filter(url_mapping::Column::IsActive.eq(true))
            .order_by_desc(url_mapping::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(model_to_mapping).collect())
    }

    /// 创建后装饰：写入网页元数据字段
    pub async fn update_metadata(
        &self,
        id: i64,
        title: Option<&str>,
        description: Option<&str>,
        image_url: Option<&str>,
        favicon_url: Option<&str>,
    ) -> Result<()> {
        let active = url_mapping::ActiveModel {
            id: Set(id),
            meta_title: Set(title.map(String::from)),
            meta_description: Set(description.map(String::from)),
            meta_image_url: Set(image_url.map(String::from)),
            meta_favicon_url: Set(favicon_url.map(String::from)),
            meta_fetched_at: Set(Some(Utc::now())),
            ..Default::default()
        };

        url_mapping::Entity::update(active).exec(&self.db).await?;
        Ok(())
    }

    /// 创建后装饰：写入 AI 分析字段
    pub async fn update_ai_decorations(
        &self,
        id: i64,
        summary: Option<&str>,
        category: Option<&str>,
        tags: Option<&str>,
        safety_score: Option<f64>,
    ) -> Result<()> {
        let active = url_mapping::ActiveModel {
            id: Set(id),
            ai_summary: Set(summary.map(String::from)),
            ai_category: Set(category.map(String::from)),
            ai_tags: Set(tags.map(String::from)),
            ai_safety_score: Set(safety_score),
            ai_analyzed_at: Set(Some(Utc::now())),
            ..Default::default()
        };

        url_mapping::Entity::update(active).exec(&self.db).await?;
        Ok(())
    }
}
