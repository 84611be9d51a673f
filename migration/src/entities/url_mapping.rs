use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "url_mappings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// 系统生成的短键，插入后分配（唯一）
    pub short_key: Option<String>,
    /// 用户自定义别名（唯一，可空）
    pub alias: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub original_url: String,
    pub created_at: DateTimeUtc,
    pub expires_at: Option<DateTimeUtc>,
    pub is_active: bool,
    pub click_count: i64,
    pub password_hash: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub meta_title: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub meta_description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub meta_image_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub meta_favicon_url: Option<String>,
    pub meta_fetched_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub ai_summary: Option<String>,
    pub ai_category: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub ai_tags: Option<String>,
    pub ai_safety_score: Option<f64>,
    pub ai_analyzed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
