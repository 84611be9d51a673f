use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

use crate::errors::Result;
use crate::storage::models::ClickRecord;
use migration::entities::click_event;

/// 点击事件存储（append-only）
///
/// 写入由 ClickTracker 的 worker 完成；聚合查询服务于
/// analytics 接口。
#[derive(Clone)]
pub struct ClickStore {
    db: DatabaseConnection,
}

impl ClickStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 持久化一条点击事件，维度字段允许部分缺失
    pub async fn insert(&self, record: ClickRecord) -> Result<()> {
        let active = click_event::ActiveModel {
            url_mapping_id: Set(record.url_mapping_id),
            clicked_at: Set(record.clicked_at.unwrap_or_else(Utc::now)),
            client_ip: Set(record.client_ip.map(|ip| truncate(&ip, 45))),
            user_agent: Set(record.user_agent),
            referer: Set(record.referer),
            browser_name: Set(record.browser_name),
            browser_version: Set(record.browser_version),
            os_name: Set(record.os_name),
            os_version: Set(record.os_version),
            device_type: Set(record.device_type),
            country_code: Set(record.country_code),
            country_name: Set(record.country_name),
            city: Set(record.city),
            region: Set(record.region),
            timezone: Set(record.timezone),
            ..Default::default()
        };

        click_event::Entity::insert(active).exec(&self.db).await?;
        Ok(())
    }

    /// 按某个维度列分组计数（country_code / device_type / ...）
    async fn count_by_column(
        &self,
        mapping_id: i64,
        column: click_event::Column,
    ) -> Result<BTreeMap<String, i64>> {
        let rows: Vec<(Option<String>, i64)> = click_event::Entity::find()
            .select_only()
            .column(column)
            .column_as(Expr::col(click_event::Column::Id).count(), "count")
            .filter(click_event::Column::UrlMappingId.eq(mapping_id))
            .group_by(column)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, count)| {
                let key = key?;
                let key = key.trim();
                if key.is_empty() {
                    None
                } else {
                    Some((key.to_string(), count))
                }
            })
            .collect())
    }

    pub async fn count_by_country(&self, mapping_id: i64) -> Result<BTreeMap<String, i64>> {
        self.count_by_column(mapping_id, click_event::Column::CountryCode)
            .await
    }

    pub async fn count_by_device(&self, mapping_id: i64) -> Result<BTreeMap<String, i64>> {
        self.count_by_column(mapping_id, click_event::Column::DeviceType)
            .await
    }

    pub async fn count_by_browser(&self, mapping_id: i64) -> Result<BTreeMap<String, i64>> {
        self.count_by_column(mapping_id, click_event::Column::BrowserName)
            .await
    }

    pub async fn count_by_os(&self, mapping_id: i64) -> Result<BTreeMap<String, i64>> {
        self.count_by_column(mapping_id, click_event::Column::OsName)
            .await
    }

    pub async fn count_by_referer(&self, mapping_id: i64) -> Result<BTreeMap<String, i64>> {
        self.count_by_column(mapping_id, click_event::Column::Referer)
            .await
    }

    /// 自 since 起按日（UTC）聚合的点击数
    ///
    /// 日期截断在各数据库方言不一致，这里取回时间戳在进程内聚合，
    /// 查询范围由 clicked_at 索引约束。
    pub async fn count_by_day(
        &self,
        mapping_id: i64,
        since: DateTime<Utc>,
    ) -> Result<BTreeMap<String, i64>> {
        let timestamps: Vec<DateTime<Utc>> = click_event::Entity::find()
            .select_only()
            .column(click_event::Column::ClickedAt)
            .filter(click_event::Column::UrlMappingId.eq(mapping_id))
            .filter(click_event::Column::ClickedAt.gte(since))
            .order_by_asc(click_event::Column::ClickedAt)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut days: BTreeMap<String, i64> = BTreeMap::new();
        for ts in timestamps {
            *days.entry(ts.format("%Y-%m-%d").to_string()).or_insert(0) += 1;
        }
        Ok(days)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
