use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 url_mappings 表
        manager
            .create_table(
                Table::create()
                    .table(UrlMapping::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UrlMapping::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UrlMapping::ShortKey).string().null())
                    .col(ColumnDef::new(UrlMapping::Alias).string().null())
                    .col(ColumnDef::new(UrlMapping::OriginalUrl).text().not_null())
                    .col(
                        ColumnDef::new(UrlMapping::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UrlMapping::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UrlMapping::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(UrlMapping::ClickCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(UrlMapping::PasswordHash).string().null())
                    .col(ColumnDef::new(UrlMapping::MetaTitle).text().null())
                    .col(ColumnDef::new(UrlMapping::MetaDescription).text().null())
                    .col(ColumnDef::new(UrlMapping::MetaImageUrl).text().null())
                    .col(ColumnDef::new(UrlMapping::MetaFaviconUrl).text().null())
                    .col(
                        ColumnDef::new(UrlMapping::MetaFetchedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(UrlMapping::AiSummary).text().null())
                    .col(ColumnDef::new(UrlMapping::AiCategory).string().null())
                    .col(ColumnDef::new(UrlMapping::AiTags).text().null())
                    .col(ColumnDef::new(UrlMapping::AiSafetyScore).double().null())
                    .col(
                        ColumnDef::new(UrlMapping::AiAnalyzedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 短键与别名共享一个全局命名空间，两个唯一索引共同保证
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_mappings_short_key")
                    .table(UrlMapping::Table)
                    .col(UrlMapping::ShortKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_mappings_alias")
                    .table(UrlMapping::Table)
                    .col(UrlMapping::Alias)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_mappings_active_created")
                    .table(UrlMapping::Table)
                    .col(UrlMapping::IsActive)
                    .col(UrlMapping::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_mappings_ai_category")
                    .table(UrlMapping::Table)
                    .col(UrlMapping::AiCategory)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_url_mappings_ai_category").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_url_mappings_active_created")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx_url_mappings_alias").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_url_mappings_short_key").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UrlMapping::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UrlMapping {
    #[sea_orm(iden = "url_mappings")]
    Table,
    Id,
    ShortKey,
    Alias,
    OriginalUrl,
    CreatedAt,
    ExpiresAt,
    IsActive,
    ClickCount,
    PasswordHash,
    MetaTitle,
    MetaDescription,
    MetaImageUrl,
    MetaFaviconUrl,
    MetaFetchedAt,
    AiSummary,
    AiCategory,
    AiTags,
    AiSafetyScore,
    AiAnalyzedAt,
}
