use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AiAnnotation::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AiAnnotation::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AiAnnotation::UrlHash)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AiAnnotation::OriginalUrl).text().not_null())
                    .col(ColumnDef::new(AiAnnotation::Summary).text().null())
                    .col(ColumnDef::new(AiAnnotation::Category).string().null())
                    .col(ColumnDef::new(AiAnnotation::Tags).text().null())
                    .col(ColumnDef::new(AiAnnotation::SafetyScore).double().null())
                    .col(
                        ColumnDef::new(AiAnnotation::IsSafe)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(AiAnnotation::SafetyReasons).text().null())
                    .col(
                        ColumnDef::new(AiAnnotation::AnalyzedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AiAnnotation::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ai_annotations_url_hash")
                    .table(AiAnnotation::Table)
                    .col(AiAnnotation::UrlHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ai_annotations_expires_at")
                    .table(AiAnnotation::Table)
                    .col(AiAnnotation::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_ai_annotations_expires_at").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_ai_annotations_url_hash").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AiAnnotation::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AiAnnotation {
    #[sea_orm(iden = "ai_annotations")]
    Table,
    Id,
    UrlHash,
    OriginalUrl,
    Summary,
    Category,
    Tags,
    SafetyScore,
    IsSafe,
    SafetyReasons,
    AnalyzedAt,
    ExpiresAt,
}
