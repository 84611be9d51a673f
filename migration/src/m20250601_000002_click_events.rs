use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ClickEvent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClickEvent::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ClickEvent::UrlMappingId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickEvent::ClickedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickEvent::ClientIp)
                            .string_len(45)
                            .null(),
                    )
                    .col(ColumnDef::new(ClickEvent::UserAgent).text().null())
                    .col(ColumnDef::new(ClickEvent::Referer).text().null())
                    .col(ColumnDef::new(ClickEvent::BrowserName).string().null())
                    .col(ColumnDef::new(ClickEvent::BrowserVersion).string().null())
                    .col(ColumnDef::new(ClickEvent::OsName).string().null())
                    .col(ColumnDef::new(ClickEvent::OsVersion).string().null())
                    .col(ColumnDef::new(ClickEvent::DeviceType).string().null())
                    .col(
                        ColumnDef::new(ClickEvent::CountryCode)
                            .string_len(2)
                            .null(),
                    )
                    .col(ColumnDef::new(ClickEvent::CountryName).string().null())
                    .col(ColumnDef::new(ClickEvent::City).string().null())
                    .col(ColumnDef::new(ClickEvent::Region).string().null())
                    .col(ColumnDef::new(ClickEvent::Timezone).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_mapping")
                    .table(ClickEvent::Table)
                    .col(ClickEvent::UrlMappingId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_clicked_at")
                    .table(ClickEvent::Table)
                    .col(ClickEvent::ClickedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_country")
                    .table(ClickEvent::Table)
                    .col(ClickEvent::CountryCode)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_device")
                    .table(ClickEvent::Table)
                    .col(ClickEvent::DeviceType)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_click_events_device").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_click_events_country").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_click_events_clicked_at").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_click_events_mapping").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ClickEvent::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ClickEvent {
    #[sea_orm(iden = "click_events")]
    Table,
    Id,
    UrlMappingId,
    ClickedAt,
    ClientIp,
    UserAgent,
    Referer,
    BrowserName,
    BrowserVersion,
    OsName,
    OsVersion,
    DeviceType,
    CountryCode,
    CountryName,
    City,
    Region,
    Timezone,
}
