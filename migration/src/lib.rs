pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20250601_000001_url_mappings;
mod m20250601_000002_click_events;
mod m20250601_000003_ai_annotations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_url_mappings::Migration),
            Box::new(m20250601_000002_click_events::Migration),
            Box::new(m20250601_000003_ai_annotations::Migration),
        ]
    }
}
