pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_organizations;
mod m20260301_000002_create_lessons;
mod m20260301_000003_create_finance;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_organizations::Migration),
            Box::new(m20260301_000002_create_lessons::Migration),
            Box::new(m20260301_000003_create_finance::Migration),
        ]
    }
}
