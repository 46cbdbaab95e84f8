//! Database migrations for the notifier service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_12_01_000001_create_notifications;
mod m2025_12_01_000002_create_user_settings;
mod m2025_12_01_000003_create_validation_codes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_12_01_000001_create_notifications::Migration),
            Box::new(m2025_12_01_000002_create_user_settings::Migration),
            Box::new(m2025_12_01_000003_create_validation_codes::Migration),
        ]
    }
}
