use sea_orm_migration::prelude::*;

mod m20260302_000001_create_tenants;
mod m20260302_000002_create_signals;
mod m20260302_000003_create_alerts;
mod m20260309_000001_create_contacts;
mod m20260309_000002_create_notifications;
mod m20260316_000001_create_billing_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260302_000001_create_tenants::Migration),
            Box::new(m20260302_000002_create_signals::Migration),
            Box::new(m20260302_000003_create_alerts::Migration),
            Box::new(m20260309_000001_create_contacts::Migration),
            Box::new(m20260309_000002_create_notifications::Migration),
            Box::new(m20260316_000001_create_billing_tables::Migration),
        ]
    }
}
