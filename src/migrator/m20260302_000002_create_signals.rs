use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Signals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Signals::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Signals::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Signals::VehicleId).string().not_null())
                    .col(ColumnDef::new(Signals::DriverId).string())
                    .col(ColumnDef::new(Signals::Kind).string().not_null())
                    .col(ColumnDef::new(Signals::Description).text().not_null())
                    .col(ColumnDef::new(Signals::OccurredAt).date_time().not_null())
                    .col(ColumnDef::new(Signals::Raw).json().not_null())
                    .col(ColumnDef::new(Signals::CreatedAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_signals_tenant")
                            .from(Signals::Table, Signals::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_signals_tenant_id")
                    .table(Signals::Table)
                    .col(Signals::TenantId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_signals_vehicle_occurred")
                    .table(Signals::Table)
                    .col(Signals::VehicleId)
                    .col(Signals::OccurredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Signals::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Signals {
    Table,
    Id,
    TenantId,
    VehicleId,
    DriverId,
    Kind,
    Description,
    OccurredAt,
    Raw,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}
