use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UsageEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UsageEvents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UsageEvents::TenantId).uuid().not_null())
                    .col(ColumnDef::new(UsageEvents::Meter).string().not_null())
                    .col(
                        ColumnDef::new(UsageEvents::IdempotencyKey)
                            .string()
                            .unique_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageEvents::Quantity)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageEvents::RecordedAt)
                            .date_time()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usage_events_tenant_meter")
                    .table(UsageEvents::Table)
                    .col(UsageEvents::TenantId)
                    .col(UsageEvents::Meter)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DomainEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DomainEvents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DomainEvents::TenantId).uuid().not_null())
                    .col(ColumnDef::new(DomainEvents::AlertId).uuid())
                    .col(ColumnDef::new(DomainEvents::EventType).string().not_null())
                    .col(ColumnDef::new(DomainEvents::Payload).json().not_null())
                    .col(
                        ColumnDef::new(DomainEvents::CreatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_domain_events_alert_id")
                    .table(DomainEvents::Table)
                    .col(DomainEvents::AlertId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DomainEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UsageEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UsageEvents {
    Table,
    Id,
    TenantId,
    Meter,
    IdempotencyKey,
    Quantity,
    RecordedAt,
}

#[derive(DeriveIden)]
enum DomainEvents {
    Table,
    Id,
    TenantId,
    AlertId,
    EventType,
    Payload,
    CreatedAt,
}
