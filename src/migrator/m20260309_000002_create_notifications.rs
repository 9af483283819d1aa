use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationResults::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NotificationResults::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationResults::AlertId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationResults::Channel)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationResults::RecipientKind)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(NotificationResults::ContactId).integer())
                    .col(
                        ColumnDef::new(NotificationResults::Endpoint)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(NotificationResults::ProviderSid).string())
                    .col(
                        ColumnDef::new(NotificationResults::StatusCurrent)
                            .string()
                            .default("queued")
                            .not_null(),
                    )
                    .col(ColumnDef::new(NotificationResults::ErrorMessage).text())
                    .col(
                        ColumnDef::new(NotificationResults::CreatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationResults::UpdatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_results_alert")
                            .from(NotificationResults::Table, NotificationResults::AlertId)
                            .to(Alerts::Table, Alerts::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_results_alert_id")
                    .table(NotificationResults::Table)
                    .col(NotificationResults::AlertId)
                    .to_owned(),
            )
            .await?;

        // Carrier callbacks look rows up by SID.
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_results_provider_sid")
                    .table(NotificationResults::Table)
                    .col(NotificationResults::ProviderSid)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NotificationDeliveryEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationDeliveryEvents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NotificationDeliveryEvents::NotificationResultId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationDeliveryEvents::ProviderStatus)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationDeliveryEvents::Raw)
                            .json()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationDeliveryEvents::ReceivedAt)
                            .date_time()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_delivery_events_result")
                            .from(
                                NotificationDeliveryEvents::Table,
                                NotificationDeliveryEvents::NotificationResultId,
                            )
                            .to(NotificationResults::Table, NotificationResults::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(NotificationDeliveryEvents::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(NotificationResults::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum NotificationResults {
    Table,
    Id,
    TenantId,
    AlertId,
    Channel,
    RecipientKind,
    ContactId,
    Endpoint,
    ProviderSid,
    StatusCurrent,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum NotificationDeliveryEvents {
    Table,
    Id,
    NotificationResultId,
    ProviderStatus,
    Raw,
    ReceivedAt,
}

#[derive(DeriveIden)]
enum Alerts {
    Table,
    Id,
}
