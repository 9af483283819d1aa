use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alerts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alerts::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Alerts::SignalId).uuid().not_null())
                    .col(
                        ColumnDef::new(Alerts::Status)
                            .string()
                            .default("pending")
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alerts::Verdict).string())
                    .col(ColumnDef::new(Alerts::Likelihood).string())
                    .col(ColumnDef::new(Alerts::Confidence).double())
                    .col(
                        ColumnDef::new(Alerts::Severity)
                            .string()
                            .default("info")
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alerts::AttentionState)
                            .string()
                            .default("none")
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alerts::NotificationStatus)
                            .string()
                            .default("none")
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alerts::HumanMessage).text())
                    .col(ColumnDef::new(Alerts::FailureReason).text())
                    .col(ColumnDef::new(Alerts::AcknowledgeBy).date_time())
                    .col(ColumnDef::new(Alerts::AcknowledgedAt).date_time())
                    .col(ColumnDef::new(Alerts::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(Alerts::UpdatedAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alerts_tenant")
                            .from(Alerts::Table, Alerts::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alerts_signal")
                            .from(Alerts::Table, Alerts::SignalId)
                            .to(Signals::Table, Signals::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_alerts_tenant_status")
                    .table(Alerts::Table)
                    .col(Alerts::TenantId)
                    .col(Alerts::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_alerts_acknowledge_by")
                    .table(Alerts::Table)
                    .col(Alerts::AcknowledgeBy)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AlertAi::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AlertAi::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AlertAi::AlertId)
                            .uuid()
                            .unique_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AlertAi::TenantId).uuid().not_null())
                    .col(
                        ColumnDef::new(AlertAi::InvestigationCount)
                            .integer()
                            .default(0)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AlertAi::NextCheckMinutes).integer())
                    .col(ColumnDef::new(AlertAi::Assessment).json_binary())
                    .col(
                        ColumnDef::new(AlertAi::InvestigationHistory)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AlertAi::AiActions).json_binary())
                    .col(ColumnDef::new(AlertAi::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(AlertAi::UpdatedAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alert_ai_alert")
                            .from(AlertAi::Table, AlertAi::AlertId)
                            .to(Alerts::Table, Alerts::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AlertMetrics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AlertMetrics::AlertId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AlertMetrics::TenantId).uuid().not_null())
                    .col(
                        ColumnDef::new(AlertMetrics::PipelineMs)
                            .big_integer()
                            .default(0)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertMetrics::TotalTokens)
                            .big_integer()
                            .default(0)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertMetrics::CostEstimate)
                            .double()
                            .default(0.0)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertMetrics::UpdatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alert_metrics_alert")
                            .from(AlertMetrics::Table, AlertMetrics::AlertId)
                            .to(Alerts::Table, Alerts::Id)
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
            .drop_table(Table::drop().table(AlertMetrics::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AlertAi::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Alerts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Alerts {
    Table,
    Id,
    TenantId,
    SignalId,
    Status,
    Verdict,
    Likelihood,
    Confidence,
    Severity,
    AttentionState,
    NotificationStatus,
    HumanMessage,
    FailureReason,
    AcknowledgeBy,
    AcknowledgedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AlertAi {
    Table,
    Id,
    AlertId,
    TenantId,
    InvestigationCount,
    NextCheckMinutes,
    Assessment,
    InvestigationHistory,
    AiActions,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AlertMetrics {
    Table,
    AlertId,
    TenantId,
    PipelineMs,
    TotalTokens,
    CostEstimate,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Signals {
    Table,
    Id,
}
