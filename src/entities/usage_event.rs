use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Billing meter row. The unique `idempotency_key` makes redelivered jobs
/// record at most once per (tenant, meter, entity).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "usage_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tenant_id: Uuid,
    pub meter: String,
    #[sea_orm(unique)]
    pub idempotency_key: String,
    pub quantity: i64,
    pub recorded_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
