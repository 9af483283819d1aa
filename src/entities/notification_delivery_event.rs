use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only log of carrier webhook callbacks, one row per callback,
/// including stale ones the lattice rejected.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "notification_delivery_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub notification_result_id: Uuid,
    pub provider_status: String,
    pub raw: Json,
    pub received_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::notification_result::Entity",
        from = "Column::NotificationResultId",
        to = "super::notification_result::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    NotificationResult,
}

impl Related<super::notification_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NotificationResult.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
