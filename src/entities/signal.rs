use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Raw ingested telemetry event. Immutable after creation, except for
/// description normalization which replaces a generic provider placeholder
/// with the resolved behavior label.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "signals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub vehicle_id: String,
    pub driver_id: Option<String>,
    /// "safety_event" or "panic_button".
    pub kind: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub occurred_at: DateTime,
    pub raw: Json,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Tenant,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    SafetyEvent,
    PanicButton,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::SafetyEvent => "safety_event",
            SignalKind::PanicButton => "panic_button",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "safety_event" => Some(SignalKind::SafetyEvent),
            "panic_button" => Some(SignalKind::PanicButton),
            _ => None,
        }
    }
}
