use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tenant-scoped notification recipient. `contact_type` is one of the
/// recipient-type tokens ("operator", "monitoring_team", "supervisor",
/// "emergency", "dispatch"); operators may be tied to a vehicle or driver.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "contacts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tenant_id: Uuid,
    pub contact_type: String,
    pub name: String,
    pub phone: Option<String>,
    /// WhatsApp address when it differs from `phone`.
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub priority: i32,
    pub is_default: bool,
    pub is_active: bool,
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
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
