use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per (alert, channel, recipient) send attempt, created whether or
/// not the carrier accepted the send. `status_current` advances along the
/// forward-only delivery lattice.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "notification_results")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub alert_id: Uuid,
    pub channel: String,
    pub recipient_kind: String,
    pub contact_id: Option<i32>,
    /// Phone number, WhatsApp address or email the send targeted.
    pub endpoint: String,
    /// Carrier message/call SID, correlates inbound status callbacks.
    pub provider_sid: Option<String>,
    pub status_current: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::alert::Entity",
        from = "Column::AlertId",
        to = "super::alert::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Alert,
}

impl Related<super::alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alert.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
