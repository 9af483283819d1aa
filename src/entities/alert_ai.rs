use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-alert investigation record. `investigation_count` only ever grows;
/// `investigation_history` is append-only.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "alert_ai")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub alert_id: Uuid,
    pub tenant_id: Uuid,
    pub investigation_count: i32,
    pub next_check_minutes: Option<i32>,
    /// Latest assessment snapshot as returned by the AI.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub assessment: Option<serde_json::Value>,
    /// Append-only array of assessment snapshots, one per pass.
    #[sea_orm(column_type = "JsonBinary")]
    pub investigation_history: serde_json::Value,
    /// Recommended actions, investigation steps, camera analysis.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub ai_actions: Option<serde_json::Value>,
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
