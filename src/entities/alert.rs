use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Mutable lifecycle record for one signal.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub signal_id: Uuid,
    /// See `AlertStatus`.
    pub status: String,
    pub verdict: Option<String>,
    pub likelihood: Option<String>,
    /// AI confidence in [0, 1].
    pub confidence: Option<f64>,
    /// "info", "warning" or "critical".
    pub severity: String,
    pub attention_state: String,
    pub notification_status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub human_message: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub failure_reason: Option<String>,
    /// Acknowledgement SLA deadline, stamped by the attention engine.
    pub acknowledge_by: Option<DateTime>,
    pub acknowledged_at: Option<DateTime>,
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
    #[sea_orm(
        belongs_to = "super::signal::Entity",
        from = "Column::SignalId",
        to = "super::signal::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Signal,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::signal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Signal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStatus {
    Pending,
    Investigating,
    Completed,
    Failed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Investigating => "investigating",
            AlertStatus::Completed => "completed",
            AlertStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AlertStatus::Pending),
            "investigating" => Some(AlertStatus::Investigating),
            "completed" => Some(AlertStatus::Completed),
            "failed" => Some(AlertStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Completed | AlertStatus::Failed)
    }

    /// The lifecycle lattice. `failed` is reachable from anywhere
    /// non-terminal; nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (AlertStatus::Pending, AlertStatus::Investigating)
            | (AlertStatus::Pending, AlertStatus::Completed)
            | (AlertStatus::Investigating, AlertStatus::Investigating)
            | (AlertStatus::Investigating, AlertStatus::Completed) => true,
            (_, AlertStatus::Failed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionState {
    None,
    Pending,
    Escalated,
    Acknowledged,
}

impl AttentionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionState::None => "none",
            AttentionState::Pending => "pending",
            AttentionState::Escalated => "escalated",
            AttentionState::Acknowledged => "acknowledged",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    None,
    Dispatched,
    Escalated,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::None => "none",
            NotificationStatus::Dispatched => "dispatched",
            NotificationStatus::Escalated => "escalated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lattice_forward_only() {
        use AlertStatus::*;

        assert!(Pending.can_transition_to(Investigating));
        assert!(Pending.can_transition_to(Completed));
        assert!(Investigating.can_transition_to(Investigating));
        assert!(Investigating.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Investigating.can_transition_to(Failed));

        // no regressions out of terminal states
        assert!(!Completed.can_transition_to(Investigating));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Completed));

        // no backwards motion into pending
        assert!(!Investigating.can_transition_to(Pending));
    }

    #[test]
    fn status_round_trips() {
        for s in [
            AlertStatus::Pending,
            AlertStatus::Investigating,
            AlertStatus::Completed,
            AlertStatus::Failed,
        ] {
            assert_eq!(AlertStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(AlertStatus::parse("bogus"), None);
    }
}
