use crate::billing::events::{DomainEventSink, EVENT_ATTENTION_ESCALATED};
use crate::config::AttentionConfig;
use crate::entities::alert;
use crate::entities::alert::AttentionState;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Duration;
use futures::future::join_all;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{info, warn};

/// Acknowledgement-SLA subsystem. The no-op implementation serves tenants
/// (or deployments) with the feature off; selection happens at composition
/// time. Callers must swallow init errors: a broken SLA hook may never
/// fail an alert.
#[async_trait]
pub trait AttentionEngine: Send + Sync {
    /// Stamp the acknowledgement deadline on an alert that just reached
    /// `completed` or `investigating`.
    async fn init_for_alert(
        &self,
        alert: &alert::Model,
        signal_kind: &str,
        config: &AttentionConfig,
    ) -> Result<()>;

    /// Scan for alerts past their unacknowledged deadline and escalate
    /// them. Stateless between runs; returns the number escalated.
    async fn sweep(&self) -> Result<u64>;
}

/// Whether the SLA applies to this alert at all.
pub fn should_initialize(config: &AttentionConfig, severity: &str, signal_kind: &str) -> bool {
    if !config.enabled {
        return false;
    }
    signal_kind == "panic_button" || config.severities.iter().any(|s| s == severity)
}

pub struct NoopAttention;

#[async_trait]
impl AttentionEngine for NoopAttention {
    async fn init_for_alert(&self, _: &alert::Model, _: &str, _: &AttentionConfig) -> Result<()> {
        Ok(())
    }

    async fn sweep(&self) -> Result<u64> {
        Ok(0)
    }
}

pub struct SlaAttention {
    db: DatabaseConnection,
    events: Arc<dyn DomainEventSink>,
}

impl SlaAttention {
    pub fn new(db: DatabaseConnection, events: Arc<dyn DomainEventSink>) -> Self {
        Self { db, events }
    }

    async fn escalate_one(&self, overdue: alert::Model) -> bool {
        let mut active: alert::ActiveModel = overdue.clone().into();
        active.attention_state = Set(AttentionState::Escalated.as_str().to_string());
        active.updated_at = Set(chrono::Utc::now().naive_utc());

        if let Err(e) = active.update(&self.db).await {
            warn!("Failed to escalate attention for alert {}: {}", overdue.id, e);
            return false;
        }

        if let Err(e) = self
            .events
            .emit(
                overdue.tenant_id,
                Some(overdue.id),
                EVENT_ATTENTION_ESCALATED,
                serde_json::json!({
                    "acknowledge_by": overdue.acknowledge_by,
                    "severity": overdue.severity,
                }),
            )
            .await
        {
            warn!("Failed to audit attention escalation: {}", e);
        }
        true
    }
}

#[async_trait]
impl AttentionEngine for SlaAttention {
    async fn init_for_alert(
        &self,
        alert: &alert::Model,
        signal_kind: &str,
        config: &AttentionConfig,
    ) -> Result<()> {
        if !should_initialize(config, &alert.severity, signal_kind) {
            return Ok(());
        }

        let deadline =
            chrono::Utc::now().naive_utc() + Duration::minutes(config.ack_deadline_minutes);
        let mut active: alert::ActiveModel = alert.clone().into();
        active.acknowledge_by = Set(Some(deadline));
        active.attention_state = Set(AttentionState::Pending.as_str().to_string());
        active.updated_at = Set(chrono::Utc::now().naive_utc());
        active.update(&self.db).await?;

        info!(
            "Acknowledgement SLA armed for alert {} (deadline {})",
            alert.id, deadline
        );
        Ok(())
    }

    async fn sweep(&self) -> Result<u64> {
        let now = chrono::Utc::now().naive_utc();
        // Only attention/SLA columns are touched here, so this is safe to
        // run alongside per-alert processing tasks.
        let overdue = alert::Entity::find()
            .filter(alert::Column::AcknowledgeBy.lte(now))
            .filter(alert::Column::AcknowledgedAt.is_null())
            .filter(alert::Column::AttentionState.eq(AttentionState::Pending.as_str()))
            .all(&self.db)
            .await?;

        if overdue.is_empty() {
            return Ok(0);
        }

        let escalated = join_all(overdue.into_iter().map(|a| self.escalate_one(a)))
            .await
            .into_iter()
            .filter(|ok| *ok)
            .count() as u64;

        if escalated > 0 {
            crate::metrics::increment_attention_escalations(escalated);
            info!("Attention sweep escalated {} overdue alerts", escalated);
        }
        Ok(escalated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, severities: &[&str]) -> AttentionConfig {
        AttentionConfig {
            enabled,
            ack_deadline_minutes: 15,
            severities: severities.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn disabled_feature_never_initializes() {
        assert!(!should_initialize(
            &config(false, &["critical"]),
            "critical",
            "panic_button"
        ));
    }

    #[test]
    fn severity_gate_applies() {
        let cfg = config(true, &["critical"]);
        assert!(should_initialize(&cfg, "critical", "safety_event"));
        assert!(!should_initialize(&cfg, "warning", "safety_event"));
    }

    #[test]
    fn panic_signals_bypass_severity_gate() {
        let cfg = config(true, &["critical"]);
        assert!(should_initialize(&cfg, "info", "panic_button"));
    }
}
