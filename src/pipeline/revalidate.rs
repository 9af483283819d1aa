use crate::billing::events::EVENT_COMPLETED;
use crate::billing::METER_ALERTS_PROCESSED;
use crate::entities::alert::AlertStatus;
use crate::entities::{alert, alert_ai, signal};
use crate::error::{PipelineError, Result};
use crate::notifications::resolver::load_active_contacts;
use crate::pipeline::process::{build_payload, Pass};
use crate::pipeline::{preload, AlertProcessor, RevalidateRequest, MAX_INVESTIGATIONS, VERDICT_NEEDS_REVIEW};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;
use std::time::Instant;
use tracing::{info, warn};

pub enum RevalidationOutcome {
    /// The alert left `investigating` before the recheck fired; the stale
    /// dispatch is dropped. This is the cancellation mechanism.
    Skipped,
    /// Investigation budget exhausted; completed as `needs_review` with no
    /// AI call.
    Exhausted,
    Applied(AlertStatus),
}

impl AlertProcessor {
    pub async fn revalidate(&self, request: RevalidateRequest) -> Result<()> {
        let started = Instant::now();
        match self.run_revalidation(&request, started).await {
            Ok(RevalidationOutcome::Skipped) => Ok(()),
            Ok(RevalidationOutcome::Exhausted) => {
                crate::metrics::increment_revalidations("exhausted");
                Ok(())
            }
            Ok(RevalidationOutcome::Applied(status)) => {
                crate::metrics::increment_revalidations(status.as_str());
                Ok(())
            }
            Err(err) => {
                crate::metrics::increment_revalidations("error");
                self.fail_alert(request.alert_id, request.tenant_id, &err).await;
                Err(err)
            }
        }
    }

    async fn run_revalidation(
        &self,
        request: &RevalidateRequest,
        started: Instant,
    ) -> Result<RevalidationOutcome> {
        let alert = self.load_alert(request.alert_id, request.tenant_id).await?;

        // By the time a delayed dispatch fires, the world may have moved
        // on. Only an alert still under monitoring proceeds; everything
        // else is a silent no-op with zero external calls.
        if AlertStatus::parse(&alert.status) != Some(AlertStatus::Investigating) {
            info!(
                "Dropping stale revalidation for alert {} in status {}",
                alert.id, alert.status
            );
            return Ok(RevalidationOutcome::Skipped);
        }

        let settings = self.load_settings(request.tenant_id).await?;
        let api_key = settings.require_ai_api_key()?.to_string();

        let record = alert_ai::Entity::find()
            .filter(alert_ai::Column::AlertId.eq(alert.id))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                PipelineError::Validation(format!("alert {} has no investigation record", alert.id))
            })?;

        if record.investigation_count >= MAX_INVESTIGATIONS {
            return self.give_up_monitoring(alert, &settings).await;
        }

        let signal = signal::Entity::find_by_id(alert.signal_id)
            .filter(signal::Column::TenantId.eq(request.tenant_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                PipelineError::Validation(format!("alert {} has no signal row", alert.id))
            })?;

        let cursor_scope = format!("alert:{}", alert.id);
        let since = match self.cursors.last_sync(request.tenant_id, &cursor_scope).await {
            Ok(Some(at)) => at,
            Ok(None) => alert.created_at.and_utc(),
            Err(e) => {
                warn!("Sync cursor read failed, falling back to alert start: {}", e);
                alert.created_at.and_utc()
            }
        };

        let context = preload::load_incremental(
            self.provider.as_ref(),
            settings.provider_api_token.as_deref(),
            &signal,
            since,
        )
        .await;

        if let Err(e) = self
            .cursors
            .record_sync(request.tenant_id, &cursor_scope, Utc::now())
            .await
        {
            warn!("Sync cursor write failed: {}", e);
        }

        let contacts = load_active_contacts(&self.db, request.tenant_id).await?;
        let payload = build_payload(
            request.tenant_id,
            &settings,
            &signal,
            &context,
            &contacts,
            Some((&record.investigation_history, record.investigation_count)),
        );
        let decision = self.ai.revalidate(&api_key, payload).await?;

        let status = self
            .apply_decision(
                alert,
                &signal,
                &settings,
                &contacts,
                decision,
                Pass::Revalidation {
                    prior_count: record.investigation_count,
                },
                started,
            )
            .await?;
        Ok(RevalidationOutcome::Applied(status))
    }

    /// The monitoring budget is spent: settle the alert for a human to
    /// review instead of asking the AI again.
    async fn give_up_monitoring(
        &self,
        alert: alert::Model,
        settings: &crate::config::TenantSettings,
    ) -> Result<RevalidationOutcome> {
        let now = Utc::now().naive_utc();
        let usage = self.usage_for(settings);
        let events = self.events_for(settings);

        let mut active: alert::ActiveModel = alert.clone().into();
        active.status = Set(AlertStatus::Completed.as_str().to_string());
        active.verdict = Set(Some(VERDICT_NEEDS_REVIEW.to_string()));
        active.updated_at = Set(now);
        let updated = active.update(&self.db).await?;

        info!(
            "Alert {} exhausted {} investigations, completing as {}",
            updated.id, MAX_INVESTIGATIONS, VERDICT_NEEDS_REVIEW
        );

        if let Err(e) = events
            .emit(
                updated.tenant_id,
                Some(updated.id),
                EVENT_COMPLETED,
                json!({
                    "verdict": VERDICT_NEEDS_REVIEW,
                    "reason": "max investigations reached",
                }),
            )
            .await
        {
            warn!("Failed to record completed event: {}", e);
        }

        if let Err(e) = usage
            .record(
                updated.tenant_id,
                METER_ALERTS_PROCESSED,
                &updated.id.to_string(),
                1,
            )
            .await
        {
            warn!("Failed to record processed-count usage: {}", e);
        }

        Ok(RevalidationOutcome::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    fn request() -> RevalidateRequest {
        RevalidateRequest {
            alert_id: ALERT,
            tenant_id: TENANT,
        }
    }

    #[tokio::test]
    async fn stale_dispatch_for_settled_alert_is_dropped() {
        // The alert completed before the delayed dispatch fired.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![make_alert("completed", "warning")]])
            .into_connection();
        let (processor, fakes) = test_processor(db, json!({}));

        processor.revalidate(request()).await.unwrap();

        assert_eq!(fakes.ai.total_calls(), 0);
        assert!(fakes.carrier.sends.lock().unwrap().is_empty());
        assert!(fakes.events.types().is_empty());
    }

    #[tokio::test]
    async fn pending_alert_is_not_revalidated() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![make_alert("pending", "warning")]])
            .into_connection();
        let (processor, fakes) = test_processor(db, json!({}));

        processor.revalidate(request()).await.unwrap();
        assert_eq!(fakes.ai.total_calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_budget_completes_as_needs_review_without_ai() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![make_alert("investigating", "warning")]])
            .append_query_results([vec![make_tenant(json!({ "ai_api_key": "sk-tenant" }))]])
            .append_query_results([vec![make_alert_ai(MAX_INVESTIGATIONS)]])
            .append_query_results([vec![make_alert("completed", "warning")]])
            .into_connection();
        let (processor, fakes) = test_processor(db, json!({}));

        processor.revalidate(request()).await.unwrap();

        assert_eq!(fakes.ai.total_calls(), 0);

        let events = fakes.events.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "completed");
        assert_eq!(events[0].1["verdict"], VERDICT_NEEDS_REVIEW);

        let usage = fakes.usage.records.lock().unwrap();
        assert!(usage
            .iter()
            .any(|(meter, entity, qty)| meter == "alerts_processed"
                && entity == &ALERT.to_string()
                && *qty == 1));
    }
}
