use crate::ai::AiDecision;
use crate::billing::{METER_AI_TOKENS, METER_ALERTS_PROCESSED};
use crate::billing::events::{
    EVENT_COMPLETED, EVENT_INVESTIGATING, EVENT_PROCESSING_FAILED, EVENT_PROCESSING_STARTED,
};
use crate::config::TenantSettings;
use crate::entities::alert::{AlertStatus, NotificationStatus, Severity};
use crate::entities::signal::SignalKind;
use crate::entities::{alert, alert_ai, alert_metrics, contact, signal, tenant};
use crate::error::{PipelineError, Result};
use crate::notifications::dispatcher::{dispatch, panic_escalation, plan_dispatches};
use crate::notifications::resolver::load_active_contacts;
use crate::pipeline::{media, preload, AlertProcessor, ProcessAlertRequest};
use crate::provider::labels;
use crate::provider::TimeWindow;
use crate::queue::{self, AlertJob};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::{json, Value};
use std::env;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

pub enum ProcessOutcome {
    /// Guard tripped: nothing read from or written to any collaborator.
    Skipped,
    Applied(AlertStatus),
}

/// Which investigation pass a decision belongs to; drives the
/// investigation counter and the token-meter idempotency entity.
pub(crate) enum Pass {
    Initial,
    Revalidation { prior_count: i32 },
}

impl Pass {
    fn investigation_count(&self, existing: i32) -> i32 {
        match self {
            Pass::Initial => existing,
            Pass::Revalidation { prior_count } => (prior_count + 1).max(existing),
        }
    }

    fn token_entity(&self, alert_id: Uuid) -> String {
        match self {
            Pass::Initial => alert_id.to_string(),
            Pass::Revalidation { prior_count } => format!("{}:p{}", alert_id, prior_count + 1),
        }
    }
}

impl AlertProcessor {
    /// Single-attempt top-level task. Errors are not retried by the queue;
    /// they land in the deterministic failure handler instead.
    pub async fn process(&self, request: ProcessAlertRequest) -> Result<()> {
        let started = Instant::now();
        match self.run_initial(&request, started).await {
            Ok(ProcessOutcome::Skipped) => Ok(()),
            Ok(ProcessOutcome::Applied(status)) => {
                crate::metrics::increment_alerts_processed(status.as_str());
                crate::metrics::record_pipeline_duration(
                    started.elapsed().as_secs_f64(),
                    status.as_str(),
                );
                Ok(())
            }
            Err(err) => {
                crate::metrics::increment_alerts_processed("error");
                crate::metrics::record_pipeline_duration(started.elapsed().as_secs_f64(), "error");
                self.fail_alert(request.alert_id, request.tenant_id, &err).await;
                Err(err)
            }
        }
    }

    async fn run_initial(
        &self,
        request: &ProcessAlertRequest,
        started: Instant,
    ) -> Result<ProcessOutcome> {
        let alert = self.load_alert(request.alert_id, request.tenant_id).await?;

        let Some(status) = AlertStatus::parse(&alert.status) else {
            warn!("Alert {} has unknown status '{}'", alert.id, alert.status);
            return Ok(ProcessOutcome::Skipped);
        };
        // Duplicate queue delivery guard: anything already picked up or
        // settled is left alone, with zero external calls.
        if status != AlertStatus::Pending {
            info!(
                "Skipping alert {} in status {}",
                alert.id,
                status.as_str()
            );
            return Ok(ProcessOutcome::Skipped);
        }

        let settings = self.load_settings(request.tenant_id).await?;
        let api_key = settings.require_ai_api_key()?.to_string();

        let signal = signal::Entity::find_by_id(alert.signal_id)
            .filter(signal::Column::TenantId.eq(request.tenant_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                PipelineError::Validation(format!("alert {} has no signal row", alert.id))
            })?;

        let events = self.events_for(&settings);
        if let Err(e) = events
            .emit(
                request.tenant_id,
                Some(alert.id),
                EVENT_PROCESSING_STARTED,
                json!({ "signal_id": signal.id, "kind": signal.kind }),
            )
            .await
        {
            warn!("Failed to record processing_started event: {}", e);
        }

        let signal = self.normalize_description(signal, &settings).await;

        let context = preload::load_context(
            self.provider.as_ref(),
            settings.provider_api_token.as_deref(),
            &signal,
        )
        .await;

        let contacts = load_active_contacts(&self.db, request.tenant_id).await?;

        let payload = build_payload(request.tenant_id, &settings, &signal, &context, &contacts, None);
        let decision = self.ai.ingest(&api_key, payload).await?;

        let status = self
            .apply_decision(alert, &signal, &settings, &contacts, decision, Pass::Initial, started)
            .await?;
        Ok(ProcessOutcome::Applied(status))
    }

    pub(crate) async fn load_alert(&self, alert_id: Uuid, tenant_id: Uuid) -> Result<alert::Model> {
        // Tenant scoping on every lookup: a job with the wrong tenant id
        // resolves to nothing rather than to another tenant's alert.
        alert::Entity::find_by_id(alert_id)
            .filter(alert::Column::TenantId.eq(tenant_id))
            .one(&self.db)
            .await?
            .ok_or(PipelineError::AlertNotFound(alert_id))
    }

    pub(crate) async fn load_settings(&self, tenant_id: Uuid) -> Result<TenantSettings> {
        let tenant = tenant::Entity::find_by_id(tenant_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| PipelineError::Configuration(format!("unknown tenant {tenant_id}")))?;
        if !tenant.is_active {
            return Err(PipelineError::Configuration(format!(
                "tenant {tenant_id} is inactive"
            )));
        }
        TenantSettings::from_value(&tenant.settings)
    }

    /// Replace a generic provider placeholder description with the
    /// localized behavior label of the matching provider safety event.
    /// Specific descriptions are never overwritten; all failures leave the
    /// signal as-is.
    async fn normalize_description(
        &self,
        signal: signal::Model,
        settings: &TenantSettings,
    ) -> signal::Model {
        if !labels::is_generic_placeholder(&signal.description) {
            return signal;
        }
        let Some(token) = settings.provider_api_token.as_deref() else {
            return signal;
        };

        let occurred = signal.occurred_at.and_utc();
        let window = TimeWindow {
            start: occurred - Duration::minutes(15),
            end: occurred + Duration::minutes(15),
        };
        let events = match self
            .provider
            .safety_events(token, &[signal.vehicle_id.clone()], window)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!("Description refetch failed for signal {}: {}", signal.id, e);
                return signal;
            }
        };

        let Some(nearest) = events
            .into_iter()
            .min_by_key(|e| (e.occurred_at - occurred).num_seconds().abs())
        else {
            return signal;
        };
        let Some(label) = labels::behavior_label(&nearest.behavior, &settings.locale) else {
            return signal;
        };

        let mut active: signal::ActiveModel = signal.clone().into();
        active.description = Set(label.to_string());
        match active.update(&self.db).await {
            Ok(updated) => {
                info!(
                    "Normalized signal {} description to '{}'",
                    updated.id, label
                );
                updated
            }
            Err(e) => {
                warn!("Failed to persist normalized description: {}", e);
                signal
            }
        }
    }

    /// Shared decision branch for initial processing and revalidation.
    pub(crate) async fn apply_decision(
        &self,
        alert: alert::Model,
        signal: &signal::Model,
        settings: &TenantSettings,
        contacts: &[contact::Model],
        decision: AiDecision,
        pass: Pass,
        started: Instant,
    ) -> Result<AlertStatus> {
        let now = Utc::now().naive_utc();
        let usage = self.usage_for(settings);
        let events = self.events_for(settings);

        let next_check = decision.next_check_minutes_or(settings.recheck_minutes);
        let investigation_count = self
            .upsert_investigation(&alert, &decision, &pass, next_check, now)
            .await?;

        let current = AlertStatus::parse(&alert.status).unwrap_or(AlertStatus::Pending);
        let next_status = if decision.assessment.requires_monitoring {
            AlertStatus::Investigating
        } else {
            AlertStatus::Completed
        };
        if !current.can_transition_to(next_status) {
            return Err(PipelineError::Validation(format!(
                "illegal status transition {} -> {}",
                current.as_str(),
                next_status.as_str()
            )));
        }

        let severity = escalated_severity(&alert.severity, decision.assessment.risk_escalation.as_deref());
        let mut active: alert::ActiveModel = alert.clone().into();
        active.status = Set(next_status.as_str().to_string());
        active.severity = Set(severity);
        if next_status == AlertStatus::Completed {
            active.verdict = Set(Some(decision.assessment.verdict.clone()));
            active.likelihood = Set(Some(decision.assessment.likelihood.clone()));
            active.confidence = Set(Some(decision.assessment.confidence.clamp(0.0, 1.0)));
            active.human_message = Set(decision.human_message.clone());
        }
        active.updated_at = Set(now);
        let updated_alert = active.update(&self.db).await?;

        match next_status {
            AlertStatus::Investigating => {
                let due = Utc::now() + Duration::minutes(next_check);
                let mut conn = self.redis.get_multiplexed_async_connection().await?;
                let job = AlertJob::new(updated_alert.id, updated_alert.tenant_id);
                queue::schedule_revalidation(&mut conn, &job, due).await?;
                info!(
                    "Alert {} under monitoring (pass {}), recheck in {}m",
                    updated_alert.id, investigation_count, next_check
                );

                if let Err(e) = events
                    .emit(
                        updated_alert.tenant_id,
                        Some(updated_alert.id),
                        EVENT_INVESTIGATING,
                        json!({
                            "investigation_count": investigation_count,
                            "next_check_minutes": next_check,
                            "monitoring_reason": decision.assessment.monitoring_reason,
                        }),
                    )
                    .await
                {
                    warn!("Failed to record investigating event: {}", e);
                }
            }
            AlertStatus::Completed => {
                info!(
                    "Alert {} completed with verdict '{}'",
                    updated_alert.id, decision.assessment.verdict
                );
                if let Err(e) = events
                    .emit(
                        updated_alert.tenant_id,
                        Some(updated_alert.id),
                        EVENT_COMPLETED,
                        json!({
                            "verdict": decision.assessment.verdict,
                            "likelihood": decision.assessment.likelihood,
                            "confidence": decision.assessment.confidence,
                        }),
                    )
                    .await
                {
                    warn!("Failed to record completed event: {}", e);
                }
            }
            _ => unreachable!("next_status is investigating or completed"),
        }

        // SLA hook failures never surface to the pipeline.
        if let Err(e) = self
            .attention
            .init_for_alert(&updated_alert, &signal.kind, &settings.attention)
            .await
        {
            warn!("Attention engine initialization failed: {}", e);
        }

        let matrix_entry = decision
            .assessment
            .risk_escalation
            .as_deref()
            .and_then(|tier| settings.matrix_entry(tier));
        let plan = plan_dispatches(
            &decision,
            matrix_entry,
            settings,
            contacts,
            &signal.vehicle_id,
            signal.driver_id.as_deref(),
        );

        let mut alert_for_status = updated_alert.clone();
        if !plan.is_empty() {
            let stats = dispatch(
                &self.db,
                self.carrier.as_ref(),
                usage.as_ref(),
                &updated_alert,
                signal,
                &decision,
                &plan,
            )
            .await;
            if stats.attempted > 0 {
                let mut active: alert::ActiveModel = updated_alert.clone().into();
                active.notification_status =
                    Set(NotificationStatus::Dispatched.as_str().to_string());
                active.updated_at = Set(Utc::now().naive_utc());
                alert_for_status = active.update(&self.db).await?;
            }
        }

        let is_panic = SignalKind::parse(&signal.kind) == Some(SignalKind::PanicButton);
        let is_critical = alert_for_status.severity == Severity::Critical.as_str();
        if is_panic || is_critical {
            panic_escalation(
                &self.db,
                self.carrier.as_ref(),
                usage.as_ref(),
                events.as_ref(),
                &alert_for_status,
                signal,
                contacts,
                Some(&decision),
            )
            .await;
        }

        if let Err(e) = usage
            .record(
                updated_alert.tenant_id,
                METER_ALERTS_PROCESSED,
                &updated_alert.id.to_string(),
                1,
            )
            .await
        {
            warn!("Failed to record processed-count usage: {}", e);
        }
        if let Some(tokens) = decision.execution.total_tokens.filter(|t| *t > 0) {
            crate::metrics::record_ai_tokens(tokens as u64);
            if let Err(e) = usage
                .record(
                    updated_alert.tenant_id,
                    METER_AI_TOKENS,
                    &pass.token_entity(updated_alert.id),
                    tokens,
                )
                .await
            {
                warn!("Failed to record token usage: {}", e);
            }
        }

        if let Err(e) = self
            .record_alert_metrics(
                updated_alert.id,
                updated_alert.tenant_id,
                started.elapsed().as_millis() as i64,
                decision.execution.total_tokens.unwrap_or(0),
                decision.execution.cost_estimate.unwrap_or(0.0),
            )
            .await
        {
            warn!("Failed to update alert metrics: {}", e);
        }

        if let Some(store) = &self.media {
            let bucket = settings
                .media_bucket
                .clone()
                .or_else(|| env::var("MEDIA_EVIDENCE_BUCKET").ok());
            match bucket {
                Some(bucket) => media::spawn_persist_tasks(
                    store.clone(),
                    bucket,
                    updated_alert.id,
                    decision.media_urls(),
                ),
                None => {
                    if !decision.media_urls().is_empty() {
                        warn!("No evidence bucket configured; skipping media persistence");
                    }
                }
            }
        }

        Ok(next_status)
    }

    async fn upsert_investigation(
        &self,
        alert: &alert::Model,
        decision: &AiDecision,
        pass: &Pass,
        next_check: i64,
        now: chrono::NaiveDateTime,
    ) -> Result<i32> {
        let existing = alert_ai::Entity::find()
            .filter(alert_ai::Column::AlertId.eq(alert.id))
            .one(&self.db)
            .await?;

        let assessment = serde_json::to_value(&decision.assessment).unwrap_or(Value::Null);
        let entry = decision.history_entry(now);
        let actions = decision.actions_snapshot();

        match existing {
            Some(record) => {
                let count = pass.investigation_count(record.investigation_count);
                let mut history = record
                    .investigation_history
                    .as_array()
                    .cloned()
                    .unwrap_or_default();
                history.push(entry);

                let mut active: alert_ai::ActiveModel = record.into();
                active.investigation_count = Set(count);
                active.next_check_minutes = Set(Some(next_check as i32));
                active.assessment = Set(Some(assessment));
                active.investigation_history = Set(Value::Array(history));
                active.ai_actions = Set(Some(actions));
                active.updated_at = Set(now);
                active.update(&self.db).await?;
                Ok(count)
            }
            None => {
                let count = pass.investigation_count(0);
                let record = alert_ai::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    alert_id: Set(alert.id),
                    tenant_id: Set(alert.tenant_id),
                    investigation_count: Set(count),
                    next_check_minutes: Set(Some(next_check as i32)),
                    assessment: Set(Some(assessment)),
                    investigation_history: Set(Value::Array(vec![entry])),
                    ai_actions: Set(Some(actions)),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                record.insert(&self.db).await?;
                Ok(count)
            }
        }
    }

    /// Additive metrics row: tokens and cost accumulate, latency keeps the
    /// slowest pass.
    async fn record_alert_metrics(
        &self,
        alert_id: Uuid,
        tenant_id: Uuid,
        pipeline_ms: i64,
        tokens: i64,
        cost: f64,
    ) -> Result<()> {
        let now = Utc::now().naive_utc();
        match alert_metrics::Entity::find_by_id(alert_id).one(&self.db).await? {
            Some(row) => {
                let mut active: alert_metrics::ActiveModel = row.clone().into();
                active.pipeline_ms = Set(row.pipeline_ms.max(pipeline_ms));
                active.total_tokens = Set(row.total_tokens + tokens.max(0));
                active.cost_estimate = Set(row.cost_estimate + cost.max(0.0));
                active.updated_at = Set(now);
                active.update(&self.db).await?;
            }
            None => {
                let row = alert_metrics::ActiveModel {
                    alert_id: Set(alert_id),
                    tenant_id: Set(tenant_id),
                    pipeline_ms: Set(pipeline_ms),
                    total_tokens: Set(tokens.max(0)),
                    cost_estimate: Set(cost.max(0.0)),
                    updated_at: Set(now),
                };
                row.insert(&self.db).await?;
            }
        }
        Ok(())
    }

    /// Deterministic failure handler: mark the alert failed, write the
    /// audit record, and raise log severity only for critical alerts.
    pub(crate) async fn fail_alert(&self, alert_id: Uuid, tenant_id: Uuid, err: &PipelineError) {
        let alert = match self.load_alert(alert_id, tenant_id).await {
            Ok(alert) => alert,
            Err(load_err) => {
                error!(
                    "Alert {} failed ({}) and could not be loaded for failure handling: {}",
                    alert_id, err, load_err
                );
                return;
            }
        };

        let current = AlertStatus::parse(&alert.status).unwrap_or(AlertStatus::Pending);
        if current.is_terminal() {
            warn!(
                "Alert {} already terminal ({}); not overwriting after error: {}",
                alert_id,
                current.as_str(),
                err
            );
            return;
        }

        let now = Utc::now().naive_utc();
        let mut active: alert::ActiveModel = alert.clone().into();
        active.status = Set(AlertStatus::Failed.as_str().to_string());
        active.failure_reason = Set(Some(err.to_string()));
        active.updated_at = Set(now);
        if let Err(e) = active.update(&self.db).await {
            error!("Failed to persist failure state for alert {}: {}", alert_id, e);
        }

        if let Err(e) = self
            .events
            .emit(
                tenant_id,
                Some(alert_id),
                EVENT_PROCESSING_FAILED,
                json!({ "error": err.to_string(), "severity": alert.severity }),
            )
            .await
        {
            warn!("Failed to record processing_failed event: {}", e);
        }

        if alert.severity == Severity::Critical.as_str() {
            error!("Critical alert {} failed processing: {}", alert_id, err);
        } else {
            warn!("Alert {} failed processing: {}", alert_id, err);
        }
    }
}

/// Severity only ever escalates from the AI's risk tier, never downgrades.
pub(crate) fn escalated_severity(current: &str, tier: Option<&str>) -> String {
    let mapped = match tier {
        Some("low") => Severity::Info,
        Some("medium") => Severity::Warning,
        Some("high") | Some("critical") => Severity::Critical,
        _ => return current.to_string(),
    };
    let rank = |s: Severity| match s {
        Severity::Info => 0,
        Severity::Warning => 1,
        Severity::Critical => 2,
    };
    let current_parsed = Severity::parse(current).unwrap_or(Severity::Info);
    if rank(mapped) > rank(current_parsed) {
        mapped.as_str().to_string()
    } else {
        current.to_string()
    }
}

/// Request body for both AI endpoints; revalidation adds the accumulated
/// history.
pub(crate) fn build_payload(
    tenant_id: Uuid,
    settings: &TenantSettings,
    signal: &signal::Model,
    context: &preload::PreloadedContext,
    contacts: &[contact::Model],
    history: Option<(&Value, i32)>,
) -> Value {
    let mut payload = json!({
        "tenant_id": tenant_id,
        "tenant_config": {
            "channels": settings.channels,
            "monitor_matrix": settings.monitor_matrix,
            "recheck_minutes": settings.recheck_minutes,
            "locale": settings.locale,
        },
        "signal": {
            "id": signal.id,
            "vehicle_id": signal.vehicle_id,
            "driver_id": signal.driver_id,
            "kind": signal.kind,
            "description": signal.description,
            "occurred_at": signal.occurred_at.and_utc().to_rfc3339(),
            "raw": signal.raw,
        },
        "preloaded_context": context.to_payload(),
        "contacts": contacts
            .iter()
            .map(|c| json!({
                "type": c.contact_type,
                "name": c.name,
                "priority": c.priority,
            }))
            .collect::<Vec<_>>(),
    });

    if let Some((history_value, count)) = history {
        payload["investigation_history"] = history_value.clone();
        payload["investigation_count"] = json!(count);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_never_downgrades() {
        assert_eq!(escalated_severity("info", Some("high")), "critical");
        assert_eq!(escalated_severity("warning", Some("medium")), "warning");
        assert_eq!(escalated_severity("critical", Some("low")), "critical");
        assert_eq!(escalated_severity("warning", None), "warning");
        assert_eq!(escalated_severity("info", Some("medium")), "warning");
    }

    #[test]
    fn token_entity_distinguishes_passes() {
        let alert_id = Uuid::nil();
        assert_eq!(Pass::Initial.token_entity(alert_id), alert_id.to_string());
        assert_eq!(
            Pass::Revalidation { prior_count: 2 }.token_entity(alert_id),
            format!("{alert_id}:p3")
        );
    }

    #[test]
    fn investigation_count_is_monotonic() {
        assert_eq!(Pass::Initial.investigation_count(0), 0);
        assert_eq!(Pass::Initial.investigation_count(4), 4);
        assert_eq!(
            Pass::Revalidation { prior_count: 4 }.investigation_count(4),
            5
        );
        // a stale prior count can never shrink the stored value
        assert_eq!(
            Pass::Revalidation { prior_count: 1 }.investigation_count(6),
            6
        );
    }
}

#[cfg(test)]
mod state_machine_tests {
    use super::*;
    use crate::entities::contact;
    use crate::pipeline::test_support::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    fn request() -> ProcessAlertRequest {
        ProcessAlertRequest {
            alert_id: ALERT,
            tenant_id: TENANT,
        }
    }

    #[tokio::test]
    async fn completed_alert_is_a_no_op_with_zero_external_calls() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![make_alert("completed", "info")]])
            .into_connection();
        let (processor, fakes) = test_processor(db, json!({}));

        processor.process(request()).await.unwrap();

        assert_eq!(fakes.ai.total_calls(), 0);
        assert_eq!(fakes.provider.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(fakes.carrier.sends.lock().unwrap().is_empty());
        assert!(fakes.events.types().is_empty());
    }

    #[tokio::test]
    async fn investigating_alert_is_not_reprocessed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![make_alert("investigating", "warning")]])
            .into_connection();
        let (processor, fakes) = test_processor(db, json!({}));

        processor.process(request()).await.unwrap();

        assert_eq!(fakes.ai.total_calls(), 0);
        assert!(fakes.carrier.sends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_credential_is_fatal_before_any_ai_call() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![make_alert("pending", "critical")]])
            .append_query_results([vec![make_tenant(json!({}))]])
            // failure handler reloads and updates the alert
            .append_query_results([vec![make_alert("pending", "critical")]])
            .append_query_results([vec![make_alert("failed", "critical")]])
            .into_connection();
        let (processor, fakes) = test_processor(db, json!({}));

        let err = processor.process(request()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
        assert_eq!(fakes.ai.total_calls(), 0);
        assert_eq!(fakes.events.types(), vec!["processing_failed".to_string()]);
    }

    #[tokio::test]
    async fn ai_pipeline_error_fails_the_alert() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![make_alert("pending", "warning")]])
            .append_query_results([vec![make_tenant(json!({ "ai_api_key": "sk-tenant" }))]])
            .append_query_results([vec![make_signal("Harsh Braking near depot")]])
            .append_query_results([Vec::<contact::Model>::new()])
            // failure handler reloads and updates the alert
            .append_query_results([vec![make_alert("pending", "warning")]])
            .append_query_results([vec![make_alert("failed", "warning")]])
            .into_connection();
        let (processor, fakes) = test_processor(
            db,
            json!({ "status": "error", "error": "Pipeline execution failed" }),
        );

        let err = processor.process(request()).await.unwrap_err();

        assert!(err
            .to_string()
            .contains("AI service pipeline error: Pipeline execution failed"));
        assert_eq!(fakes.ai.total_calls(), 1);
        assert_eq!(
            fakes.events.types(),
            vec![
                "processing_started".to_string(),
                "processing_failed".to_string()
            ]
        );
        // nothing was dispatched for a failed pass
        assert!(fakes.carrier.sends.lock().unwrap().is_empty());
    }
}
