pub mod media;
pub mod preload;
pub mod process;
pub mod revalidate;

use crate::ai::AiVerdictApi;
use crate::attention::AttentionEngine;
use crate::billing::events::{DomainEventSink, NoopEvents};
use crate::billing::{NoopUsage, UsageRecorder};
use crate::config::TenantSettings;
use crate::notifications::carrier::CarrierApi;
use crate::provider::TelemetryApi;
use crate::sync_cursors::SyncCursorStore;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

/// Monitoring gives up after this many revalidation passes; the alert
/// completes with a `needs_review` verdict instead of looping forever.
pub const MAX_INVESTIGATIONS: i32 = 10;

pub const VERDICT_NEEDS_REVIEW: &str = "needs_review";

/// Immutable queue payload for initial processing.
#[derive(Debug, Clone, Copy)]
pub struct ProcessAlertRequest {
    pub alert_id: Uuid,
    pub tenant_id: Uuid,
}

/// Immutable queue payload for a scheduled recheck.
#[derive(Debug, Clone, Copy)]
pub struct RevalidateRequest {
    pub alert_id: Uuid,
    pub tenant_id: Uuid,
}

/// Stateless handler for alert processing and revalidation. Holds the
/// injected collaborators; per-request state lives on the stack of each
/// call.
pub struct AlertProcessor {
    pub db: DatabaseConnection,
    pub redis: Arc<redis::Client>,
    pub ai: Arc<dyn AiVerdictApi>,
    pub provider: Arc<dyn TelemetryApi>,
    pub carrier: Arc<dyn CarrierApi>,
    pub media: Option<Arc<media::MediaStore>>,
    pub attention: Arc<dyn AttentionEngine>,
    pub usage: Arc<dyn UsageRecorder>,
    pub events: Arc<dyn DomainEventSink>,
    pub cursors: Arc<dyn SyncCursorStore>,
}

impl AlertProcessor {
    /// Strategy selection per tenant: metering off means the no-op
    /// recorder, so call sites stay unconditional.
    pub(crate) fn usage_for(&self, settings: &TenantSettings) -> Arc<dyn UsageRecorder> {
        if settings.metering_enabled {
            self.usage.clone()
        } else {
            Arc::new(NoopUsage)
        }
    }

    pub(crate) fn events_for(&self, settings: &TenantSettings) -> Arc<dyn DomainEventSink> {
        if settings.domain_events_enabled {
            self.events.clone()
        } else {
            Arc::new(NoopEvents)
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::AlertProcessor;
    use crate::ai::{AiDecision, AiVerdictApi};
    use crate::attention::NoopAttention;
    use crate::billing::events::DomainEventSink;
    use crate::billing::UsageRecorder;
    use crate::entities::{alert, alert_ai, signal, tenant};
    use crate::error::{PipelineError, Result};
    use crate::notifications::carrier::CarrierApi;
    use crate::provider::{SafetyEvent, TelemetryApi, TimeWindow, Trip, VehicleStats};
    use crate::sync_cursors::SyncCursorStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use sea_orm::DatabaseConnection;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    pub(crate) const TENANT: Uuid = Uuid::from_u128(1);
    pub(crate) const ALERT: Uuid = Uuid::from_u128(2);
    pub(crate) const SIGNAL: Uuid = Uuid::from_u128(3);

    pub(crate) struct FakeAi {
        pub response: Value,
        pub ingest_calls: AtomicUsize,
        pub revalidate_calls: AtomicUsize,
    }

    impl FakeAi {
        pub fn new(response: Value) -> Arc<Self> {
            Arc::new(Self {
                response,
                ingest_calls: AtomicUsize::new(0),
                revalidate_calls: AtomicUsize::new(0),
            })
        }

        pub fn total_calls(&self) -> usize {
            self.ingest_calls.load(Ordering::SeqCst) + self.revalidate_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AiVerdictApi for FakeAi {
        async fn ingest(&self, _api_key: &str, _payload: Value) -> Result<AiDecision> {
            self.ingest_calls.fetch_add(1, Ordering::SeqCst);
            AiDecision::from_response(self.response.clone())
        }

        async fn revalidate(&self, _api_key: &str, _payload: Value) -> Result<AiDecision> {
            self.revalidate_calls.fetch_add(1, Ordering::SeqCst);
            AiDecision::from_response(self.response.clone())
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl TelemetryApi for FakeProvider {
        async fn vehicle_stats(&self, _: &str, _: &[String]) -> Result<Vec<VehicleStats>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn safety_events(
            &self,
            _: &str,
            _: &[String],
            _: TimeWindow,
        ) -> Result<Vec<SafetyEvent>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn trips(&self, _: &str, _: &[String], _: TimeWindow) -> Result<Vec<Trip>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeCarrier {
        pub sends: Mutex<Vec<(&'static str, String)>>,
        pub fail_endpoints: Vec<String>,
    }

    impl FakeCarrier {
        fn send(&self, channel: &'static str, to: &str) -> Result<String> {
            self.sends.lock().unwrap().push((channel, to.to_string()));
            if self.fail_endpoints.iter().any(|e| e == to) {
                Err(PipelineError::Carrier(format!("{channel} to {to}: HTTP 400")))
            } else {
                Ok(format!("SM{}", self.sends.lock().unwrap().len()))
            }
        }
    }

    #[async_trait]
    impl CarrierApi for FakeCarrier {
        async fn send_sms(&self, to: &str, _body: &str) -> Result<String> {
            self.send("sms", to)
        }

        async fn send_whatsapp(&self, to: &str, _body: &str) -> Result<String> {
            self.send("whatsapp", to)
        }

        async fn place_call(&self, to: &str, _script: &str) -> Result<String> {
            self.send("voice", to)
        }

        async fn send_email(&self, to: &str, _subject: &str, _html: &str) -> Result<String> {
            self.send("email", to)
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeUsage {
        pub records: Mutex<Vec<(String, String, i64)>>,
    }

    #[async_trait]
    impl UsageRecorder for FakeUsage {
        async fn record(
            &self,
            _tenant_id: Uuid,
            meter: &str,
            entity_id: &str,
            quantity: i64,
        ) -> Result<()> {
            self.records
                .lock()
                .unwrap()
                .push((meter.to_string(), entity_id.to_string(), quantity));
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeEvents {
        pub events: Mutex<Vec<(String, Value)>>,
    }

    impl FakeEvents {
        pub fn types(&self) -> Vec<String> {
            self.events.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl DomainEventSink for FakeEvents {
        async fn emit(
            &self,
            _tenant_id: Uuid,
            _alert_id: Option<Uuid>,
            event_type: &str,
            payload: Value,
        ) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push((event_type.to_string(), payload));
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeCursors {
        pub map: Mutex<HashMap<String, DateTime<Utc>>>,
    }

    #[async_trait]
    impl SyncCursorStore for FakeCursors {
        async fn last_sync(&self, tenant_id: Uuid, scope: &str) -> Result<Option<DateTime<Utc>>> {
            Ok(self
                .map
                .lock()
                .unwrap()
                .get(&format!("{tenant_id}:{scope}"))
                .copied())
        }

        async fn record_sync(&self, tenant_id: Uuid, scope: &str, at: DateTime<Utc>) -> Result<()> {
            self.map
                .lock()
                .unwrap()
                .insert(format!("{tenant_id}:{scope}"), at);
            Ok(())
        }
    }

    pub(crate) struct Fakes {
        pub ai: Arc<FakeAi>,
        pub provider: Arc<FakeProvider>,
        pub carrier: Arc<FakeCarrier>,
        pub usage: Arc<FakeUsage>,
        pub events: Arc<FakeEvents>,
    }

    pub(crate) fn test_processor(db: DatabaseConnection, ai_response: Value) -> (AlertProcessor, Fakes) {
        let ai = FakeAi::new(ai_response);
        let provider = Arc::new(FakeProvider::default());
        let carrier = Arc::new(FakeCarrier::default());
        let usage = Arc::new(FakeUsage::default());
        let events = Arc::new(FakeEvents::default());

        let processor = AlertProcessor {
            db,
            // never connected in tests; guard paths stop before any queue use
            redis: Arc::new(redis::Client::open("redis://127.0.0.1:6399/0").unwrap()),
            ai: ai.clone(),
            provider: provider.clone(),
            carrier: carrier.clone(),
            media: None,
            attention: Arc::new(NoopAttention),
            usage: usage.clone(),
            events: events.clone(),
            cursors: Arc::new(FakeCursors::default()),
        };
        let fakes = Fakes {
            ai,
            provider,
            carrier,
            usage,
            events,
        };
        (processor, fakes)
    }

    pub(crate) fn make_alert(status: &str, severity: &str) -> alert::Model {
        let now = Utc::now().naive_utc();
        alert::Model {
            id: ALERT,
            tenant_id: TENANT,
            signal_id: SIGNAL,
            status: status.to_string(),
            verdict: None,
            likelihood: None,
            confidence: None,
            severity: severity.to_string(),
            attention_state: "none".to_string(),
            notification_status: "none".to_string(),
            human_message: None,
            failure_reason: None,
            acknowledge_by: None,
            acknowledged_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn make_tenant(settings: Value) -> tenant::Model {
        let now = Utc::now().naive_utc();
        tenant::Model {
            id: TENANT,
            name: "acme-fleet".to_string(),
            api_key_hash: "unused".to_string(),
            settings,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn make_signal(description: &str) -> signal::Model {
        let now = Utc::now().naive_utc();
        signal::Model {
            id: SIGNAL,
            tenant_id: TENANT,
            vehicle_id: "veh-42".to_string(),
            driver_id: None,
            kind: "safety_event".to_string(),
            description: description.to_string(),
            occurred_at: now,
            raw: serde_json::json!({}),
            created_at: now,
        }
    }

    pub(crate) fn make_alert_ai(count: i32) -> alert_ai::Model {
        let now = Utc::now().naive_utc();
        alert_ai::Model {
            id: Uuid::from_u128(4),
            alert_id: ALERT,
            tenant_id: TENANT,
            investigation_count: count,
            next_check_minutes: Some(30),
            assessment: None,
            investigation_history: serde_json::json!([]),
            ai_actions: None,
            created_at: now,
            updated_at: now,
        }
    }
}
