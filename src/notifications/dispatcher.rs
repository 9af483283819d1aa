use crate::ai::decision::AiDecision;
use crate::billing::{events::DomainEventSink, UsageRecorder};
use crate::config::{Channel, MatrixEntry, RecipientKind, TenantSettings};
use crate::entities::alert::NotificationStatus;
use crate::entities::{alert, contact, notification_result, signal};
use crate::error::Result;
use crate::notifications::carrier::CarrierApi;
use crate::notifications::delivery::DeliveryStatus;
use crate::notifications::resolver::{all_active_of, endpoint_for, resolve_recipient};
use crate::notifications::templates::NotificationTemplates;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One (channel, recipient) pair scheduled for an independent send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSend {
    pub channel: Channel,
    pub recipient_kind: RecipientKind,
    pub contact_id: Option<i32>,
    pub endpoint: String,
}

/// Pure planning step for a normal (non-panic) dispatch.
///
/// `should_notify = false` with no matrix entry yields an empty plan:
/// zero rows, zero carrier calls. A matrix entry forces its
/// channels/recipients in even when the AI declined to notify; when the AI
/// did ask, matrix channels/recipients are unioned with the decision's
/// own. The tenant channel-enable config filters everything, forced or
/// not.
pub fn plan_dispatches(
    decision: &AiDecision,
    matrix_entry: Option<&MatrixEntry>,
    settings: &TenantSettings,
    contacts: &[contact::Model],
    vehicle_id: &str,
    driver_id: Option<&str>,
) -> Vec<PlannedSend> {
    let notification = &decision.notification_decision;

    let mut channels: Vec<Channel> = Vec::new();
    let mut recipients: Vec<RecipientKind> = Vec::new();

    if notification.should_notify {
        channels.extend(notification.channels_to_use.iter().copied());
        recipients.extend(notification.recipients.iter().copied());
    }
    if let Some(entry) = matrix_entry {
        channels.extend(entry.channels.iter().copied());
        recipients.extend(entry.recipients.iter().copied());
    }

    channels.retain(|c| settings.channel_enabled(*c));
    dedupe(&mut channels);
    dedupe(&mut recipients);

    if channels.is_empty() || recipients.is_empty() {
        return Vec::new();
    }

    let mut plan: Vec<PlannedSend> = Vec::new();
    for kind in recipients {
        let Some(contact) = resolve_recipient(kind, contacts, vehicle_id, driver_id) else {
            warn!("No active {} contact resolvable for dispatch", kind.as_str());
            continue;
        };
        for channel in &channels {
            let Some(endpoint) = endpoint_for(*channel, contact) else {
                continue;
            };
            let send = PlannedSend {
                channel: *channel,
                recipient_kind: kind,
                contact_id: Some(contact.id),
                endpoint,
            };
            if !plan
                .iter()
                .any(|p| p.channel == send.channel && p.endpoint == send.endpoint)
            {
                plan.push(send);
            }
        }
    }
    plan
}

fn dedupe<T: PartialEq + Copy>(items: &mut Vec<T>) {
    let mut seen: Vec<T> = Vec::new();
    items.retain(|item| {
        if seen.contains(item) {
            false
        } else {
            seen.push(*item);
            true
        }
    });
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchStats {
    pub attempted: usize,
    pub accepted: usize,
    pub failed: usize,
}

/// Execute a plan. Sends run sequentially but each is failure-isolated:
/// a carrier rejection records a failed row and the loop moves on; there
/// is no enclosing transaction and nothing is rolled back.
pub async fn dispatch(
    db: &DatabaseConnection,
    carrier: &dyn CarrierApi,
    usage: &dyn UsageRecorder,
    alert: &alert::Model,
    signal: &signal::Model,
    decision: &AiDecision,
    plan: &[PlannedSend],
) -> DispatchStats {
    let message_text = decision
        .notification_decision
        .message_text
        .clone()
        .or_else(|| decision.human_message.clone())
        .unwrap_or_else(|| "A safety alert requires your attention.".to_string());
    let call_script = decision
        .notification_decision
        .call_script
        .clone()
        .unwrap_or_else(|| message_text.clone());
    let text = NotificationTemplates::alert_text(
        &signal.vehicle_id,
        &alert.severity,
        &signal.description,
        &message_text,
    );

    let mut stats = DispatchStats::default();
    for send in plan {
        let outcome = match send.channel {
            Channel::Sms => carrier.send_sms(&send.endpoint, &text).await,
            Channel::Whatsapp => carrier.send_whatsapp(&send.endpoint, &text).await,
            Channel::Voice => carrier.place_call(&send.endpoint, &call_script).await,
            Channel::Email => {
                let subject =
                    NotificationTemplates::alert_email_subject(&signal.vehicle_id, &alert.severity);
                let html = NotificationTemplates::alert_email_html(
                    &signal.vehicle_id,
                    &alert.severity,
                    &signal.description,
                    &message_text,
                    &decision.assessment.recommended_actions,
                );
                carrier.send_email(&send.endpoint, &subject, &html).await
            }
        };
        record_attempt(db, usage, alert, send, outcome, &mut stats).await;
    }
    stats
}

/// Persist one attempt row and its metering event, success or not.
async fn record_attempt(
    db: &DatabaseConnection,
    usage: &dyn UsageRecorder,
    alert: &alert::Model,
    send: &PlannedSend,
    outcome: Result<String>,
    stats: &mut DispatchStats,
) {
    stats.attempted += 1;
    let now = chrono::Utc::now().naive_utc();
    let row_id = Uuid::new_v4();

    let row = match &outcome {
        Ok(sid) => {
            stats.accepted += 1;
            notification_result::ActiveModel {
                id: Set(row_id),
                tenant_id: Set(alert.tenant_id),
                alert_id: Set(alert.id),
                channel: Set(send.channel.as_str().to_string()),
                recipient_kind: Set(send.recipient_kind.as_str().to_string()),
                contact_id: Set(send.contact_id),
                endpoint: Set(send.endpoint.clone()),
                provider_sid: Set(Some(sid.clone())),
                status_current: Set(DeliveryStatus::Sent.as_str().to_string()),
                error_message: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
        }
        Err(e) => {
            stats.failed += 1;
            notification_result::ActiveModel {
                id: Set(row_id),
                tenant_id: Set(alert.tenant_id),
                alert_id: Set(alert.id),
                channel: Set(send.channel.as_str().to_string()),
                recipient_kind: Set(send.recipient_kind.as_str().to_string()),
                contact_id: Set(send.contact_id),
                endpoint: Set(send.endpoint.clone()),
                provider_sid: Set(None),
                status_current: Set(DeliveryStatus::Failed.as_str().to_string()),
                error_message: Set(Some(e.to_string())),
                created_at: Set(now),
                updated_at: Set(now),
            }
        }
    };

    if let Err(e) = row.insert(db).await {
        error!("Failed to persist notification result: {}", e);
        return;
    }

    if let Err(e) = usage
        .record(alert.tenant_id, "notifications_sent", &row_id.to_string(), 1)
        .await
    {
        warn!("Failed to record notification usage: {}", e);
    }
}

/// Dedicated fan-out for critical/panic alerts. Wider than the matrix:
/// every active monitoring-team and supervisor contact is texted
/// (supervisors on WhatsApp and SMS both), every emergency contact gets a
/// voice call. The alert is marked escalated and audited even when no
/// contact exists to receive anything.
pub async fn panic_escalation(
    db: &DatabaseConnection,
    carrier: &dyn CarrierApi,
    usage: &dyn UsageRecorder,
    events: &dyn DomainEventSink,
    alert: &alert::Model,
    signal: &signal::Model,
    contacts: &[contact::Model],
    decision: Option<&AiDecision>,
) -> DispatchStats {
    let text = NotificationTemplates::panic_text(
        &signal.vehicle_id,
        signal.driver_id.as_deref(),
        &signal.description,
    );
    let call_script = decision
        .and_then(|d| d.notification_decision.call_script.clone())
        .unwrap_or_else(|| text.clone());

    let mut stats = DispatchStats::default();

    for contact in all_active_of(RecipientKind::MonitoringTeam, contacts) {
        if let Some(endpoint) = endpoint_for(Channel::Sms, contact) {
            let send = PlannedSend {
                channel: Channel::Sms,
                recipient_kind: RecipientKind::MonitoringTeam,
                contact_id: Some(contact.id),
                endpoint: endpoint.clone(),
            };
            let outcome = carrier.send_sms(&endpoint, &text).await;
            record_attempt(db, usage, alert, &send, outcome, &mut stats).await;
        }
    }

    for contact in all_active_of(RecipientKind::Supervisor, contacts) {
        if let Some(endpoint) = endpoint_for(Channel::Whatsapp, contact) {
            let send = PlannedSend {
                channel: Channel::Whatsapp,
                recipient_kind: RecipientKind::Supervisor,
                contact_id: Some(contact.id),
                endpoint: endpoint.clone(),
            };
            let outcome = carrier.send_whatsapp(&endpoint, &text).await;
            record_attempt(db, usage, alert, &send, outcome, &mut stats).await;
        }
        if let Some(endpoint) = endpoint_for(Channel::Sms, contact) {
            let send = PlannedSend {
                channel: Channel::Sms,
                recipient_kind: RecipientKind::Supervisor,
                contact_id: Some(contact.id),
                endpoint: endpoint.clone(),
            };
            let outcome = carrier.send_sms(&endpoint, &text).await;
            record_attempt(db, usage, alert, &send, outcome, &mut stats).await;
        }
    }

    for contact in all_active_of(RecipientKind::Emergency, contacts) {
        if let Some(endpoint) = endpoint_for(Channel::Voice, contact) {
            let send = PlannedSend {
                channel: Channel::Voice,
                recipient_kind: RecipientKind::Emergency,
                contact_id: Some(contact.id),
                endpoint: endpoint.clone(),
            };
            let outcome = carrier.place_call(&endpoint, &call_script).await;
            record_attempt(db, usage, alert, &send, outcome, &mut stats).await;
        }
    }

    if stats.attempted == 0 {
        warn!(
            "Panic escalation for alert {} found no reachable contacts",
            alert.id
        );
    }

    // Escalated regardless of how the individual sends fared.
    let mut active: alert::ActiveModel = alert.clone().into();
    active.notification_status = Set(NotificationStatus::Escalated.as_str().to_string());
    active.updated_at = Set(chrono::Utc::now().naive_utc());
    if let Err(e) = active.update(db).await {
        error!("Failed to mark alert {} escalated: {}", alert.id, e);
    }

    if let Err(e) = events
        .emit(
            alert.tenant_id,
            Some(alert.id),
            "notifications_escalated",
            json!({
                "attempted": stats.attempted,
                "accepted": stats.accepted,
                "failed": stats.failed,
                "signal_kind": signal.kind,
            }),
        )
        .await
    {
        warn!("Failed to record escalation audit event: {}", e);
    }

    crate::metrics::increment_panic_escalations();
    info!(
        "Panic escalation for alert {}: attempted={} accepted={} failed={}",
        alert.id, stats.attempted, stats.accepted, stats.failed
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::resolver::test_contact;
    use serde_json::json;

    fn decision(should_notify: bool, channels: &[&str], recipients: &[&str]) -> AiDecision {
        AiDecision::from_response(json!({
            "assessment": {
                "verdict": "likely_false_positive",
                "likelihood": "low",
                "confidence": 0.4,
                "requires_monitoring": false,
                "risk_escalation": "low"
            },
            "notification_decision": {
                "should_notify": should_notify,
                "message_text": "check vehicle",
                "channels_to_use": channels,
                "recipients": recipients
            }
        }))
        .unwrap()
    }

    fn settings() -> TenantSettings {
        TenantSettings::from_value(&json!({ "ai_api_key": "k" })).unwrap()
    }

    #[test]
    fn no_notify_and_no_matrix_is_empty_plan() {
        let contacts = vec![test_contact(1, "supervisor", Some("+100"))];
        let plan = plan_dispatches(
            &decision(false, &[], &[]),
            None,
            &settings(),
            &contacts,
            "veh-1",
            None,
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn matrix_forces_notification_on() {
        let contacts = vec![test_contact(1, "supervisor", Some("+100"))];
        let entry = MatrixEntry {
            channels: vec![Channel::Sms],
            recipients: vec![RecipientKind::Supervisor],
        };
        let plan = plan_dispatches(
            &decision(false, &[], &[]),
            Some(&entry),
            &settings(),
            &contacts,
            "veh-1",
            None,
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].channel, Channel::Sms);
        assert_eq!(plan[0].endpoint, "+100");
    }

    #[test]
    fn disabled_channel_never_planned_even_when_requested() {
        let mut contact = test_contact(1, "supervisor", Some("+100"));
        contact.whatsapp = Some("+100".to_string());
        let contacts = vec![contact];

        let settings = TenantSettings::from_value(&json!({
            "ai_api_key": "k",
            "channels": { "whatsapp": false }
        }))
        .unwrap();

        let plan = plan_dispatches(
            &decision(true, &["whatsapp", "sms"], &["supervisor"]),
            None,
            &settings,
            &contacts,
            "veh-1",
            None,
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].channel, Channel::Sms);
    }

    #[test]
    fn matrix_unions_with_ai_decision() {
        let mut supervisor = test_contact(1, "supervisor", Some("+100"));
        supervisor.whatsapp = Some("+101".to_string());
        let monitoring = test_contact(2, "monitoring_team", Some("+200"));
        let contacts = vec![supervisor, monitoring];

        let entry = MatrixEntry {
            channels: vec![Channel::Whatsapp],
            recipients: vec![RecipientKind::MonitoringTeam],
        };
        let plan = plan_dispatches(
            &decision(true, &["sms"], &["supervisor"]),
            Some(&entry),
            &settings(),
            &contacts,
            "veh-1",
            None,
        );

        // 2 recipients x 2 channels, minus monitoring_team having no
        // whatsapp-distinct endpoint still yields one row per pair
        assert_eq!(plan.len(), 4);
        assert!(plan.iter().any(|p| p.channel == Channel::Sms && p.endpoint == "+100"));
        assert!(plan.iter().any(|p| p.channel == Channel::Whatsapp && p.endpoint == "+101"));
        assert!(plan.iter().any(|p| p.channel == Channel::Sms && p.endpoint == "+200"));
        assert!(plan.iter().any(|p| p.channel == Channel::Whatsapp && p.endpoint == "+200"));
    }

    #[test]
    fn duplicate_endpoints_collapse() {
        // same person registered as supervisor twice via matrix + decision
        let contacts = vec![test_contact(1, "supervisor", Some("+100"))];
        let entry = MatrixEntry {
            channels: vec![Channel::Sms],
            recipients: vec![RecipientKind::Supervisor],
        };
        let plan = plan_dispatches(
            &decision(true, &["sms"], &["supervisor"]),
            Some(&entry),
            &settings(),
            &contacts,
            "veh-1",
            None,
        );
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn no_resolvable_contact_yields_no_sends() {
        let plan = plan_dispatches(
            &decision(true, &["sms"], &["dispatch"]),
            None,
            &settings(),
            &[],
            "veh-1",
            None,
        );
        assert!(plan.is_empty());
    }

    fn result_row(endpoint: &str, status: &str) -> notification_result::Model {
        let now = chrono::Utc::now().naive_utc();
        notification_result::Model {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            alert_id: Uuid::nil(),
            channel: "sms".to_string(),
            recipient_kind: "supervisor".to_string(),
            contact_id: None,
            endpoint: endpoint.to_string(),
            provider_sid: None,
            status_current: status.to_string(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn one_failed_send_never_blocks_its_sibling() {
        use crate::pipeline::test_support::{make_alert, make_signal, FakeCarrier, FakeUsage};
        use sea_orm::{DatabaseBackend, MockDatabase};

        // one row per attempt, success or not
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![result_row("+100", "sent")]])
            .append_query_results([vec![result_row("+200", "failed")]])
            .into_connection();

        let carrier = FakeCarrier {
            fail_endpoints: vec!["+200".to_string()],
            ..Default::default()
        };
        let usage = FakeUsage::default();

        let plan = vec![
            PlannedSend {
                channel: Channel::Sms,
                recipient_kind: RecipientKind::Supervisor,
                contact_id: Some(1),
                endpoint: "+100".to_string(),
            },
            PlannedSend {
                channel: Channel::Sms,
                recipient_kind: RecipientKind::MonitoringTeam,
                contact_id: Some(2),
                endpoint: "+200".to_string(),
            },
        ];

        let stats = dispatch(
            &db,
            &carrier,
            &usage,
            &make_alert("completed", "critical"),
            &make_signal("Harsh Braking"),
            &decision(true, &["sms"], &["supervisor", "monitoring_team"]),
            &plan,
        )
        .await;

        assert_eq!(stats.attempted, 2);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.failed, 1);
        // both sends went out; the failure stayed on its own row
        assert_eq!(carrier.sends.lock().unwrap().len(), 2);
        // one metering event per attempt, failed included
        assert_eq!(usage.records.lock().unwrap().len(), 2);
    }
}
