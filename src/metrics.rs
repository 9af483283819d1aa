use crate::entities::{alert, tenant};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};

/// Seed process-level gauges at start-up so dashboards don't show gaps
/// until the first event arrives.
pub async fn init_metrics(db: &DatabaseConnection) {
    let tenant_count = tenant::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("fleetguard_tenants_total").set(tenant_count as f64);

    for status in ["pending", "investigating", "completed", "failed"] {
        let count = alert::Entity::find()
            .filter(alert::Column::Status.eq(status))
            .count(db)
            .await
            .unwrap_or(0);
        metrics::gauge!("fleetguard_alerts_total", "status" => status).set(count as f64);
    }

    tracing::info!("Initialized metrics: tenants={}", tenant_count);
}

pub fn increment_alerts_processed(outcome: &str) {
    metrics::counter!("fleetguard_alerts_processed_total", "outcome" => outcome.to_string())
        .increment(1);
}

pub fn increment_revalidations(outcome: &str) {
    metrics::counter!("fleetguard_revalidations_total", "outcome" => outcome.to_string())
        .increment(1);
}

pub fn increment_notifications_sent(channel: &str) {
    metrics::counter!("fleetguard_notifications_sent_total", "channel" => channel.to_string())
        .increment(1);
}

pub fn increment_notifications_failed(channel: &str) {
    metrics::counter!("fleetguard_notifications_failed_total", "channel" => channel.to_string())
        .increment(1);
}

pub fn increment_panic_escalations() {
    metrics::counter!("fleetguard_panic_escalations_total").increment(1);
}

pub fn record_ai_tokens(total: u64) {
    metrics::counter!("fleetguard_ai_tokens_total").increment(total);
}

pub fn increment_ai_errors(kind: &str) {
    metrics::counter!("fleetguard_ai_errors_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_pipeline_duration(seconds: f64, outcome: &str) {
    metrics::histogram!("fleetguard_pipeline_duration_seconds", "outcome" => outcome.to_string())
        .record(seconds);
}

pub fn increment_attention_escalations(count: u64) {
    metrics::counter!("fleetguard_attention_escalations_total").increment(count);
}

pub fn record_acknowledgment_time(seconds: f64) {
    metrics::histogram!("fleetguard_alert_acknowledgment_duration_seconds").record(seconds);
}

pub fn increment_media_persisted(outcome: &str) {
    metrics::counter!("fleetguard_media_persisted_total", "outcome" => outcome.to_string())
        .increment(1);
}
