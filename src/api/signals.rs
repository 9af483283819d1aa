use crate::api::middleware::TenantContext;
use crate::entities::alert::{AlertStatus, AttentionState, NotificationStatus, Severity};
use crate::entities::signal::SignalKind;
use crate::entities::{alert, signal};
use crate::queue::{self, AlertJob};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct IngestSignalRequest {
    pub vehicle_id: String,
    pub driver_id: Option<String>,
    /// "safety_event" or "panic_button".
    pub kind: String,
    pub description: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub raw: Option<serde_json::Value>,
}

// POST /signals - ingest one telemetry signal, open its alert, enqueue
// processing. Returns 202; triage happens on the worker.
pub async fn ingest_signal(
    Extension(db): Extension<DatabaseConnection>,
    Extension(redis_client): Extension<redis::Client>,
    Extension(ctx): Extension<TenantContext>,
    Json(payload): Json<IngestSignalRequest>,
) -> impl IntoResponse {
    let Some(kind) = SignalKind::parse(&payload.kind) else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": format!("unknown signal kind '{}'", payload.kind)})),
        )
            .into_response();
    };

    let now = Utc::now().naive_utc();
    let occurred_at = payload
        .occurred_at
        .map(|at| at.naive_utc())
        .unwrap_or(now);
    let description = payload
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| match kind {
            SignalKind::PanicButton => "Panic Button Pressed".to_string(),
            SignalKind::SafetyEvent => "Safety Event".to_string(),
        });

    let signal_id = Uuid::new_v4();
    let signal_row = signal::ActiveModel {
        id: Set(signal_id),
        tenant_id: Set(ctx.tenant_id),
        vehicle_id: Set(payload.vehicle_id),
        driver_id: Set(payload.driver_id),
        kind: Set(kind.as_str().to_string()),
        description: Set(description),
        occurred_at: Set(occurred_at),
        raw: Set(payload.raw.unwrap_or_else(|| json!({}))),
        created_at: Set(now),
    };
    if let Err(e) = signal_row.insert(&db).await {
        error!("Failed to insert signal: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Failed to persist signal"})),
        )
            .into_response();
    }

    // Panic signals start critical; everything else earns severity from
    // the AI's risk tier later.
    let severity = match kind {
        SignalKind::PanicButton => Severity::Critical,
        SignalKind::SafetyEvent => Severity::Info,
    };

    let alert_id = Uuid::new_v4();
    let alert_row = alert::ActiveModel {
        id: Set(alert_id),
        tenant_id: Set(ctx.tenant_id),
        signal_id: Set(signal_id),
        status: Set(AlertStatus::Pending.as_str().to_string()),
        verdict: Set(None),
        likelihood: Set(None),
        confidence: Set(None),
        severity: Set(severity.as_str().to_string()),
        attention_state: Set(AttentionState::None.as_str().to_string()),
        notification_status: Set(NotificationStatus::None.as_str().to_string()),
        human_message: Set(None),
        failure_reason: Set(None),
        acknowledge_by: Set(None),
        acknowledged_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    if let Err(e) = alert_row.insert(&db).await {
        error!("Failed to insert alert: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Failed to persist alert"})),
        )
            .into_response();
    }

    let mut conn = match redis_client.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to get redis connection for enqueue: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to enqueue alert"})),
            )
                .into_response();
        }
    };
    let job = AlertJob::new(alert_id, ctx.tenant_id);
    if let Err(e) = queue::enqueue_process(&mut conn, &job).await {
        error!("Failed to enqueue alert {}: {}", alert_id, e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Failed to enqueue alert"})),
        )
            .into_response();
    }

    info!(
        "Ingested signal {} -> alert {} for tenant {}",
        signal_id, alert_id, ctx.tenant_id
    );
    (
        StatusCode::ACCEPTED,
        Json(json!({"signal_id": signal_id, "alert_id": alert_id})),
    )
        .into_response()
}
