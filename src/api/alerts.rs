use crate::api::middleware::TenantContext;
use crate::entities::alert::AttentionState;
use crate::entities::{alert, Alert};
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

#[derive(Serialize)]
pub struct AlertResponse {
    pub id: Uuid,
    pub signal_id: Uuid,
    pub status: String,
    pub verdict: Option<String>,
    pub likelihood: Option<String>,
    pub confidence: Option<f64>,
    pub severity: String,
    pub attention_state: String,
    pub notification_status: String,
    pub human_message: Option<String>,
    pub acknowledge_by: Option<chrono::NaiveDateTime>,
    pub acknowledged_at: Option<chrono::NaiveDateTime>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl From<alert::Model> for AlertResponse {
    fn from(model: alert::Model) -> Self {
        Self {
            id: model.id,
            signal_id: model.signal_id,
            status: model.status,
            verdict: model.verdict,
            likelihood: model.likelihood,
            confidence: model.confidence,
            severity: model.severity,
            attention_state: model.attention_state,
            notification_status: model.notification_status,
            human_message: model.human_message,
            acknowledge_by: model.acknowledge_by,
            acknowledged_at: model.acknowledged_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub struct ListAlertsQuery {
    pub status: Option<String>,
    pub severity: Option<String>,
}

// GET /alerts - tenant-scoped, newest first
pub async fn list_alerts(
    Extension(db): Extension<DatabaseConnection>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<ListAlertsQuery>,
) -> impl IntoResponse {
    let mut find = Alert::find()
        .filter(alert::Column::TenantId.eq(ctx.tenant_id))
        .order_by_desc(alert::Column::CreatedAt);
    if let Some(status) = &query.status {
        find = find.filter(alert::Column::Status.eq(status));
    }
    if let Some(severity) = &query.severity {
        find = find.filter(alert::Column::Severity.eq(severity));
    }

    match find.all(&db).await {
        Ok(alerts) => {
            let response: Vec<AlertResponse> = alerts.into_iter().map(Into::into).collect();
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!("Failed to list alerts: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to list alerts").into_response()
        }
    }
}

// GET /alerts/:id
pub async fn get_alert(
    Extension(db): Extension<DatabaseConnection>,
    Extension(ctx): Extension<TenantContext>,
    Path(alert_id): Path<Uuid>,
) -> impl IntoResponse {
    match Alert::find_by_id(alert_id)
        .filter(alert::Column::TenantId.eq(ctx.tenant_id))
        .one(&db)
        .await
    {
        Ok(Some(alert)) => {
            let response: AlertResponse = alert.into();
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "Alert not found").into_response(),
        Err(e) => {
            error!("Failed to fetch alert: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        }
    }
}

// POST /alerts/:id/acknowledge - stop the acknowledgement SLA clock
pub async fn acknowledge_alert(
    Extension(db): Extension<DatabaseConnection>,
    Extension(ctx): Extension<TenantContext>,
    Path(alert_id): Path<Uuid>,
) -> impl IntoResponse {
    let alert = match Alert::find_by_id(alert_id)
        .filter(alert::Column::TenantId.eq(ctx.tenant_id))
        .one(&db)
        .await
    {
        Ok(Some(a)) => a,
        Ok(None) => return (StatusCode::NOT_FOUND, "Alert not found").into_response(),
        Err(e) => {
            error!("Failed to fetch alert: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    if alert.acknowledged_at.is_some() {
        return (
            StatusCode::OK,
            Json(serde_json::json!({"status": "already acknowledged"})),
        )
            .into_response();
    }

    let now = chrono::Utc::now().naive_utc();
    let ack_seconds = (now - alert.created_at).num_seconds().max(0) as f64;

    let mut active: alert::ActiveModel = alert.into();
    active.acknowledged_at = Set(Some(now));
    active.attention_state = Set(AttentionState::Acknowledged.as_str().to_string());
    active.updated_at = Set(now);

    match active.update(&db).await {
        Ok(_) => {
            crate::metrics::record_acknowledgment_time(ack_seconds);
            (
                StatusCode::OK,
                Json(serde_json::json!({"status": "acknowledged"})),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to acknowledge alert: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update alert").into_response()
        }
    }
}
