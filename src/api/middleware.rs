use crate::config::TenantSettings;
use crate::entities::tenant;
use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use axum::{
    extract::{Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

/// Authenticated tenant identity, injected into request extensions for
/// every protected handler.
#[derive(Clone)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub settings: TenantSettings,
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "Unauthorized"})),
    )
        .into_response()
}

/// `X-Tenant-Id` + `X-Api-Key` header auth; the key is verified against
/// the tenant's argon2 hash.
pub async fn auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let Some(tenant_id) = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
    else {
        return unauthorized();
    };
    let Some(api_key) = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return unauthorized();
    };

    let tenant = match tenant::Entity::find_by_id(tenant_id).one(&db).await {
        Ok(Some(t)) if t.is_active => t,
        Ok(_) => return unauthorized(),
        Err(e) => {
            warn!("Tenant lookup failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Database error"})),
            )
                .into_response();
        }
    };

    let Ok(parsed_hash) = PasswordHash::new(&tenant.api_key_hash) else {
        warn!("Tenant {} has an unreadable API key hash", tenant_id);
        return unauthorized();
    };
    if Argon2::default()
        .verify_password(api_key.as_bytes(), &parsed_hash)
        .is_err()
    {
        return unauthorized();
    }

    let settings = match TenantSettings::from_value(&tenant.settings) {
        Ok(s) => s,
        Err(e) => {
            warn!("Tenant {} settings unreadable: {}", tenant_id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Tenant misconfigured"})),
            )
                .into_response();
        }
    };

    request.extensions_mut().insert(TenantContext {
        tenant_id,
        settings,
    });
    next.run(request).await
}
