use crate::api::middleware::TenantContext;
use crate::entities::{contact, Contact};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Deserialize)]
pub struct CreateContactRequest {
    pub contact_type: String,
    pub name: String,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub priority: Option<i32>,
    pub is_default: Option<bool>,
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateContactRequest {
    pub contact_type: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub priority: Option<i32>,
    pub is_default: Option<bool>,
    pub is_active: Option<bool>,
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct ContactResponse {
    pub id: i32,
    pub contact_type: String,
    pub name: String,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub priority: i32,
    pub is_default: bool,
    pub is_active: bool,
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl From<contact::Model> for ContactResponse {
    fn from(model: contact::Model) -> Self {
        Self {
            id: model.id,
            contact_type: model.contact_type,
            name: model.name,
            phone: model.phone,
            whatsapp: model.whatsapp,
            email: model.email,
            priority: model.priority,
            is_default: model.is_default,
            is_active: model.is_active,
            vehicle_id: model.vehicle_id,
            driver_id: model.driver_id,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

const KNOWN_CONTACT_TYPES: &[&str] = &[
    "operator",
    "monitoring_team",
    "supervisor",
    "emergency",
    "dispatch",
];

// GET /contacts
pub async fn list_contacts(
    Extension(db): Extension<DatabaseConnection>,
    Extension(ctx): Extension<TenantContext>,
) -> impl IntoResponse {
    match Contact::find()
        .filter(contact::Column::TenantId.eq(ctx.tenant_id))
        .all(&db)
        .await
    {
        Ok(contacts) => {
            let response: Vec<ContactResponse> = contacts.into_iter().map(Into::into).collect();
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!("Failed to fetch contacts: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch contacts").into_response()
        }
    }
}

// POST /contacts
pub async fn create_contact(
    Extension(db): Extension<DatabaseConnection>,
    Extension(ctx): Extension<TenantContext>,
    Json(payload): Json<CreateContactRequest>,
) -> impl IntoResponse {
    if !KNOWN_CONTACT_TYPES.contains(&payload.contact_type.as_str()) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "error": format!("unknown contact type '{}'", payload.contact_type)
            })),
        )
            .into_response();
    }

    let now = chrono::Utc::now().naive_utc();
    let active_model = contact::ActiveModel {
        tenant_id: Set(ctx.tenant_id),
        contact_type: Set(payload.contact_type),
        name: Set(payload.name),
        phone: Set(payload.phone),
        whatsapp: Set(payload.whatsapp),
        email: Set(payload.email),
        priority: Set(payload.priority.unwrap_or(0)),
        is_default: Set(payload.is_default.unwrap_or(false)),
        is_active: Set(true),
        vehicle_id: Set(payload.vehicle_id),
        driver_id: Set(payload.driver_id),
        notes: Set(payload.notes),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    match active_model.insert(&db).await {
        Ok(contact) => {
            info!("Created contact: {}", contact.id);
            let response: ContactResponse = contact.into();
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(e) => {
            error!("Failed to create contact: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create contact").into_response()
        }
    }
}

// PATCH /contacts/:id
pub async fn update_contact(
    Extension(db): Extension<DatabaseConnection>,
    Extension(ctx): Extension<TenantContext>,
    Path(contact_id): Path<i32>,
    Json(payload): Json<UpdateContactRequest>,
) -> impl IntoResponse {
    let contact = match Contact::find_by_id(contact_id)
        .filter(contact::Column::TenantId.eq(ctx.tenant_id))
        .one(&db)
        .await
    {
        Ok(Some(c)) => c,
        Ok(None) => return (StatusCode::NOT_FOUND, "Contact not found").into_response(),
        Err(e) => {
            error!("Failed to fetch contact: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    let mut active_model: contact::ActiveModel = contact.into();

    if let Some(contact_type) = payload.contact_type {
        if !KNOWN_CONTACT_TYPES.contains(&contact_type.as_str()) {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({
                    "error": format!("unknown contact type '{contact_type}'")
                })),
            )
                .into_response();
        }
        active_model.contact_type = Set(contact_type);
    }
    if let Some(name) = payload.name {
        active_model.name = Set(name);
    }
    if let Some(phone) = payload.phone {
        active_model.phone = Set(Some(phone));
    }
    if let Some(whatsapp) = payload.whatsapp {
        active_model.whatsapp = Set(Some(whatsapp));
    }
    if let Some(email) = payload.email {
        active_model.email = Set(Some(email));
    }
    if let Some(priority) = payload.priority {
        active_model.priority = Set(priority);
    }
    if let Some(is_default) = payload.is_default {
        active_model.is_default = Set(is_default);
    }
    if let Some(is_active) = payload.is_active {
        active_model.is_active = Set(is_active);
    }
    if let Some(vehicle_id) = payload.vehicle_id {
        active_model.vehicle_id = Set(Some(vehicle_id));
    }
    if let Some(driver_id) = payload.driver_id {
        active_model.driver_id = Set(Some(driver_id));
    }
    if let Some(notes) = payload.notes {
        active_model.notes = Set(Some(notes));
    }
    active_model.updated_at = Set(chrono::Utc::now().naive_utc());

    match active_model.update(&db).await {
        Ok(contact) => {
            info!("Updated contact: {}", contact.id);
            let response: ContactResponse = contact.into();
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!("Failed to update contact: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update contact").into_response()
        }
    }
}

// DELETE /contacts/:id
pub async fn delete_contact(
    Extension(db): Extension<DatabaseConnection>,
    Extension(ctx): Extension<TenantContext>,
    Path(contact_id): Path<i32>,
) -> impl IntoResponse {
    let contact = match Contact::find_by_id(contact_id)
        .filter(contact::Column::TenantId.eq(ctx.tenant_id))
        .one(&db)
        .await
    {
        Ok(Some(c)) => c,
        Ok(None) => return (StatusCode::NOT_FOUND, "Contact not found").into_response(),
        Err(e) => {
            error!("Failed to fetch contact: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    match contact.delete(&db).await {
        Ok(_) => {
            info!("Deleted contact: {}", contact_id);
            (
                StatusCode::OK,
                Json(serde_json::json!({"message": "Contact deleted"})),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to delete contact: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete contact").into_response()
        }
    }
}
