use crate::notifications::delivery::{record_delivery_callback, CallbackOutcome};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Form};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use tracing::{info, warn};

/// Carrier status callback, form-encoded. Message and call callbacks
/// carry different field names; either pair identifies the attempt.
#[derive(Debug, Deserialize)]
pub struct CarrierStatusCallback {
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
    #[serde(rename = "MessageStatus")]
    pub message_status: Option<String>,
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
    #[serde(rename = "ErrorCode")]
    pub error_code: Option<String>,
}

impl CarrierStatusCallback {
    pub fn sid_and_status(&self) -> Option<(&str, &str)> {
        match (&self.message_sid, &self.message_status) {
            (Some(sid), Some(status)) => return Some((sid, status)),
            _ => {}
        }
        match (&self.call_sid, &self.call_status) {
            (Some(sid), Some(status)) => Some((sid, status)),
            _ => None,
        }
    }
}

// POST /webhooks/carrier/status - always 200 so the carrier stops
// retrying; anything unusable is logged and dropped.
pub async fn carrier_status(
    Extension(db): Extension<DatabaseConnection>,
    Form(callback): Form<CarrierStatusCallback>,
) -> impl IntoResponse {
    let Some((sid, status)) = callback.sid_and_status() else {
        warn!("Carrier callback without sid/status pair: {:?}", callback);
        return (StatusCode::OK, "ignored");
    };

    let raw = serde_json::json!({
        "sid": sid,
        "status": status,
        "error_code": callback.error_code,
    });

    match record_delivery_callback(&db, sid, status, raw).await {
        Ok(CallbackOutcome::Applied(new_status)) => {
            info!("Delivery status for {} -> {}", sid, new_status.as_str());
            (StatusCode::OK, "ok")
        }
        Ok(CallbackOutcome::Stale) => {
            info!("Stale carrier callback for {} ({}), ignored", sid, status);
            (StatusCode::OK, "stale")
        }
        Ok(CallbackOutcome::UnknownSid) => {
            warn!("Carrier callback for unknown sid {}", sid);
            (StatusCode::OK, "unknown sid")
        }
        Ok(CallbackOutcome::UnknownStatus) => {
            warn!("Carrier callback with unknown status '{}'", status);
            (StatusCode::OK, "unknown status")
        }
        Err(e) => {
            warn!("Failed to apply carrier callback for {}: {}", sid, e);
            (StatusCode::OK, "error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_and_call_shapes_both_parse() {
        let message: CarrierStatusCallback = serde_urlencoded::from_str(
            "MessageSid=SM123&MessageStatus=delivered",
        )
        .unwrap();
        assert_eq!(message.sid_and_status(), Some(("SM123", "delivered")));

        let call: CarrierStatusCallback =
            serde_urlencoded::from_str("CallSid=CA9&CallStatus=completed").unwrap();
        assert_eq!(call.sid_and_status(), Some(("CA9", "completed")));

        let neither: CarrierStatusCallback = serde_urlencoded::from_str("Foo=bar").unwrap();
        assert!(neither.sid_and_status().is_none());
    }
}
