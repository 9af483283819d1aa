use crate::entities::{notification_delivery_event, notification_result};
use crate::error::Result;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde_json::Value;

/// Delivery lattice for a notification attempt. Success states advance
/// `queued < sending < sent < delivered < read`; `failed`/`undelivered`
/// are terminal and reachable from any pre-delivery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Queued,
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
    Undelivered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Queued => "queued",
            DeliveryStatus::Sending => "sending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Undelivered => "undelivered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(DeliveryStatus::Queued),
            "sending" => Some(DeliveryStatus::Sending),
            "sent" => Some(DeliveryStatus::Sent),
            "delivered" => Some(DeliveryStatus::Delivered),
            "read" => Some(DeliveryStatus::Read),
            "failed" => Some(DeliveryStatus::Failed),
            "undelivered" => Some(DeliveryStatus::Undelivered),
            _ => None,
        }
    }

    /// Map a carrier callback status (message or call vocabulary) onto the
    /// lattice. Unknown statuses map to nothing and are logged upstream.
    pub fn parse_provider(value: &str) -> Option<Self> {
        match value {
            "accepted" | "queued" | "initiated" => Some(DeliveryStatus::Queued),
            "sending" | "ringing" => Some(DeliveryStatus::Sending),
            "sent" | "in-progress" => Some(DeliveryStatus::Sent),
            "delivered" | "completed" => Some(DeliveryStatus::Delivered),
            "read" => Some(DeliveryStatus::Read),
            "failed" | "canceled" => Some(DeliveryStatus::Failed),
            "undelivered" | "busy" | "no-answer" => Some(DeliveryStatus::Undelivered),
            _ => Self::parse(value),
        }
    }

    fn success_rank(&self) -> Option<u8> {
        match self {
            DeliveryStatus::Queued => Some(0),
            DeliveryStatus::Sending => Some(1),
            DeliveryStatus::Sent => Some(2),
            DeliveryStatus::Delivered => Some(3),
            DeliveryStatus::Read => Some(4),
            DeliveryStatus::Failed | DeliveryStatus::Undelivered => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.success_rank().is_none()
    }

    /// A delivered or read attempt is settled; a failure state is final.
    pub fn is_terminal(&self) -> bool {
        match self.success_rank() {
            Some(rank) => rank >= 3,
            None => true,
        }
    }

    /// Whether a callback carrying `incoming` may replace `current`.
    /// Forward progress only; stale or out-of-order callbacks are rejected.
    pub fn accepts(current: DeliveryStatus, incoming: DeliveryStatus) -> bool {
        if current.is_terminal() {
            return false;
        }
        if incoming.is_failure() {
            return true;
        }
        match (current.success_rank(), incoming.success_rank()) {
            (Some(cur), Some(new)) => new > cur,
            _ => false,
        }
    }
}

pub enum CallbackOutcome {
    Applied(DeliveryStatus),
    Stale,
    UnknownSid,
    UnknownStatus,
}

/// Apply one carrier webhook callback. The delivery event row is appended
/// for every recognized callback, including stale ones the lattice
/// rejects; only accepted callbacks move `status_current`.
pub async fn record_delivery_callback(
    db: &DatabaseConnection,
    provider_sid: &str,
    provider_status: &str,
    raw: Value,
) -> Result<CallbackOutcome> {
    let Some(result) = notification_result::Entity::find()
        .filter(notification_result::Column::ProviderSid.eq(provider_sid))
        .one(db)
        .await?
    else {
        return Ok(CallbackOutcome::UnknownSid);
    };

    let Some(incoming) = DeliveryStatus::parse_provider(provider_status) else {
        return Ok(CallbackOutcome::UnknownStatus);
    };

    let now = chrono::Utc::now().naive_utc();
    let event = notification_delivery_event::ActiveModel {
        notification_result_id: Set(result.id),
        provider_status: Set(provider_status.to_string()),
        raw: Set(raw),
        received_at: Set(now),
        ..Default::default()
    };
    event.insert(db).await?;

    let current =
        DeliveryStatus::parse(&result.status_current).unwrap_or(DeliveryStatus::Queued);
    if !DeliveryStatus::accepts(current, incoming) {
        return Ok(CallbackOutcome::Stale);
    }

    let mut active: notification_result::ActiveModel = result.into();
    active.status_current = Set(incoming.as_str().to_string());
    active.updated_at = Set(now);
    active.update(db).await?;

    Ok(CallbackOutcome::Applied(incoming))
}

#[cfg(test)]
mod tests {
    use super::DeliveryStatus::*;
    use super::*;

    #[test]
    fn forward_progress_is_accepted() {
        assert!(DeliveryStatus::accepts(Queued, Sending));
        assert!(DeliveryStatus::accepts(Queued, Sent));
        assert!(DeliveryStatus::accepts(Sending, Sent));
        assert!(DeliveryStatus::accepts(Sent, Delivered));
        assert!(DeliveryStatus::accepts(Delivered, Read));
    }

    #[test]
    fn stale_callbacks_are_rejected() {
        // delivered + "sent" arriving late must be a no-op
        assert!(!DeliveryStatus::accepts(Delivered, Sent));
        assert!(!DeliveryStatus::accepts(Sent, Sent));
        assert!(!DeliveryStatus::accepts(Sent, Sending));
        assert!(!DeliveryStatus::accepts(Read, Delivered));
    }

    #[test]
    fn failure_reachable_from_any_pre_delivery_state() {
        assert!(DeliveryStatus::accepts(Queued, Failed));
        assert!(DeliveryStatus::accepts(Sending, Failed));
        assert!(DeliveryStatus::accepts(Sent, Undelivered));

        // settled attempts cannot fail retroactively
        assert!(!DeliveryStatus::accepts(Delivered, Failed));
        assert!(!DeliveryStatus::accepts(Failed, Sent));
        assert!(!DeliveryStatus::accepts(Undelivered, Failed));
    }

    #[test]
    fn provider_vocabulary_maps_onto_lattice() {
        assert_eq!(
            DeliveryStatus::parse_provider("completed"),
            Some(Delivered)
        );
        assert_eq!(DeliveryStatus::parse_provider("ringing"), Some(Sending));
        assert_eq!(DeliveryStatus::parse_provider("busy"), Some(Undelivered));
        assert_eq!(DeliveryStatus::parse_provider("nonsense"), None);
    }
}
