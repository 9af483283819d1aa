use crate::entities::domain_event;
use crate::error::Result;
use async_trait::async_trait;
use google_cloud_googleapis::pubsub::v1::PubsubMessage;
use google_cloud_pubsub::client::{Client, ClientConfig};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use std::env;
use tracing::{error, info};
use uuid::Uuid;

pub const EVENT_PROCESSING_STARTED: &str = "processing_started";
pub const EVENT_INVESTIGATING: &str = "investigating";
pub const EVENT_COMPLETED: &str = "completed";
pub const EVENT_PROCESSING_FAILED: &str = "processing_failed";
pub const EVENT_NOTIFICATIONS_ESCALATED: &str = "notifications_escalated";
pub const EVENT_ATTENTION_ESCALATED: &str = "attention_escalated";

/// Audit side-channel. Appends one immutable record per significant
/// transition; best-effort, never required for state-machine correctness.
#[async_trait]
pub trait DomainEventSink: Send + Sync {
    async fn emit(
        &self,
        tenant_id: Uuid,
        alert_id: Option<Uuid>,
        event_type: &str,
        payload: Value,
    ) -> Result<()>;
}

pub struct NoopEvents;

#[async_trait]
impl DomainEventSink for NoopEvents {
    async fn emit(&self, _: Uuid, _: Option<Uuid>, _: &str, _: Value) -> Result<()> {
        Ok(())
    }
}

/// Publishes domain events to a Pub/Sub topic for downstream consumers.
#[derive(Clone)]
pub struct PubSubPublisher {
    client: Client,
    topic_name: String,
}

impl PubSubPublisher {
    pub async fn new() -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let config = ClientConfig::default().with_auth().await?;
        let client = Client::new(config).await?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "preview".to_string());
        let topic_name = format!("alert-events-topic-{}", environment);

        Ok(Self { client, topic_name })
    }

    pub async fn publish(&self, payload: &Value) {
        let topic = self.client.topic(&self.topic_name);
        let publisher = topic.new_publisher(None);

        let data = match serde_json::to_string(payload) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to serialize domain event: {}", e);
                return;
            }
        };

        let message = PubsubMessage {
            data: data.into_bytes(),
            ..Default::default()
        };

        let awaiter = publisher.publish(message).await;
        match awaiter.get().await {
            Ok(id) => info!("Published domain event to Pub/Sub: message_id={}", id),
            Err(e) => error!("Failed to publish domain event: {}", e),
        }
    }
}

pub struct DbEventSink {
    db: DatabaseConnection,
    publisher: Option<PubSubPublisher>,
}

impl DbEventSink {
    pub fn new(db: DatabaseConnection, publisher: Option<PubSubPublisher>) -> Self {
        Self { db, publisher }
    }
}

#[async_trait]
impl DomainEventSink for DbEventSink {
    async fn emit(
        &self,
        tenant_id: Uuid,
        alert_id: Option<Uuid>,
        event_type: &str,
        payload: Value,
    ) -> Result<()> {
        let row = domain_event::ActiveModel {
            tenant_id: Set(tenant_id),
            alert_id: Set(alert_id),
            event_type: Set(event_type.to_string()),
            payload: Set(payload.clone()),
            created_at: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        };
        row.insert(&self.db).await?;

        if let Some(publisher) = &self.publisher {
            let envelope = serde_json::json!({
                "tenant_id": tenant_id,
                "alert_id": alert_id,
                "event_type": event_type,
                "payload": payload,
            });
            publisher.publish(&envelope).await;
        }
        Ok(())
    }
}
