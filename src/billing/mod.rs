pub mod events;

use crate::entities::usage_event;
use crate::error::Result;
use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, Set};
use uuid::Uuid;

pub const METER_ALERTS_PROCESSED: &str = "alerts_processed";
pub const METER_AI_TOKENS: &str = "ai_tokens";
pub const METER_NOTIFICATIONS_SENT: &str = "notifications_sent";

/// Idempotency key for one metered quantity. Redelivered jobs rebuild the
/// same key and collide on the unique column instead of double-counting.
pub fn usage_key(tenant_id: Uuid, meter: &str, entity_id: &str) -> String {
    format!("{tenant_id}:{meter}:{entity_id}")
}

/// Billing side-channel, invoked synchronously at completion points with
/// typed quantities. Selected at composition time: tenants with metering
/// disabled get the no-op.
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record(
        &self,
        tenant_id: Uuid,
        meter: &str,
        entity_id: &str,
        quantity: i64,
    ) -> Result<()>;
}

pub struct NoopUsage;

#[async_trait]
impl UsageRecorder for NoopUsage {
    async fn record(&self, _: Uuid, _: &str, _: &str, _: i64) -> Result<()> {
        Ok(())
    }
}

pub struct DbUsageRecorder {
    db: DatabaseConnection,
}

impl DbUsageRecorder {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UsageRecorder for DbUsageRecorder {
    async fn record(
        &self,
        tenant_id: Uuid,
        meter: &str,
        entity_id: &str,
        quantity: i64,
    ) -> Result<()> {
        let key = usage_key(tenant_id, meter, entity_id);
        let model = usage_event::ActiveModel {
            tenant_id: Set(tenant_id),
            meter: Set(meter.to_string()),
            idempotency_key: Set(key.clone()),
            quantity: Set(quantity),
            recorded_at: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        };

        let insert = usage_event::Entity::insert(model).on_conflict(
            OnConflict::column(usage_event::Column::IdempotencyKey)
                .do_nothing()
                .to_owned(),
        );

        match insert.exec(&self.db).await {
            Ok(_) => Ok(()),
            // Conflict on the key: this quantity was already recorded.
            Err(DbErr::RecordNotInserted) => {
                tracing::debug!("Usage event {} already recorded, skipping", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_pattern_is_tenant_meter_entity() {
        let tenant = Uuid::nil();
        assert_eq!(
            usage_key(tenant, METER_AI_TOKENS, "abc"),
            format!("{tenant}:ai_tokens:abc")
        );
    }

    #[test]
    fn token_and_processed_meters_use_independent_keys() {
        let tenant = Uuid::nil();
        let entity = "alert-1";
        assert_ne!(
            usage_key(tenant, METER_AI_TOKENS, entity),
            usage_key(tenant, METER_ALERTS_PROCESSED, entity)
        );
    }
}
