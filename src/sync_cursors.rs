use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use std::sync::Arc;
use uuid::Uuid;

/// Tenant-scoped store of "last sync" timestamps, keyed by a scope string
/// (e.g. an alert id for revalidation context loads). Injected wherever
/// incremental provider reads happen.
#[async_trait]
pub trait SyncCursorStore: Send + Sync {
    async fn last_sync(&self, tenant_id: Uuid, scope: &str) -> Result<Option<DateTime<Utc>>>;
    async fn record_sync(&self, tenant_id: Uuid, scope: &str, at: DateTime<Utc>) -> Result<()>;
}

pub struct RedisSyncCursors {
    client: Arc<redis::Client>,
}

impl RedisSyncCursors {
    pub fn new(client: Arc<redis::Client>) -> Self {
        Self { client }
    }

    fn key(tenant_id: Uuid, scope: &str) -> String {
        format!("sync:{tenant_id}:{scope}")
    }
}

#[async_trait]
impl SyncCursorStore for RedisSyncCursors {
    async fn last_sync(&self, tenant_id: Uuid, scope: &str) -> Result<Option<DateTime<Utc>>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(Self::key(tenant_id, scope)).await?;
        Ok(raw
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    async fn record_sync(&self, tenant_id: Uuid, scope: &str, at: DateTime<Utc>) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set(Self::key(tenant_id, scope), at.to_rfc3339()).await?;
        Ok(())
    }
}
