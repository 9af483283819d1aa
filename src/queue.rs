use crate::error::Result;
use chrono::{DateTime, Utc};
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

pub const PROCESS_QUEUE: &str = "alerts:process";
pub const REVALIDATE_ZSET: &str = "alerts:revalidate";

/// Generous upper bound on one processing pass; a crashed worker's lock
/// expires rather than wedging the alert forever.
const ALERT_LOCK_TTL_SECS: u64 = 300;

/// Queue payload for both processing and revalidation dispatch. Carries
/// the producer's trace context so worker spans join the ingest trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertJob {
    pub alert_id: Uuid,
    pub tenant_id: Uuid,
    #[serde(default)]
    pub trace_context: HashMap<String, String>,
}

impl AlertJob {
    pub fn new(alert_id: Uuid, tenant_id: Uuid) -> Self {
        let mut carrier = HashMap::new();
        let propagator = TraceContextPropagator::new();
        propagator.inject_context(&tracing::Span::current().context(), &mut carrier);
        Self {
            alert_id,
            tenant_id,
            trace_context: carrier,
        }
    }

    pub fn parent_context(&self) -> opentelemetry::Context {
        TraceContextPropagator::new().extract(&self.trace_context)
    }
}

pub async fn enqueue_process(
    conn: &mut redis::aio::MultiplexedConnection,
    job: &AlertJob,
) -> Result<()> {
    let payload = serde_json::to_string(job).unwrap_or_default();
    let _: () = conn.rpush(PROCESS_QUEUE, payload).await?;
    Ok(())
}

pub async fn schedule_revalidation(
    conn: &mut redis::aio::MultiplexedConnection,
    job: &AlertJob,
    due_at: DateTime<Utc>,
) -> Result<()> {
    let payload = serde_json::to_string(job).unwrap_or_default();
    let _: () = conn
        .zadd(REVALIDATE_ZSET, payload, due_at.timestamp())
        .await?;
    Ok(())
}

/// Claim-by-delete over the revalidation zset: every polling worker sees
/// the due entries, but only the one whose ZREM returns 1 owns a job.
pub async fn claim_due_revalidations(
    conn: &mut redis::aio::MultiplexedConnection,
    now: DateTime<Utc>,
    limit: isize,
) -> Result<Vec<AlertJob>> {
    let due: Vec<String> = conn
        .zrangebyscore_limit(REVALIDATE_ZSET, "-inf", now.timestamp(), 0, limit)
        .await?;

    let mut claimed = Vec::new();
    for raw in due {
        let removed: i64 = conn.zrem(REVALIDATE_ZSET, &raw).await?;
        if removed != 1 {
            continue;
        }
        match serde_json::from_str::<AlertJob>(&raw) {
            Ok(job) => claimed.push(job),
            Err(e) => tracing::error!("Dropping unreadable revalidation entry: {}", e),
        }
    }
    Ok(claimed)
}

fn lock_key(alert_id: Uuid) -> String {
    format!("alert:lock:{alert_id}")
}

/// At most one processing or revalidation task in flight per alert.
pub async fn acquire_alert_lock(
    conn: &mut redis::aio::MultiplexedConnection,
    alert_id: Uuid,
) -> Result<bool> {
    let acquired: Option<String> = redis::cmd("SET")
        .arg(lock_key(alert_id))
        .arg("1")
        .arg("NX")
        .arg("EX")
        .arg(ALERT_LOCK_TTL_SECS)
        .query_async(conn)
        .await?;
    Ok(acquired.is_some())
}

pub async fn release_alert_lock(
    conn: &mut redis::aio::MultiplexedConnection,
    alert_id: Uuid,
) -> Result<()> {
    let _: () = conn.del(lock_key(alert_id)).await?;
    Ok(())
}
