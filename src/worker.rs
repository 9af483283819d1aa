use crate::attention::AttentionEngine;
use crate::pipeline::{AlertProcessor, ProcessAlertRequest, RevalidateRequest};
use crate::queue::{self, AlertJob, PROCESS_QUEUE, REVALIDATE_ZSET};
use redis::AsyncCommands;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

// Queue Monitoring
pub async fn start_queue_monitor(redis_client: Arc<redis::Client>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        tracing::info!("Queue Monitor started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            match redis_client.get_multiplexed_async_connection().await {
                Ok(mut conn) => {
                    let process_len: redis::RedisResult<u64> = conn.llen(PROCESS_QUEUE).await;
                    match process_len {
                        Ok(len) => metrics::gauge!("fleetguard_queue_depth", "queue" => "process")
                            .set(len as f64),
                        Err(e) => tracing::error!("Failed to get process queue len: {}", e),
                    }

                    let revalidate_len: redis::RedisResult<u64> =
                        conn.zcard(REVALIDATE_ZSET).await;
                    match revalidate_len {
                        Ok(len) => {
                            metrics::gauge!("fleetguard_queue_depth", "queue" => "revalidate")
                                .set(len as f64)
                        }
                        Err(e) => tracing::error!("Failed to get revalidate zset card: {}", e),
                    }
                }
                Err(e) => {
                    tracing::error!("Queue Monitor: Failed to get redis conn: {}", e);
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(15)) => {}
            }
        }
        tracing::info!("Queue Monitor stopped");
    });
}

pub async fn start_process_workers(
    redis_client: Arc<redis::Client>,
    processor: Arc<AlertProcessor>,
    concurrency: usize,
    shutdown: CancellationToken,
) {
    for i in 0..concurrency {
        let redis_client = redis_client.clone();
        let processor = processor.clone();
        let shutdown = shutdown.clone();

        tokio::spawn(async move {
            tracing::info!("Worker {} started", i);
            loop {
                if shutdown.is_cancelled() {
                    break;
                }
                let mut conn = match redis_client.get_multiplexed_async_connection().await {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!("Worker {}: Failed to get redis conn: {}", i, e);
                        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                // Bounded BLPOP so shutdown is noticed between jobs.
                let result: redis::RedisResult<Option<(String, String)>> =
                    conn.blpop(PROCESS_QUEUE, 5.0).await;

                match result {
                    Ok(Some((_key, payload_str))) => {
                        handle_process_job(&processor, &mut conn, &payload_str, i).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!("Worker {}: Redis error: {}", i, e);
                        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                    }
                }
            }
            tracing::info!("Worker {} stopped", i);
        });
    }
}

async fn handle_process_job(
    processor: &AlertProcessor,
    conn: &mut redis::aio::MultiplexedConnection,
    payload_str: &str,
    worker_id: usize,
) {
    let job: AlertJob = match serde_json::from_str(payload_str) {
        Ok(job) => job,
        Err(e) => {
            tracing::error!("Worker {}: Bad payload: {}", worker_id, e);
            return;
        }
    };

    let span = tracing::info_span!(
        "process_alert_job",
        "otel.name" = "process_alert_job",
        alert_id = ?job.alert_id,
        tenant_id = ?job.tenant_id
    );
    span.set_parent(job.parent_context());

    async {
        tracing::info!("Dequeued alert {} from {}", job.alert_id, PROCESS_QUEUE);

        match queue::acquire_alert_lock(conn, job.alert_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("Alert {} already in flight elsewhere, skipping", job.alert_id);
                return;
            }
            Err(e) => {
                tracing::error!("Failed to acquire lock for alert {}: {}", job.alert_id, e);
                return;
            }
        }

        let request = ProcessAlertRequest {
            alert_id: job.alert_id,
            tenant_id: job.tenant_id,
        };
        if let Err(e) = processor.process(request).await {
            tracing::error!("Alert {} processing ended in failure: {}", job.alert_id, e);
        }

        if let Err(e) = queue::release_alert_lock(conn, job.alert_id).await {
            tracing::warn!("Failed to release lock for alert {}: {}", job.alert_id, e);
        }
    }
    .instrument(span)
    .await;
}

/// Poll the delayed-dispatch zset for due revalidations.
pub async fn start_revalidation_poller(
    redis_client: Arc<redis::Client>,
    processor: Arc<AlertProcessor>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        tracing::info!("Revalidation poller started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            let mut conn = match redis_client.get_multiplexed_async_connection().await {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Revalidation poller: Failed to get redis conn: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            match queue::claim_due_revalidations(&mut conn, chrono::Utc::now(), 10).await {
                Ok(jobs) => {
                    let drained = jobs.len();
                    for job in jobs {
                        handle_revalidation_job(&processor, &mut conn, job).await;
                    }
                    // Keep draining without sleeping while the backlog is deep.
                    if drained >= 10 {
                        continue;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to claim due revalidations: {}", e);
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(5)) => {}
            }
        }
        tracing::info!("Revalidation poller stopped");
    });
}

async fn handle_revalidation_job(
    processor: &AlertProcessor,
    conn: &mut redis::aio::MultiplexedConnection,
    job: AlertJob,
) {
    let span = tracing::info_span!(
        "revalidate_alert_job",
        "otel.name" = "revalidate_alert_job",
        alert_id = ?job.alert_id,
        tenant_id = ?job.tenant_id
    );
    span.set_parent(job.parent_context());

    async {
        match queue::acquire_alert_lock(conn, job.alert_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(
                    "Alert {} already in flight, deferring revalidation",
                    job.alert_id
                );
                // Push the dispatch back a minute rather than dropping it.
                let due = chrono::Utc::now() + chrono::Duration::minutes(1);
                if let Err(e) = queue::schedule_revalidation(conn, &job, due).await {
                    tracing::error!("Failed to defer revalidation: {}", e);
                }
                return;
            }
            Err(e) => {
                tracing::error!("Failed to acquire lock for alert {}: {}", job.alert_id, e);
                return;
            }
        }

        let request = RevalidateRequest {
            alert_id: job.alert_id,
            tenant_id: job.tenant_id,
        };
        if let Err(e) = processor.revalidate(request).await {
            tracing::error!("Alert {} revalidation ended in failure: {}", job.alert_id, e);
        }

        if let Err(e) = queue::release_alert_lock(conn, job.alert_id).await {
            tracing::warn!("Failed to release lock for alert {}: {}", job.alert_id, e);
        }
    }
    .instrument(span)
    .await;
}

/// Independent periodic scan for overdue acknowledgement SLAs.
pub async fn start_attention_sweep(
    engine: Arc<dyn AttentionEngine>,
    interval_secs: u64,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        tracing::info!("Attention sweep started (every {}s)", interval_secs);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(interval_secs)) => {}
            }

            match engine.sweep().await {
                Ok(0) => {}
                Ok(count) => tracing::info!("Attention sweep escalated {} alerts", count),
                Err(e) => tracing::error!("Attention sweep failed: {}", e),
            }
        }
        tracing::info!("Attention sweep stopped");
    });
}
