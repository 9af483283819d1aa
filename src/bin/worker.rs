use fleetguard_server::ai::HttpAiClient;
use fleetguard_server::attention::{AttentionEngine, NoopAttention, SlaAttention};
use fleetguard_server::billing::events::{DbEventSink, PubSubPublisher};
use fleetguard_server::billing::DbUsageRecorder;
use fleetguard_server::notifications::TwilioCarrier;
use fleetguard_server::pipeline::{media::MediaStore, AlertProcessor};
use fleetguard_server::provider::HttpTelemetryClient;
use fleetguard_server::sync_cursors::RedisSyncCursors;
use fleetguard_server::worker;
use sea_orm::Database;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // Load .env if present (dotenvy)
    dotenvy::dotenv().ok();

    fleetguard_server::telemetry::init_telemetry("fleetguard-worker");

    let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();

    // Spawn metrics server
    tokio::spawn(async move {
        let app = axum::Router::new()
            .route(
                "/metrics",
                axum::routing::get(|| async move { metric_handle.render() }),
            )
            .layer(prometheus_layer);
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], 9091));
        tracing::info!("Metrics server listening on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    });

    // Database Connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Redis Connection
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let redis_client = Arc::new(redis::Client::open(redis_url).expect("Invalid Redis URL"));

    // GCS client for evidence media; the pipeline runs without it.
    let media = match google_cloud_storage::client::ClientConfig::default()
        .with_auth()
        .await
    {
        Ok(config) => {
            let gcs = google_cloud_storage::client::Client::new(config);
            Some(Arc::new(MediaStore::new(gcs)))
        }
        Err(e) => {
            tracing::warn!("GCS auth unavailable, media persistence disabled: {}", e);
            None
        }
    };

    // Pub/Sub publisher for domain events; DB rows are the source of truth.
    let publisher = match PubSubPublisher::new().await {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!("Pub/Sub unavailable, domain events stay DB-only: {}", e);
            None
        }
    };

    let events = Arc::new(DbEventSink::new(db.clone(), publisher));

    let attention: Arc<dyn AttentionEngine> =
        match std::env::var("ATTENTION_ENGINE").as_deref() {
            Ok("off") => {
                tracing::info!("Attention engine disabled by configuration");
                Arc::new(NoopAttention)
            }
            _ => Arc::new(SlaAttention::new(db.clone(), events.clone())),
        };

    let processor = Arc::new(AlertProcessor {
        db: db.clone(),
        redis: redis_client.clone(),
        ai: Arc::new(HttpAiClient::new()),
        provider: Arc::new(HttpTelemetryClient::new()),
        carrier: Arc::new(TwilioCarrier::new()),
        media,
        attention: attention.clone(),
        usage: Arc::new(DbUsageRecorder::new(db.clone())),
        events,
        cursors: Arc::new(RedisSyncCursors::new(redis_client.clone())),
    });

    let shutdown = CancellationToken::new();

    tracing::info!("Starting background worker...");

    worker::start_queue_monitor(redis_client.clone(), shutdown.clone()).await;
    worker::start_process_workers(redis_client.clone(), processor.clone(), 3, shutdown.clone())
        .await;
    worker::start_revalidation_poller(redis_client.clone(), processor.clone(), shutdown.clone())
        .await;
    worker::start_attention_sweep(attention, 60, shutdown.clone()).await;

    // Keep the main process alive
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Shutting down worker process");
            shutdown.cancel();
        }
        Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
    }
}
