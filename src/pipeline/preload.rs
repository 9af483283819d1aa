use crate::entities::signal;
use crate::provider::{SafetyEvent, TelemetryApi, TimeWindow, Trip, VehicleStats};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;

/// How far back the first investigation pass looks.
pub const CONTEXT_WINDOW_HOURS: i64 = 12;

/// Bounded provider context handed to the AI. Missing pieces degrade to
/// empty collections; `partial` flags that some read failed so the AI can
/// weight its confidence.
#[derive(Debug, Default, Serialize)]
pub struct PreloadedContext {
    pub vehicle_stats: Vec<VehicleStats>,
    pub recent_safety_events: Vec<SafetyEvent>,
    pub trips: Vec<Trip>,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub partial: bool,
}

impl PreloadedContext {
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

/// First-pass context: a window reaching back from the signal.
pub async fn load_context(
    provider: &dyn TelemetryApi,
    token: Option<&str>,
    signal: &signal::Model,
) -> PreloadedContext {
    let end = Utc::now();
    let start = signal.occurred_at.and_utc() - Duration::hours(CONTEXT_WINDOW_HOURS);
    load_window(provider, token, signal, TimeWindow { start, end }).await
}

/// Revalidation context: only what changed since the last check.
pub async fn load_incremental(
    provider: &dyn TelemetryApi,
    token: Option<&str>,
    signal: &signal::Model,
    since: DateTime<Utc>,
) -> PreloadedContext {
    let window = TimeWindow {
        start: since,
        end: Utc::now(),
    };
    load_window(provider, token, signal, window).await
}

async fn load_window(
    provider: &dyn TelemetryApi,
    token: Option<&str>,
    signal: &signal::Model,
    window: TimeWindow,
) -> PreloadedContext {
    let mut context = PreloadedContext {
        window_start: Some(window.start),
        window_end: Some(window.end),
        ..Default::default()
    };

    let Some(token) = token else {
        warn!(
            "No provider token configured for tenant {}; preloading empty context",
            signal.tenant_id
        );
        context.partial = true;
        return context;
    };

    let vehicle_ids = vec![signal.vehicle_id.clone()];

    match provider.vehicle_stats(token, &vehicle_ids).await {
        Ok(stats) => context.vehicle_stats = stats,
        Err(e) => {
            warn!("Vehicle stats preload failed: {}", e);
            context.partial = true;
        }
    }

    match provider.safety_events(token, &vehicle_ids, window).await {
        Ok(events) => context.recent_safety_events = events,
        Err(e) => {
            warn!("Safety events preload failed: {}", e);
            context.partial = true;
        }
    }

    match provider.trips(token, &vehicle_ids, window).await {
        Ok(trips) => context.trips = trips,
        Err(e) => {
            warn!("Trips preload failed: {}", e);
            context.partial = true;
        }
    }

    context
}
