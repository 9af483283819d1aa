use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::time::Duration;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VehicleStats {
    pub vehicle_id: String,
    pub speed_kph: Option<f64>,
    pub odometer_meters: Option<i64>,
    pub fuel_percent: Option<f64>,
    pub location: Option<serde_json::Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SafetyEvent {
    pub id: String,
    pub vehicle_id: String,
    /// Provider behavior key, e.g. "harsh_brake".
    pub behavior: String,
    pub occurred_at: DateTime<Utc>,
    pub description: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Trip {
    pub id: String,
    pub vehicle_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub distance_meters: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Page<T> {
    #[serde(default)]
    data: Vec<T>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    end_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

/// Read-only telemetry provider endpoints the pipeline consumes.
#[async_trait]
pub trait TelemetryApi: Send + Sync {
    async fn vehicle_stats(&self, token: &str, vehicle_ids: &[String]) -> Result<Vec<VehicleStats>>;

    async fn safety_events(
        &self,
        token: &str,
        vehicle_ids: &[String],
        window: TimeWindow,
    ) -> Result<Vec<SafetyEvent>>;

    async fn trips(
        &self,
        token: &str,
        vehicle_ids: &[String],
        window: TimeWindow,
    ) -> Result<Vec<Trip>>;
}

pub struct HttpTelemetryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTelemetryClient {
    pub fn new() -> Self {
        let base_url = env::var("TELEMETRY_PROVIDER_URL")
            .unwrap_or_else(|_| "https://api.telemetry.example.com".to_string());
        let client = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, base_url }
    }

    /// Follow `after` cursors until the provider reports no further page.
    async fn get_pages<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).bearer_auth(token).query(query);
            if let Some(after) = &cursor {
                request = request.query(&[("after", after.as_str())]);
            }

            let res = request.send().await?;
            let status = res.status();
            if !status.is_success() {
                return Err(PipelineError::Provider(format!(
                    "provider returned {status} for {path}"
                )));
            }

            let page: Page<T> = res
                .json()
                .await
                .map_err(|e| PipelineError::Provider(format!("unreadable page for {path}: {e}")))?;
            records.extend(page.data);

            match (page.pagination.has_next_page, page.pagination.end_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }
}

impl Default for HttpTelemetryClient {
    fn default() -> Self {
        Self::new()
    }
}

fn ids_param(vehicle_ids: &[String]) -> (String, String) {
    ("vehicleIds".to_string(), vehicle_ids.join(","))
}

fn window_params(window: TimeWindow) -> [(String, String); 2] {
    [
        ("startTime".to_string(), window.start.to_rfc3339()),
        ("endTime".to_string(), window.end.to_rfc3339()),
    ]
}

#[async_trait]
impl TelemetryApi for HttpTelemetryClient {
    async fn vehicle_stats(&self, token: &str, vehicle_ids: &[String]) -> Result<Vec<VehicleStats>> {
        let query = vec![ids_param(vehicle_ids)];
        let stats = self.get_pages(token, "/fleet/vehicles/stats", &query).await?;
        Ok(retain_requested(stats, vehicle_ids, |s: &VehicleStats| {
            &s.vehicle_id
        }))
    }

    async fn safety_events(
        &self,
        token: &str,
        vehicle_ids: &[String],
        window: TimeWindow,
    ) -> Result<Vec<SafetyEvent>> {
        let mut query = vec![ids_param(vehicle_ids)];
        query.extend(window_params(window));
        let events = self.get_pages(token, "/fleet/safety-events", &query).await?;
        Ok(retain_requested(events, vehicle_ids, |e: &SafetyEvent| {
            &e.vehicle_id
        }))
    }

    async fn trips(
        &self,
        token: &str,
        vehicle_ids: &[String],
        window: TimeWindow,
    ) -> Result<Vec<Trip>> {
        let mut query = vec![ids_param(vehicle_ids)];
        query.extend(window_params(window));
        let trips = self.get_pages(token, "/fleet/trips", &query).await?;
        Ok(retain_requested(trips, vehicle_ids, |t: &Trip| &t.vehicle_id))
    }
}

/// Provider responses may carry records outside the requested id set;
/// callers must not trust server-side filtering.
pub fn retain_requested<T, F>(records: Vec<T>, requested: &[String], id_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
    records.into_iter().filter(|r| wanted.contains(id_of(r))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(id: &str, vehicle_id: &str) -> SafetyEvent {
        SafetyEvent {
            id: id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            behavior: "harsh_brake".to_string(),
            occurred_at: Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
            description: None,
            media_urls: Vec::new(),
        }
    }

    #[test]
    fn drops_records_outside_requested_ids() {
        let requested = vec!["veh-1".to_string(), "veh-2".to_string()];
        let records = vec![
            event("e1", "veh-1"),
            event("e2", "veh-9"),
            event("e3", "veh-2"),
        ];

        let kept = retain_requested(records, &requested, |e| &e.vehicle_id);
        let ids: Vec<&str> = kept.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e3"]);
    }

    #[test]
    fn empty_request_set_keeps_nothing() {
        let kept = retain_requested(vec![event("e1", "veh-1")], &[], |e| &e.vehicle_id);
        assert!(kept.is_empty());
    }
}
