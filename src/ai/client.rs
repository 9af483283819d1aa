use crate::ai::decision::AiDecision;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

/// Investigation passes can take a while end to end on the service side.
const AI_TIMEOUT: Duration = Duration::from_secs(120);

/// The AI classification service, seam for the pipeline. Implementations
/// must map the service's failure shapes to the error taxonomy.
#[async_trait]
pub trait AiVerdictApi: Send + Sync {
    /// First-pass triage of a freshly ingested signal.
    async fn ingest(&self, api_key: &str, payload: Value) -> Result<AiDecision>;

    /// Follow-up pass for an alert under monitoring, carrying accumulated
    /// investigation history.
    async fn revalidate(&self, api_key: &str, payload: Value) -> Result<AiDecision>;
}

pub struct HttpAiClient {
    client: Client,
    base_url: String,
}

impl HttpAiClient {
    pub fn new() -> Self {
        let base_url =
            env::var("AI_SERVICE_URL").unwrap_or_else(|_| "http://ai-service:8080".to_string());
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(AI_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, base_url }
    }

    async fn call(&self, path: &str, api_key: &str, payload: Value) -> Result<AiDecision> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);

        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&json!({ "payload": payload }))
            .send()
            .await?;

        let status = res.status();
        let body: Value = res.json().await.map_err(|e| {
            PipelineError::Validation(format!("AI service returned a non-JSON body: {e}"))
        })?;

        if status == StatusCode::SERVICE_UNAVAILABLE {
            // Backpressure shape: {"error": "At capacity", "stats": {"active_requests": N}}
            let active_requests = body.pointer("/stats/active_requests").and_then(Value::as_u64);
            crate::metrics::increment_ai_errors("capacity");
            return Err(PipelineError::Capacity { active_requests });
        }

        if !status.is_success() {
            crate::metrics::increment_ai_errors("http");
            return Err(PipelineError::AiPipeline(format!(
                "unexpected status {status} from AI service"
            )));
        }

        AiDecision::from_response(body)
    }

    /// One-shot analysis outside the alert lifecycle. Exposed for the
    /// chat-assistant surface; the pipeline never calls it.
    pub async fn on_demand_analysis(&self, api_key: &str, payload: Value) -> Result<Value> {
        let url = format!("{}/analysis/on-demand", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&json!({ "payload": payload }))
            .send()
            .await?;

        let status = res.status();
        let body: Value = res.json().await.map_err(|e| {
            PipelineError::Validation(format!("AI service returned a non-JSON body: {e}"))
        })?;
        if !status.is_success() {
            return Err(PipelineError::AiPipeline(format!(
                "unexpected status {status} from AI service"
            )));
        }
        Ok(body)
    }
}

impl Default for HttpAiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiVerdictApi for HttpAiClient {
    async fn ingest(&self, api_key: &str, payload: Value) -> Result<AiDecision> {
        self.call("/alerts/ingest", api_key, payload).await
    }

    async fn revalidate(&self, api_key: &str, payload: Value) -> Result<AiDecision> {
        self.call("/alerts/revalidate", api_key, payload).await
    }
}
