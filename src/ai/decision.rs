use crate::config::{Channel, RecipientKind};
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The AI's classification of the alert.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Assessment {
    pub verdict: String,
    pub likelihood: String,
    pub confidence: f64,
    pub reasoning: Option<String>,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    pub risk_escalation: Option<String>,
    #[serde(default)]
    pub requires_monitoring: bool,
    pub monitoring_reason: Option<String>,
    pub next_check_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AlertContext {
    pub alert_kind: Option<String>,
    pub triage_notes: Option<String>,
    #[serde(default)]
    pub investigation_plan: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotificationDecision {
    #[serde(default)]
    pub should_notify: bool,
    pub escalation_level: Option<String>,
    pub message_text: Option<String>,
    pub call_script: Option<String>,
    #[serde(default)]
    pub channels_to_use: Vec<Channel>,
    #[serde(default)]
    pub recipients: Vec<RecipientKind>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolRun {
    pub name: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentRun {
    pub name: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolRun>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Execution {
    pub total_tokens: Option<i64>,
    pub cost_estimate: Option<f64>,
    #[serde(default)]
    pub agents_executed: Vec<String>,
    #[serde(default)]
    pub agents: Vec<AgentRun>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CameraAnalysis {
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub summary: Option<String>,
}

/// Validated verdict returned by the AI service for one investigation pass.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiDecision {
    pub assessment: Assessment,
    #[serde(default)]
    pub alert_context: Option<AlertContext>,
    pub human_message: Option<String>,
    #[serde(default)]
    pub notification_decision: NotificationDecision,
    #[serde(default)]
    pub execution: Execution,
    #[serde(default)]
    pub camera_analysis: Option<CameraAnalysis>,
}

impl AiDecision {
    /// Map a raw response body to a decision, surfacing the service's
    /// in-band failure shape and rejecting verdict-less responses before
    /// any field is trusted.
    pub fn from_response(body: Value) -> Result<Self, PipelineError> {
        if body.get("status").and_then(Value::as_str) == Some("error") {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(PipelineError::AiPipeline(message));
        }

        let has_verdict = body
            .pointer("/assessment/verdict")
            .and_then(Value::as_str)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);
        if !has_verdict {
            return Err(PipelineError::Validation(
                "assessment is missing a verdict".into(),
            ));
        }

        serde_json::from_value(body)
            .map_err(|e| PipelineError::Validation(format!("malformed AI response: {e}")))
    }

    /// Every remote media URL the decision references, deduplicated:
    /// `camera_analysis.media_urls` plus anything nested under
    /// `execution.agents[].tools[].media_urls`.
    pub fn media_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        if let Some(camera) = &self.camera_analysis {
            urls.extend(camera.media_urls.iter().cloned());
        }
        for agent in &self.execution.agents {
            for tool in &agent.tools {
                urls.extend(tool.media_urls.iter().cloned());
            }
        }
        let mut seen = Vec::with_capacity(urls.len());
        for url in urls {
            if !seen.contains(&url) {
                seen.push(url);
            }
        }
        seen
    }

    pub fn next_check_minutes_or(&self, fallback: i64) -> i64 {
        self.assessment
            .next_check_minutes
            .filter(|m| *m > 0)
            .unwrap_or(fallback)
    }

    /// Snapshot appended to the investigation history on each pass.
    pub fn history_entry(&self, checked_at: chrono::NaiveDateTime) -> Value {
        serde_json::json!({
            "checked_at": checked_at.and_utc().to_rfc3339(),
            "verdict": self.assessment.verdict,
            "likelihood": self.assessment.likelihood,
            "confidence": self.assessment.confidence,
            "requires_monitoring": self.assessment.requires_monitoring,
            "monitoring_reason": self.assessment.monitoring_reason,
            "reasoning": self.assessment.reasoning,
        })
    }

    /// Recommended actions, investigation plan and camera analysis rolled
    /// into the `ai_actions` persistence shape.
    pub fn actions_snapshot(&self) -> Value {
        serde_json::json!({
            "recommended_actions": self.assessment.recommended_actions,
            "investigation_plan": self
                .alert_context
                .as_ref()
                .map(|c| c.investigation_plan.clone())
                .unwrap_or_default(),
            "camera_analysis": self.camera_analysis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn success_body() -> Value {
        json!({
            "assessment": {
                "verdict": "confirmed_violation",
                "likelihood": "high",
                "confidence": 0.92,
                "reasoning": "Driver visibly distracted across frames.",
                "recommended_actions": ["contact driver"],
                "risk_escalation": "high",
                "requires_monitoring": false
            },
            "alert_context": {
                "alert_kind": "distracted_driving",
                "triage_notes": "camera footage conclusive",
                "investigation_plan": []
            },
            "human_message": "Distracted driving confirmed for vehicle 42.",
            "notification_decision": {
                "should_notify": true,
                "escalation_level": "high",
                "message_text": "Distracted driving confirmed.",
                "channels_to_use": ["sms", "whatsapp"],
                "recipients": ["supervisor"],
                "reason": "high-confidence confirmed violation"
            },
            "execution": {
                "total_tokens": 18234,
                "cost_estimate": 0.11,
                "agents_executed": ["triage", "camera"],
                "agents": [
                    { "name": "camera", "tools": [
                        { "name": "frame_grab", "media_urls": ["https://cdn.example.com/f1.jpg"] }
                    ]}
                ]
            },
            "camera_analysis": {
                "media_urls": ["https://cdn.example.com/clip.mp4"],
                "summary": "phone in hand"
            }
        })
    }

    #[test]
    fn parses_success_shape() {
        let decision = AiDecision::from_response(success_body()).unwrap();
        assert_eq!(decision.assessment.verdict, "confirmed_violation");
        assert!(!decision.assessment.requires_monitoring);
        assert!(decision.notification_decision.should_notify);
        assert_eq!(
            decision.notification_decision.channels_to_use,
            vec![Channel::Sms, Channel::Whatsapp]
        );
        assert_eq!(
            decision.media_urls(),
            vec![
                "https://cdn.example.com/clip.mp4".to_string(),
                "https://cdn.example.com/f1.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn in_band_error_maps_to_pipeline_error() {
        let err = AiDecision::from_response(json!({
            "status": "error",
            "error": "Pipeline execution failed"
        }))
        .unwrap_err();
        match err {
            PipelineError::AiPipeline(msg) => assert_eq!(msg, "Pipeline execution failed"),
            other => panic!("expected AiPipeline, got {other:?}"),
        }
    }

    #[test]
    fn missing_verdict_is_validation_error() {
        let err = AiDecision::from_response(json!({
            "assessment": { "likelihood": "low", "confidence": 0.2 }
        }))
        .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        let err = AiDecision::from_response(json!({
            "assessment": { "verdict": "  ", "likelihood": "low", "confidence": 0.2 }
        }))
        .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn next_check_fallback_applies() {
        let mut body = success_body();
        body["assessment"]["requires_monitoring"] = json!(true);
        let decision = AiDecision::from_response(body).unwrap();
        assert_eq!(decision.next_check_minutes_or(30), 30);

        let mut body = success_body();
        body["assessment"]["next_check_minutes"] = json!(7);
        let decision = AiDecision::from_response(body).unwrap();
        assert_eq!(decision.next_check_minutes_or(30), 7);
    }
}
