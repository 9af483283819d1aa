use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Notification channels the carrier can deliver on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Whatsapp,
    Voice,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Whatsapp => "whatsapp",
            Channel::Voice => "voice",
            Channel::Email => "email",
        }
    }
}

/// Recipient-type tokens the AI (or the monitor matrix) may address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientKind {
    Operator,
    MonitoringTeam,
    Supervisor,
    Emergency,
    Dispatch,
}

impl RecipientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientKind::Operator => "operator",
            RecipientKind::MonitoringTeam => "monitoring_team",
            RecipientKind::Supervisor => "supervisor",
            RecipientKind::Emergency => "emergency",
            RecipientKind::Dispatch => "dispatch",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelToggles {
    #[serde(default = "default_true")]
    pub sms: bool,
    #[serde(default = "default_true")]
    pub whatsapp: bool,
    #[serde(default = "default_true")]
    pub voice: bool,
    #[serde(default)]
    pub email: bool,
}

impl Default for ChannelToggles {
    fn default() -> Self {
        Self {
            sms: true,
            whatsapp: true,
            voice: true,
            email: false,
        }
    }
}

/// One monitor-matrix row: a risk-escalation tier mapped to the channels
/// and recipient types that must be notified for it, whether or not the AI
/// asked for notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub channels: Vec<Channel>,
    pub recipients: Vec<RecipientKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ack_deadline_minutes")]
    pub ack_deadline_minutes: i64,
    /// Alert severities the acknowledgement SLA applies to.
    #[serde(default = "default_attention_severities")]
    pub severities: Vec<String>,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ack_deadline_minutes: default_ack_deadline_minutes(),
            severities: default_attention_severities(),
        }
    }
}

/// Per-tenant configuration document, stored as the `settings` JSON column
/// on the tenants table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantSettings {
    #[serde(default)]
    pub ai_api_key: String,
    pub ai_base_url: Option<String>,
    pub provider_api_token: Option<String>,
    pub provider_base_url: Option<String>,
    #[serde(default)]
    pub channels: ChannelToggles,
    /// risk-escalation tier -> forced notification entry.
    #[serde(default)]
    pub monitor_matrix: HashMap<String, MatrixEntry>,
    /// Fallback recheck cadence when the AI omits `next_check_minutes`.
    #[serde(default = "default_recheck_minutes")]
    pub recheck_minutes: i64,
    #[serde(default)]
    pub attention: AttentionConfig,
    #[serde(default = "default_true")]
    pub metering_enabled: bool,
    #[serde(default = "default_true")]
    pub domain_events_enabled: bool,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// GCS bucket for persisted evidence media.
    pub media_bucket: Option<String>,
}

impl TenantSettings {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, PipelineError> {
        serde_json::from_value(value.clone())
            .map_err(|e| PipelineError::Configuration(format!("unreadable tenant settings: {e}")))
    }

    /// The AI credential is mandatory for any pipeline work.
    pub fn require_ai_api_key(&self) -> Result<&str, PipelineError> {
        if self.ai_api_key.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "tenant has no AI API credential configured".into(),
            ));
        }
        Ok(&self.ai_api_key)
    }

    pub fn channel_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Sms => self.channels.sms,
            Channel::Whatsapp => self.channels.whatsapp,
            Channel::Voice => self.channels.voice,
            Channel::Email => self.channels.email,
        }
    }

    pub fn matrix_entry(&self, tier: &str) -> Option<&MatrixEntry> {
        self.monitor_matrix.get(tier)
    }
}

fn default_true() -> bool {
    true
}

fn default_recheck_minutes() -> i64 {
    30
}

fn default_ack_deadline_minutes() -> i64 {
    15
}

fn default_attention_severities() -> Vec<String> {
    vec!["critical".to_string()]
}

fn default_locale() -> String {
    "en".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_parse_with_matrix() {
        let value = json!({
            "ai_api_key": "sk-tenant",
            "channels": { "email": true, "voice": false },
            "monitor_matrix": {
                "high": { "channels": ["sms", "whatsapp"], "recipients": ["supervisor"] }
            },
            "recheck_minutes": 10
        });

        let settings = TenantSettings::from_value(&value).unwrap();
        assert!(settings.channel_enabled(Channel::Sms));
        assert!(settings.channel_enabled(Channel::Email));
        assert!(!settings.channel_enabled(Channel::Voice));
        assert_eq!(settings.recheck_minutes, 10);

        let entry = settings.matrix_entry("high").unwrap();
        assert_eq!(entry.channels, vec![Channel::Sms, Channel::Whatsapp]);
        assert_eq!(entry.recipients, vec![RecipientKind::Supervisor]);
        assert!(settings.matrix_entry("low").is_none());
    }

    #[test]
    fn missing_ai_credential_is_configuration_error() {
        let settings = TenantSettings::from_value(&json!({})).unwrap();
        let err = settings.require_ai_api_key().unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));

        let blank = TenantSettings::from_value(&json!({ "ai_api_key": "   " })).unwrap();
        assert!(blank.require_ai_api_key().is_err());
    }
}
