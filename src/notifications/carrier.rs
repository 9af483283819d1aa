use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use sendgrid::{Destination, Mail, SGClient};
use std::env;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Messaging/voice carrier seam. Every send returns the provider SID so
/// inbound status callbacks can be correlated back to the attempt row.
#[async_trait]
pub trait CarrierApi: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<String>;
    async fn send_whatsapp(&self, to: &str, body: &str) -> Result<String>;
    async fn place_call(&self, to: &str, script: &str) -> Result<String>;
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct TwilioCarrier {
    twilio_client: Option<twilio::Client>,
    sendgrid_client: Option<SGClient>,
    sms_from: String,
    whatsapp_from: String,
    voice_from: String,
    email_from: String,
}

impl TwilioCarrier {
    pub fn new() -> Self {
        let account_sid = env::var("TWILIO_ACCOUNT_SID").ok();
        let auth_token = env::var("TWILIO_AUTH_TOKEN").ok();
        let sendgrid_api_key = env::var("TWILIO_SENDGRID_API_KEY").ok();
        let sms_from = env::var("TWILIO_SMS_FROM_NUMBER").unwrap_or_default();
        let whatsapp_from = env::var("TWILIO_WHATSAPP_FROM_NUMBER")
            .ok()
            .unwrap_or_else(|| sms_from.clone());
        let voice_from = env::var("TWILIO_VOICE_FROM_NUMBER")
            .ok()
            .unwrap_or_else(|| sms_from.clone());
        let email_from = env::var("NOTIFICATION_EMAIL_FROM")
            .unwrap_or_else(|_| "alerts@fleetguard.example.com".to_string());

        let twilio_client = if let (Some(sid), Some(token)) = (account_sid, auth_token) {
            Some(twilio::Client::new(&sid, &token))
        } else {
            None
        };
        let sendgrid_client = sendgrid_api_key.map(SGClient::new);

        if twilio_client.is_none() {
            warn!("Twilio credentials not found. SMS/WhatsApp/voice sends will be mocked.");
        }
        if sendgrid_client.is_none() {
            warn!("SendGrid API key not found. Email sends will be mocked.");
        }

        Self {
            twilio_client,
            sendgrid_client,
            sms_from,
            whatsapp_from,
            voice_from,
            email_from,
        }
    }

    async fn send_message(&self, from: &str, to: &str, body: &str, channel: &str) -> Result<String> {
        let Some(client) = &self.twilio_client else {
            info!("(Mock) Would send {} to {}: {}", channel, to, body);
            crate::metrics::increment_notifications_sent(channel);
            return Ok(format!("mock-{}", Uuid::new_v4()));
        };

        if from.is_empty() {
            return Err(PipelineError::Carrier(format!(
                "no sender number configured for {channel}"
            )));
        }

        match client
            .send_message(twilio::OutboundMessage::new(from, to, body))
            .await
        {
            Ok(message) => {
                info!("Sent {} to {} (sid {})", channel, to, message.sid);
                crate::metrics::increment_notifications_sent(channel);
                Ok(message.sid)
            }
            Err(e) => {
                error!("Failed to send {} to {}: {}", channel, to, e);
                crate::metrics::increment_notifications_failed(channel);
                Err(PipelineError::Carrier(format!("{channel} to {to}: {e}")))
            }
        }
    }
}

impl Default for TwilioCarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CarrierApi for TwilioCarrier {
    async fn send_sms(&self, to: &str, body: &str) -> Result<String> {
        self.send_message(&self.sms_from, to, body, "sms").await
    }

    async fn send_whatsapp(&self, to: &str, body: &str) -> Result<String> {
        // Twilio addresses WhatsApp endpoints with a prefixed number.
        let from = format!("whatsapp:{}", self.whatsapp_from);
        let to = format!("whatsapp:{}", to.trim_start_matches("whatsapp:"));
        self.send_message(&from, &to, body, "whatsapp").await
    }

    async fn place_call(&self, to: &str, script: &str) -> Result<String> {
        let Some(client) = &self.twilio_client else {
            info!("(Mock) Would call {} with script: {}", to, script);
            crate::metrics::increment_notifications_sent("voice");
            return Ok(format!("mock-{}", Uuid::new_v4()));
        };

        if self.voice_from.is_empty() {
            return Err(PipelineError::Carrier(
                "no sender number configured for voice".into(),
            ));
        }

        // The call script is served back to Twilio as TwiML via the echo
        // twimlet; no callback endpoint of our own is needed.
        let twiml = crate::notifications::templates::call_twiml(script);
        let url = format!("http://twimlets.com/echo?Twiml={}", urlencode(&twiml));

        match client
            .make_call(twilio::OutboundCall::new(&self.voice_from, to, &url))
            .await
        {
            Ok(call) => {
                info!("Placed call to {} (sid {})", to, call.sid);
                crate::metrics::increment_notifications_sent("voice");
                Ok(call.sid)
            }
            Err(e) => {
                error!("Failed to place call to {}: {}", to, e);
                crate::metrics::increment_notifications_failed("voice");
                Err(PipelineError::Carrier(format!("voice to {to}: {e}")))
            }
        }
    }

    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<String> {
        let Some(client) = &self.sendgrid_client else {
            info!("(Mock) Would send email to {}: {}", to, subject);
            crate::metrics::increment_notifications_sent("email");
            return Ok(format!("mock-{}", Uuid::new_v4()));
        };

        // sendgrid's client is blocking; Mail borrows, so build inside the
        // spawned closure.
        let to = to.to_string();
        let subject = subject.to_string();
        let html = html.to_string();
        let email_from = self.email_from.clone();
        let client = client.clone();
        let to_log = to.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let mail = Mail::new()
                .add_to(Destination {
                    address: &to,
                    name: "Alert Recipient",
                })
                .add_from(&email_from)
                .add_subject(&subject)
                .add_html(&html);
            client.send(mail)
        })
        .await
        .map_err(|e| PipelineError::Carrier(format!("email task join: {e}")))?;

        match outcome {
            Ok(_) => {
                info!("Sent email to {}", to_log);
                crate::metrics::increment_notifications_sent("email");
                Ok(format!("sg-{}", Uuid::new_v4()))
            }
            Err(e) => {
                error!("Failed to send email to {}: {}", to_log, e);
                crate::metrics::increment_notifications_failed("email");
                Err(PipelineError::Carrier(format!("email to {to_log}: {e}")))
            }
        }
    }
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencode_escapes_twiml() {
        assert_eq!(urlencode("a b&c"), "a%20b%26c");
        assert_eq!(urlencode("safe-._~"), "safe-._~");
    }
}
