/// Message bodies for outbound notifications. The AI supplies
/// `message_text`/`call_script`; these wrap them with the alert facts a
/// recipient needs before any link or dashboard is open.
pub struct NotificationTemplates;

impl NotificationTemplates {
    pub fn alert_text(
        vehicle_id: &str,
        severity: &str,
        description: &str,
        message_text: &str,
    ) -> String {
        let short_desc = truncate(description, 60);
        format!(
            "FleetGuard ALERT [{}]: vehicle {} - {}\n{}",
            severity.to_uppercase(),
            vehicle_id,
            short_desc,
            message_text
        )
    }

    pub fn panic_text(vehicle_id: &str, driver_id: Option<&str>, description: &str) -> String {
        let driver = driver_id.unwrap_or("unknown driver");
        format!(
            "PANIC ALERT: vehicle {} ({})\n{}\nImmediate response required.",
            vehicle_id,
            driver,
            truncate(description, 80)
        )
    }

    pub fn alert_email_subject(vehicle_id: &str, severity: &str) -> String {
        format!(
            "FleetGuard {} alert: vehicle {}",
            severity.to_uppercase(),
            vehicle_id
        )
    }

    pub fn alert_email_html(
        vehicle_id: &str,
        severity: &str,
        description: &str,
        message_text: &str,
        recommended_actions: &[String],
    ) -> String {
        let actions_html = recommended_actions
            .iter()
            .map(|a| format!("<li>{}</li>", a))
            .collect::<Vec<_>>()
            .join("");

        format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: 'Helvetica Neue', Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; border: 1px solid #ddd; border-radius: 8px; }}
        .header {{ background-color: #dfe6e9; padding: 15px; border-radius: 8px 8px 0 0; text-align: center; }}
        .badge {{ background-color: #d63031; color: white; padding: 5px 10px; border-radius: 4px; font-weight: bold; display: inline-block; margin-top: 10px; }}
        .content {{ padding: 20px; }}
        .section h3 {{ border-bottom: 2px solid #eee; padding-bottom: 5px; color: #636e72; }}
        ul {{ padding-left: 20px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>FleetGuard Safety Alert</h1>
            <div class="badge">SEVERITY: {severity}</div>
        </div>
        <div class="content">
            <p><strong>Vehicle {vehicle_id}</strong></p>
            <p>{description}</p>
            <p>{message_text}</p>
            <div class="section">
                <h3>Recommended Actions</h3>
                <ul>
                    {actions_html}
                </ul>
            </div>
        </div>
    </div>
</body>
</html>
"#,
            severity = severity.to_uppercase(),
            vehicle_id = vehicle_id,
            description = description,
            message_text = message_text,
            actions_html = actions_html,
        )
    }
}

/// Wrap a call script into the TwiML Twilio reads back to the callee.
pub fn call_twiml(script: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Say voice="alice">{}</Say><Pause length="1"/><Say voice="alice">{}</Say></Response>"#,
        xml_escape(script),
        xml_escape(script)
    )
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let cut: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_includes_severity_and_body() {
        let text = NotificationTemplates::alert_text(
            "veh-42",
            "critical",
            "Harsh Braking",
            "Confirmed violation, contact driver.",
        );
        assert!(text.contains("CRITICAL"));
        assert!(text.contains("veh-42"));
        assert!(text.contains("Confirmed violation"));
    }

    #[test]
    fn twiml_escapes_script() {
        let twiml = call_twiml("Driver <A> pressed panic & needs help");
        assert!(twiml.contains("&lt;A&gt;"));
        assert!(twiml.contains("&amp;"));
        assert!(!twiml.contains("<A>"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 60), "short");
        let long = "x".repeat(100);
        let cut = truncate(&long, 60);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 60);
    }
}
