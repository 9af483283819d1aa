/// Placeholder descriptions the provider attaches before its own
/// classification has run. Only these may be overwritten during
/// description normalization.
const GENERIC_PLACEHOLDERS: &[&str] = &[
    "Safety Event",
    "Unnamed Safety Event",
    "Telemetry Event",
    "Event",
];

pub fn is_generic_placeholder(description: &str) -> bool {
    let trimmed = description.trim();
    GENERIC_PLACEHOLDERS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(trimmed))
}

/// Localized display name for a provider behavior key. Unknown keys fall
/// back to the raw key so normalization never loses information.
pub fn behavior_label(behavior: &str, locale: &str) -> Option<&'static str> {
    let spanish = locale.starts_with("es");
    let label = match behavior {
        "harsh_brake" => {
            if spanish {
                "Frenada brusca"
            } else {
                "Harsh Braking"
            }
        }
        "harsh_accel" => {
            if spanish {
                "Aceleración brusca"
            } else {
                "Harsh Acceleration"
            }
        }
        "harsh_turn" => {
            if spanish {
                "Giro brusco"
            } else {
                "Harsh Turn"
            }
        }
        "crash" => {
            if spanish {
                "Colisión detectada"
            } else {
                "Crash Detected"
            }
        }
        "distracted_driving" => {
            if spanish {
                "Conducción distraída"
            } else {
                "Distracted Driving"
            }
        }
        "drowsy_driving" => {
            if spanish {
                "Somnolencia al volante"
            } else {
                "Drowsy Driving"
            }
        }
        "tailgating" => {
            if spanish {
                "Distancia de seguimiento insuficiente"
            } else {
                "Tailgating"
            }
        }
        "speeding" => {
            if spanish {
                "Exceso de velocidad"
            } else {
                "Speeding"
            }
        }
        "seatbelt_violation" => {
            if spanish {
                "Cinturón sin abrochar"
            } else {
                "Seatbelt Violation"
            }
        }
        "panic_button" => {
            if spanish {
                "Botón de pánico activado"
            } else {
                "Panic Button Pressed"
            }
        }
        _ => return None,
    };
    Some(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_detection_is_exact_set() {
        assert!(is_generic_placeholder("Safety Event"));
        assert!(is_generic_placeholder("  safety event "));
        assert!(is_generic_placeholder("Unnamed Safety Event"));

        assert!(!is_generic_placeholder("Harsh Braking near depot"));
        assert!(!is_generic_placeholder("Safety Event on I-95"));
    }

    #[test]
    fn labels_localize() {
        assert_eq!(behavior_label("harsh_brake", "en"), Some("Harsh Braking"));
        assert_eq!(behavior_label("harsh_brake", "es"), Some("Frenada brusca"));
        assert_eq!(behavior_label("harsh_brake", "es-MX"), Some("Frenada brusca"));
        assert_eq!(behavior_label("unknown_behavior", "en"), None);
    }
}
