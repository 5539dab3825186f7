use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::types::DiscardReason;

/// Recognized message kinds posted by the embedded content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMessage {
    /// `iframe_loaded`: the content asserts it rendered.
    Loaded,
    /// `iframe_error`: the content asserts it failed.
    Error,
    /// `booking_complete`: advisory only.
    BookingComplete,
}

/// Outcome of validating one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageVerdict {
    Accepted(FrameMessage),
    Discarded(DiscardReason),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireMessage {
    IframeLoaded,
    IframeError,
    BookingComplete,
    #[serde(other)]
    Unknown,
}

/// Origin allow-list derived from the target URL's host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    host: String,
}

impl OriginPolicy {
    /// Build the policy for a target; `None` when the URL has no host.
    pub fn for_target(target: &Url) -> Option<Self> {
        target.host_str().map(|host| Self {
            host: host.to_ascii_lowercase(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether a message origin (`scheme://host[:port]`) belongs to the target host.
    pub fn allows(&self, origin: &str) -> bool {
        Url::parse(origin.trim())
            .ok()
            .and_then(|url| url.host_str().map(|host| host.eq_ignore_ascii_case(&self.host)))
            .unwrap_or(false)
    }
}

/// Validate origin and schema of an inbound cross-origin message.
///
/// The payload may be a JSON object or a string holding JSON-encoded text.
/// Unknown fields are ignored.
pub fn classify_message(policy: &OriginPolicy, origin: &str, payload: &Value) -> MessageVerdict {
    if !policy.allows(origin) {
        return MessageVerdict::Discarded(DiscardReason::UntrustedOrigin);
    }

    let decoded;
    let object = match payload {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => {
                decoded = value;
                &decoded
            }
            Err(_) => return MessageVerdict::Discarded(DiscardReason::Malformed),
        },
        other => other,
    };
    if !object.get("type").is_some_and(Value::is_string) {
        return MessageVerdict::Discarded(DiscardReason::Malformed);
    }

    match WireMessage::deserialize(object) {
        Ok(WireMessage::IframeLoaded) => MessageVerdict::Accepted(FrameMessage::Loaded),
        Ok(WireMessage::IframeError) => MessageVerdict::Accepted(FrameMessage::Error),
        Ok(WireMessage::BookingComplete) => {
            MessageVerdict::Accepted(FrameMessage::BookingComplete)
        }
        Ok(WireMessage::Unknown) => MessageVerdict::Discarded(DiscardReason::Unrecognized),
        Err(_) => MessageVerdict::Discarded(DiscardReason::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn policy() -> OriginPolicy {
        let target = Url::parse("https://booking.example.com/widget").expect("valid url");
        OriginPolicy::for_target(&target).expect("target has a host")
    }

    #[test]
    fn accepts_known_message_kinds_from_target_host() {
        let policy = policy();
        let origin = "https://booking.example.com";
        assert_eq!(
            classify_message(&policy, origin, &json!({ "type": "iframe_loaded" })),
            MessageVerdict::Accepted(FrameMessage::Loaded)
        );
        assert_eq!(
            classify_message(&policy, origin, &json!({ "type": "iframe_error", "code": 7 })),
            MessageVerdict::Accepted(FrameMessage::Error)
        );
        assert_eq!(
            classify_message(&policy, origin, &json!({ "type": "booking_complete" })),
            MessageVerdict::Accepted(FrameMessage::BookingComplete)
        );
    }

    #[test]
    fn policy_normalizes_target_host() {
        let target = Url::parse("https://Booking.Example.COM/widget").expect("valid url");
        let policy = OriginPolicy::for_target(&target).expect("target has a host");
        assert_eq!(policy.host(), "booking.example.com");
        assert!(policy.allows("https://BOOKING.example.com"));
    }

    #[test]
    fn decodes_json_encoded_string_payloads() {
        let verdict = classify_message(
            &policy(),
            "https://BOOKING.example.com:443",
            &Value::String(r#"{"type":"iframe_loaded","height":900}"#.to_owned()),
        );
        assert_eq!(verdict, MessageVerdict::Accepted(FrameMessage::Loaded));
    }

    #[test]
    fn discards_foreign_and_lookalike_origins() {
        let policy = policy();
        let payload = json!({ "type": "iframe_loaded" });
        for origin in [
            "https://evil.example.com",
            "https://booking.example.com.evil.net",
            "https://notbooking.example.com",
            "null",
            "",
        ] {
            assert_eq!(
                classify_message(&policy, origin, &payload),
                MessageVerdict::Discarded(DiscardReason::UntrustedOrigin),
                "origin {origin:?} must be rejected"
            );
        }
    }

    #[test]
    fn discards_malformed_payloads() {
        let policy = policy();
        let origin = "https://booking.example.com";
        for payload in [
            Value::String("{not json".to_owned()),
            json!(["iframe_loaded"]),
            json!(42),
            json!({ "kind": "iframe_loaded" }),
            json!({ "type": 3 }),
            Value::String("\"iframe_loaded\"".to_owned()),
        ] {
            assert_eq!(
                classify_message(&policy, origin, &payload),
                MessageVerdict::Discarded(DiscardReason::Malformed),
                "payload {payload} must be malformed"
            );
        }
    }

    #[test]
    fn unknown_types_are_unrecognized() {
        assert_eq!(
            classify_message(
                &policy(),
                "https://booking.example.com",
                &json!({ "type": "resize", "height": 400 })
            ),
            MessageVerdict::Discarded(DiscardReason::Unrecognized)
        );
    }
}
