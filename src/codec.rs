//! Pure translation between wire text and typed envelopes. The codec never
//! interprets the envelope `type`; dispatch belongs to the caller.

use chrono::Utc;
use serde::Serialize;

use crate::error::ChatError;
use crate::models::websocket::Envelope;

/// Wrap a payload in an envelope with a fresh timestamp and serialize it.
pub fn encode<P: Serialize>(kind: &str, payload: &P) -> Result<String, ChatError> {
    let envelope = Envelope {
        kind: kind.to_string(),
        payload: serde_json::to_value(payload)?,
        timestamp: Utc::now().to_rfc3339(),
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parse raw inbound text. A malformed frame yields an error the caller logs
/// and drops; it must never tear down the connection.
pub fn decode(text: &str) -> Result<Envelope, ChatError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::websocket::{ PrivateMessagePayload, PRIVATE_MESSAGE };
    use chrono::DateTime;

    #[test]
    fn private_message_round_trips() {
        let payload = PrivateMessagePayload {
            recipient_id: 9,
            content: "lunch at 12?".to_string(),
            sender_id: None,
        };
        let text = encode(PRIVATE_MESSAGE, &payload).unwrap();
        let envelope = decode(&text).unwrap();

        assert_eq!(envelope.kind, PRIVATE_MESSAGE);
        let back: PrivateMessagePayload = envelope.parse_payload().unwrap();
        assert_eq!(back.recipient_id, 9);
        assert_eq!(back.content, "lunch at 12?");
        assert!(DateTime::parse_from_rfc3339(&envelope.timestamp).is_ok());
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let text = r#"{"type":"some_future_event","payload":{"x":1},"timestamp":"2025-07-15T14:56:40Z"}"#;
        let envelope = decode(text).unwrap();
        assert_eq!(envelope.kind, "some_future_event");
        assert_eq!(envelope.payload["x"], 1);
    }

    #[test]
    fn malformed_frame_is_an_error() {
        assert!(matches!(decode("not json"), Err(ChatError::MalformedFrame(_))));
        assert!(matches!(decode(r#"{"type":"x"}"#), Err(ChatError::MalformedFrame(_))));
    }
}
