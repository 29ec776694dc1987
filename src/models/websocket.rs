use serde::de::DeserializeOwned;
use serde::{ Serialize, Deserialize };
use serde_json::Value;

/// Client → server: request to deliver a private message.
pub const PRIVATE_MESSAGE: &str = "private_message";
/// Server → client: a saved message pushed to the recipient. The payload is
/// the full persisted `Message`.
pub const INCOMING_PRIVATE_MESSAGE: &str = "incoming_private_message";

/// Wire envelope `{ type, payload, timestamp }`. The payload shape is keyed
/// solely by `kind`; it stays an opaque `Value` here so unknown types
/// round-trip untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
    /// RFC 3339, set at send time.
    pub timestamp: String,
}

impl Envelope {
    /// Narrow the payload once the caller has dispatched on `kind`.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Payload of a `private_message` envelope. `sender_id` is only present on
/// server-originated frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateMessagePayload {
    pub recipient_id: i64,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<i64>,
}
