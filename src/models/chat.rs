use serde::{ Serialize, Deserialize };

use crate::models::user::User;

/// Chat message as persisted by the server and pushed over the socket.
/// Only `is_read` ever changes after creation; deletion is out of scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<User>,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    /// RFC 3339 timestamp, client- or server-generated depending on origin.
    pub created_at: String,
}

/// A persistent thread between two (or more) users. Created server-side on
/// first contact; the client only materializes it from a list refresh and
/// mutates it in place as messages arrive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    #[serde(default)]
    pub participants: Vec<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub unread_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl Conversation {
    /// The participant other than the signed-in user, for two-party threads.
    pub fn other_participant(&self, own_id: i64) -> Option<&User> {
        self.participants.iter().find(|p| p.id != own_id)
    }
}
