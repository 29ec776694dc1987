use serde::{ Serialize, Deserialize };

/// Participant snapshot as the user directory serves it. Chat borrows these;
/// it never owns or mutates user records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}
