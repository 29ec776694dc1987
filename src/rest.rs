//! Thin client for the REST endpoints that collaborate with the socket:
//! conversation list, message history, read receipts, unread badge. The UI
//! awaits these; the chat client itself never calls them.

use std::sync::Arc;

use serde::Deserialize;

use crate::config::TokenProvider;
use crate::error::ChatError;
use crate::models::chat::{ Conversation, Message };

pub struct RestClient {
    http: reqwest::Client,
    base: String,
    tokens: Arc<dyn TokenProvider>,
}

impl RestClient {
    /// `base` is the API root, e.g. `http://127.0.0.1:8080/api/v1`.
    pub fn new(base: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn bearer(&self) -> Result<String, ChatError> {
        self.tokens.token().ok_or(ChatError::AuthMissing)
    }

    pub async fn get_conversations(&self) -> Result<Vec<Conversation>, ChatError> {
        let token = self.bearer()?;
        let response = self.http
            .get(format!("{}/conversations", self.base))
            .bearer_auth(token)
            .send().await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Message history in chronological order. The server returns
    /// newest-first; this reverses for display.
    pub async fn get_messages(
        &self,
        conversation_id: i64,
        page: Option<u32>,
        limit: Option<u32>
    ) -> Result<Vec<Message>, ChatError> {
        let token = self.bearer()?;
        let mut request = self.http
            .get(format!("{}/conversations/{}/messages", self.base, conversation_id))
            .bearer_auth(token);
        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        let response = request.send().await?.error_for_status()?;
        let messages: Vec<Message> = response.json().await?;
        Ok(chronological(messages))
    }

    /// Mark every message in the conversation read for the signed-in user.
    pub async fn mark_chat_read(&self, conversation_id: i64) -> Result<(), ChatError> {
        let token = self.bearer()?;
        self.http
            .post(format!("{}/chats/{}/read", self.base, conversation_id))
            .bearer_auth(token)
            .send().await?
            .error_for_status()?;
        Ok(())
    }

    /// Total unread messages across conversations, for the nav badge.
    pub async fn get_unread_chat_count(&self) -> Result<u64, ChatError> {
        let token = self.bearer()?;
        let response = self.http
            .get(format!("{}/chats/unread-count", self.base))
            .bearer_auth(token)
            .send().await?
            .error_for_status()?;
        let body: UnreadCount = response.json().await?;
        Ok(body.count)
    }
}

#[derive(Deserialize)]
struct UnreadCount {
    count: u64,
}

fn chronological(mut messages: Vec<Message>) -> Vec<Message> {
    messages.reverse();
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticToken;

    fn message(id: i64) -> Message {
        Message {
            id,
            conversation_id: 1,
            sender_id: 1,
            sender: None,
            content: format!("m{}", id),
            is_read: false,
            created_at: "2025-07-15T14:56:40Z".to_string(),
        }
    }

    #[test]
    fn history_is_reversed_to_chronological() {
        let newest_first = vec![message(3), message(2), message(1)];
        let ordered = chronological(newest_first);
        let ids: Vec<i64> = ordered.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn base_url_is_normalized() {
        let tokens = Arc::new(StaticToken::new("t"));
        let client = RestClient::new("http://127.0.0.1:8080/api/v1/", tokens);
        assert_eq!(client.base, "http://127.0.0.1:8080/api/v1");
    }

    #[test]
    fn unread_count_body_parses() {
        let body: UnreadCount = serde_json::from_str(r#"{"count": 7}"#).unwrap();
        assert_eq!(body.count, 7);
    }

    #[test]
    fn missing_token_fails_before_any_request() {
        let tokens = Arc::new(StaticToken::new(""));
        let client = RestClient::new("http://127.0.0.1:8080/api/v1", tokens);
        assert!(matches!(client.bearer(), Err(ChatError::AuthMissing)));
    }
}
