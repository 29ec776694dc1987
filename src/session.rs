//! Single source of truth for the conversation list: most-recent-activity
//! ordering, unread accounting, active-conversation tracking, and the
//! pending-send table that reconciles optimistic messages with their
//! server-authoritative counterparts.

use std::fmt;
use std::time::{ Duration, Instant };

use uuid::Uuid;

use crate::models::chat::{ Conversation, Message };

/// Nonce identifying one in-flight send until the server's copy of the
/// message shows up. The wire format carries no nonce, so correlation is by
/// echo matching (see [`SessionStore::resolve_echo`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SendHandle(Uuid);

impl SendHandle {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the caller handed to `send_private_message`, kept until reconciled
/// or pruned. The caller uses it to replace its optimistic message once the
/// authoritative one arrives.
#[derive(Clone, Debug)]
pub struct PendingSend {
    pub recipient_id: i64,
    pub content: String,
    pub sent_at: Instant,
}

/// Result of feeding an inbound message into the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Conversation found and refreshed; carries its new unread count.
    Updated { unread: u32 },
    /// No local conversation matches. The store never fabricates one; the
    /// caller should refresh the list from the server.
    UnknownConversation,
}

#[derive(Default)]
pub struct SessionStore {
    conversations: Vec<Conversation>,
    active: Option<i64>,
    // insertion order gives "oldest matching send wins" during echo matching
    pending: Vec<(SendHandle, PendingSend)>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one inbound message: refresh the preview, bump the unread count
    /// unless the conversation is the active one, and move it to the front.
    /// Untouched conversations keep their relative order.
    pub fn upsert_from_incoming(&mut self, message: &Message) -> UpsertOutcome {
        let Some(index) = self
            .conversations
            .iter()
            .position(|c| c.id == message.conversation_id)
        else {
            return UpsertOutcome::UnknownConversation;
        };

        let mut convo = self.conversations.remove(index);
        convo.last_message = Some(message.clone());
        if self.active != Some(convo.id) {
            convo.unread_count += 1;
        }
        let unread = convo.unread_count;
        self.conversations.insert(0, convo);
        UpsertOutcome::Updated { unread }
    }

    /// Designate the conversation currently open in the UI and clear its
    /// unread counter. At most one conversation is active at a time.
    pub fn mark_active(&mut self, conversation_id: i64) {
        self.active = Some(conversation_id);
        if let Some(convo) = self.conversations.iter_mut().find(|c| c.id == conversation_id) {
            convo.unread_count = 0;
        }
    }

    pub fn clear_active(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<i64> {
        self.active
    }

    /// Wholesale replacement after a REST refresh; the list adopts the
    /// server's order. The active designation survives if that conversation
    /// is still present.
    pub fn replace_all(&mut self, conversations: Vec<Conversation>) {
        if let Some(active) = self.active {
            if !conversations.iter().any(|c| c.id == active) {
                self.active = None;
            }
        }
        self.conversations = conversations;
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, conversation_id: i64) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn total_unread(&self) -> u64 {
        self.conversations.iter().map(|c| c.unread_count as u64).sum()
    }

    /// Record an accepted send and hand back its nonce.
    pub fn register_pending(&mut self, recipient_id: i64, content: String) -> SendHandle {
        let handle = SendHandle::generate();
        self.pending.push((
            handle,
            PendingSend {
                recipient_id,
                content,
                sent_at: Instant::now(),
            },
        ));
        handle
    }

    /// Match an inbound message against outstanding sends. The oldest pending
    /// entry with equal content wins. A message authored by the pending
    /// recipient is a reply, never our echo, and is skipped.
    pub fn resolve_echo(&mut self, message: &Message) -> Option<SendHandle> {
        let index = self.pending.iter().position(|(_, p)| {
            p.content == message.content && message.sender_id != p.recipient_id
        })?;
        Some(self.pending.remove(index).0)
    }

    /// Remove and return a pending send, e.g. after the caller reconciled it
    /// through a history fetch instead of a socket echo.
    pub fn take_pending(&mut self, handle: SendHandle) -> Option<PendingSend> {
        let index = self.pending.iter().position(|(h, _)| *h == handle)?;
        Some(self.pending.remove(index).1)
    }

    /// Drop entries older than `max_age`; returns how many were dropped.
    pub fn prune_pending(&mut self, max_age: Duration) -> usize {
        let before = self.pending.len();
        self.pending.retain(|(_, p)| p.sent_at.elapsed() < max_age);
        before - self.pending.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convo(id: i64) -> Conversation {
        Conversation {
            id,
            participants: Vec::new(),
            last_message: None,
            unread_count: 0,
            created_at: "2025-07-01T08:00:00Z".to_string(),
            updated_at: "2025-07-01T08:00:00Z".to_string(),
        }
    }

    fn message(conversation_id: i64, sender_id: i64, content: &str) -> Message {
        Message {
            id: 1,
            conversation_id,
            sender_id,
            sender: None,
            content: content.to_string(),
            is_read: false,
            created_at: "2025-07-15T14:56:40Z".to_string(),
        }
    }

    fn ids(store: &SessionStore) -> Vec<i64> {
        store.conversations().iter().map(|c| c.id).collect()
    }

    #[test]
    fn unread_accumulates_and_resets_on_mark_active() {
        let mut store = SessionStore::new();
        store.replace_all(vec![convo(1), convo(2)]);
        store.mark_active(1);

        assert_eq!(
            store.upsert_from_incoming(&message(2, 5, "hi")),
            UpsertOutcome::Updated { unread: 1 }
        );
        store.upsert_from_incoming(&message(2, 5, "hello?"));
        store.upsert_from_incoming(&message(2, 5, "anyone there"));
        assert_eq!(store.get(2).unwrap().unread_count, 3);
        assert_eq!(store.total_unread(), 3);

        store.mark_active(2);
        assert_eq!(store.get(2).unwrap().unread_count, 0);
    }

    #[test]
    fn active_conversation_suppresses_unread() {
        let mut store = SessionStore::new();
        store.replace_all(vec![convo(1)]);
        store.mark_active(1);

        assert_eq!(
            store.upsert_from_incoming(&message(1, 5, "hi")),
            UpsertOutcome::Updated { unread: 0 }
        );
        assert_eq!(store.get(1).unwrap().last_message.as_ref().unwrap().content, "hi");
    }

    #[test]
    fn touched_conversations_move_to_front_preserving_rest() {
        let mut store = SessionStore::new();
        store.replace_all(vec![convo(1), convo(2), convo(3)]);

        store.upsert_from_incoming(&message(3, 5, "x"));
        store.upsert_from_incoming(&message(2, 5, "y"));
        assert_eq!(ids(&store), vec![2, 3, 1]);
    }

    #[test]
    fn unknown_conversation_is_reported_not_invented() {
        let mut store = SessionStore::new();
        store.replace_all(vec![convo(1)]);

        assert_eq!(
            store.upsert_from_incoming(&message(99, 5, "new thread")),
            UpsertOutcome::UnknownConversation
        );
        assert_eq!(ids(&store), vec![1]);
    }

    #[test]
    fn replace_all_adopts_server_order_and_keeps_active() {
        let mut store = SessionStore::new();
        store.replace_all(vec![convo(1), convo(2)]);
        store.mark_active(2);

        store.replace_all(vec![convo(2), convo(3)]);
        assert_eq!(store.active(), Some(2));

        store.replace_all(vec![convo(3)]);
        assert_eq!(store.active(), None);
    }

    #[test]
    fn echo_resolution_prefers_oldest_matching_send() {
        let mut store = SessionStore::new();
        let first = store.register_pending(9, "ping".to_string());
        let second = store.register_pending(9, "ping".to_string());

        let echo = message(7, 3, "ping");
        assert_eq!(store.resolve_echo(&echo), Some(first));
        assert_eq!(store.resolve_echo(&echo), Some(second));
        assert_eq!(store.resolve_echo(&echo), None);
    }

    #[test]
    fn a_reply_from_the_recipient_is_not_an_echo() {
        let mut store = SessionStore::new();
        let handle = store.register_pending(9, "ping".to_string());

        // same content, but authored by the recipient
        assert_eq!(store.resolve_echo(&message(7, 9, "ping")), None);
        assert_eq!(store.pending_len(), 1);
        assert!(store.take_pending(handle).is_some());
        assert!(store.take_pending(handle).is_none());
    }

    #[test]
    fn prune_drops_only_stale_entries() {
        let mut store = SessionStore::new();
        store.register_pending(9, "fresh".to_string());
        assert_eq!(store.prune_pending(Duration::from_secs(60)), 0);
        assert_eq!(store.prune_pending(Duration::ZERO), 1);
        assert_eq!(store.pending_len(), 0);
    }
}
