//! The public facade: the only type a UI needs to drive private messaging.
//! Composes the connection manager, the codec, and the session store, and
//! forwards every inbound envelope to an injectable event handler.

use std::sync::{ Arc, Mutex, RwLock };
use std::time::Duration;

use log::{ debug, error, warn };

use crate::codec;
use crate::config::{ ChatConfig, TokenProvider };
use crate::connection::{ ConnectionEvents, ConnectionManager, ConnectionState };
use crate::error::ChatError;
use crate::models::chat::{ Conversation, Message };
use crate::models::websocket::{ Envelope, PrivateMessagePayload, INCOMING_PRIVATE_MESSAGE, PRIVATE_MESSAGE };
use crate::session::{ PendingSend, SendHandle, SessionStore, UpsertOutcome };

/// Pending sends older than this are dropped on the next send; by then the
/// caller has either reconciled them through a history fetch or lost interest.
const PENDING_TTL: Duration = Duration::from_secs(300);

/// Hooks a consumer implements to observe the chat session. All methods have
/// no-op defaults; implement what the UI needs. Invoked from the driver task.
pub trait ChatEventHandler: Send + Sync {
    /// Every decoded inbound envelope, regardless of `type`. The handler
    /// narrows the payload before use.
    fn on_message_received(&self, _envelope: &Envelope) {}
    fn on_connection_open(&self) {}
    fn on_connection_close(&self) {}
    fn on_error(&self, _error: &ChatError) {}
}

/// Inbound-side wiring shared between the facade and the driver task: owns
/// the session store and fans events out to the installed handler.
struct Dispatcher {
    store: Mutex<SessionStore>,
    handler: RwLock<Option<Arc<dyn ChatEventHandler>>>,
}

impl Dispatcher {
    fn handler(&self) -> Option<Arc<dyn ChatEventHandler>> {
        self.handler.read().unwrap().clone()
    }

    fn apply_incoming(&self, message: &Message) {
        let mut store = self.store.lock().unwrap();
        if let Some(handle) = store.resolve_echo(message) {
            debug!("inbound message resolved pending send {}", handle);
        }
        match store.upsert_from_incoming(message) {
            UpsertOutcome::Updated { unread } => {
                debug!(
                    "conversation {} updated, unread count {}",
                    message.conversation_id,
                    unread
                );
            }
            UpsertOutcome::UnknownConversation => {
                warn!(
                    "message for unknown conversation {}; the conversation list needs a refresh",
                    message.conversation_id
                );
            }
        }
    }
}

impl ConnectionEvents for Dispatcher {
    fn on_open(&self) {
        if let Some(handler) = self.handler() {
            handler.on_connection_open();
        }
    }

    fn on_frame(&self, text: String) {
        let envelope = match codec::decode(&text) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!("dropping malformed chat frame: {}", e);
                return;
            }
        };

        if envelope.kind == INCOMING_PRIVATE_MESSAGE {
            match envelope.parse_payload::<Message>() {
                Ok(message) => self.apply_incoming(&message),
                Err(e) => warn!("incoming private message payload did not parse: {}", e),
            }
        }

        // forwarded unconditionally; unknown kinds are the handler's to judge
        if let Some(handler) = self.handler() {
            handler.on_message_received(&envelope);
        }
    }

    fn on_close(&self) {
        if let Some(handler) = self.handler() {
            handler.on_connection_close();
        }
    }

    fn on_error(&self, error: ChatError) {
        if let Some(handler) = self.handler() {
            handler.on_error(&error);
        }
    }
}

/// One chat client per authenticated session. Independent instances are
/// cheap to construct, each with its own socket and store.
pub struct ChatClient {
    connection: Arc<ConnectionManager>,
    dispatcher: Arc<Dispatcher>,
}

impl ChatClient {
    pub fn new(config: ChatConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        let dispatcher = Arc::new(Dispatcher {
            store: Mutex::new(SessionStore::new()),
            handler: RwLock::new(None),
        });
        let events: Arc<dyn ConnectionEvents> = dispatcher.clone();
        let connection = Arc::new(ConnectionManager::new(config, tokens, events));
        Self {
            connection,
            dispatcher,
        }
    }

    /// Install (or swap) the event handler. Frames arriving before a handler
    /// is set still update the store; only the callbacks are skipped.
    pub fn set_event_handler(&self, handler: Arc<dyn ChatEventHandler>) {
        *self.dispatcher.handler.write().unwrap() = Some(handler);
    }

    pub fn connect(&self) {
        self.connection.connect();
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Encode and queue a private message. Requires an open socket: with no
    /// connection this logs, returns `SendWhileDisconnected`, and queues
    /// nothing. On success the returned handle identifies the pending send
    /// until its server echo (or a history fetch) reconciles it.
    pub fn send_private_message(
        &self,
        recipient_id: i64,
        content: impl Into<String>
    ) -> Result<SendHandle, ChatError> {
        let content = content.into();
        let payload = PrivateMessagePayload {
            recipient_id,
            content: content.clone(),
            sender_id: None,
        };
        let text = codec::encode(PRIVATE_MESSAGE, &payload)?;
        if let Err(e) = self.connection.send_raw(text) {
            error!("dropping private message to {}: {}", recipient_id, e);
            return Err(e);
        }

        let mut store = self.dispatcher.store.lock().unwrap();
        store.prune_pending(PENDING_TTL);
        Ok(store.register_pending(recipient_id, content))
    }

    /// Snapshot of the conversation list, most recently active first.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.dispatcher.store.lock().unwrap().conversations().to_vec()
    }

    /// Replace the list from a REST refresh (initial load, new conversation).
    pub fn replace_conversations(&self, conversations: Vec<Conversation>) {
        self.dispatcher.store.lock().unwrap().replace_all(conversations);
    }

    /// Mark a conversation as the one open in the UI, clearing its unread
    /// count. Its server-side read state is the REST client's business.
    pub fn mark_active(&self, conversation_id: i64) {
        self.dispatcher.store.lock().unwrap().mark_active(conversation_id);
    }

    pub fn clear_active(&self) {
        self.dispatcher.store.lock().unwrap().clear_active();
    }

    pub fn active_conversation(&self) -> Option<i64> {
        self.dispatcher.store.lock().unwrap().active()
    }

    pub fn total_unread(&self) -> u64 {
        self.dispatcher.store.lock().unwrap().total_unread()
    }

    /// Remove a pending send after reconciling it out of band.
    pub fn take_pending(&self, handle: SendHandle) -> Option<PendingSend> {
        self.dispatcher.store.lock().unwrap().take_pending(handle)
    }
}
