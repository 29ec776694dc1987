pub mod cli;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod models;
pub mod rest;
pub mod session;

use std::error::Error;
use std::sync::Arc;

use log::{ debug, info, warn };
use tokio::io::{ AsyncBufReadExt, BufReader };

use cli::Args;
use models::websocket::INCOMING_PRIVATE_MESSAGE;
use rest::RestClient;

// the facade surface, importable without digging through modules
pub use client::{ ChatClient, ChatEventHandler };
pub use config::{ ChatConfig, ReconnectPolicy, StaticToken, TokenProvider };
pub use connection::ConnectionState;
pub use error::ChatError;
pub use models::chat::{ Conversation, Message };
pub use models::user::User;
pub use models::websocket::{ Envelope, PrivateMessagePayload };
pub use session::{ PendingSend, SendHandle, SessionStore, UpsertOutcome };

struct TerminalHandler;

impl ChatEventHandler for TerminalHandler {
    fn on_message_received(&self, envelope: &Envelope) {
        if envelope.kind == INCOMING_PRIVATE_MESSAGE {
            if let Ok(message) = envelope.parse_payload::<Message>() {
                print_message(&message);
                return;
            }
        }
        println!("<< {} {}", envelope.kind, envelope.payload);
    }

    fn on_connection_open(&self) {
        println!("* connected");
    }

    fn on_connection_close(&self) {
        println!("* disconnected");
    }

    fn on_error(&self, error: &ChatError) {
        eprintln!("* error: {}", error);
    }
}

fn print_message(message: &Message) {
    let sender = message.sender
        .as_ref()
        .map(|u| u.username.clone())
        .unwrap_or_else(|| format!("user {}", message.sender_id));
    println!("[conversation {}] {}: {}", message.conversation_id, sender, message.content);
}

fn print_conversations(client: &ChatClient) {
    let conversations = client.conversations();
    if conversations.is_empty() {
        println!("(no conversations yet)");
        return;
    }
    for convo in &conversations {
        let names: Vec<&str> = convo.participants.iter().map(|p| p.username.as_str()).collect();
        let preview = convo.last_message
            .as_ref()
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let badge = if convo.unread_count > 0 {
            format!(" ({} unread)", convo.unread_count)
        } else {
            String::new()
        };
        println!("  #{} [{}]{} {}", convo.id, names.join(", "), badge, preview);
    }
}

/// Interactive terminal client: seeds the store over REST, connects the
/// socket, and maps stdin lines to sends and session commands.
pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Chat Client Configuration ---");
    info!("Chat Host: {}", args.host);
    info!("TLS Enabled: {}", args.secure);
    info!("REST Base: {}", args.rest_base());
    info!("Auto Reconnect: {}", args.reconnect);
    info!("---------------------------------");

    let tokens: Arc<dyn TokenProvider> = Arc::new(StaticToken::new(args.token.clone()));
    let rest = RestClient::new(args.rest_base(), Arc::clone(&tokens));
    let client = ChatClient::new(args.chat_config(), tokens);

    let conversations = rest.get_conversations().await?;
    info!("Loaded {} conversations", conversations.len());
    client.replace_conversations(conversations);
    print_conversations(&client);

    client.set_event_handler(Arc::new(TerminalHandler));
    client.connect();

    println!("commands: <recipient-id> <message> | /open <conversation-id> | /list | /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if line == "/list" {
            print_conversations(&client);
            continue;
        }
        if let Some(argument) = line.strip_prefix("/open ") {
            match argument.trim().parse::<i64>() {
                Ok(conversation_id) => open_conversation(&client, &rest, conversation_id).await,
                Err(_) => eprintln!("usage: /open <conversation-id>"),
            }
            continue;
        }

        let Some((head, body)) = line.split_once(' ') else {
            eprintln!("usage: <recipient-id> <message> | /open <conversation-id> | /list | /quit");
            continue;
        };
        match head.parse::<i64>() {
            Ok(recipient_id) => match client.send_private_message(recipient_id, body) {
                Ok(handle) => debug!("queued send {}", handle),
                Err(e) => eprintln!("send failed: {}", e),
            },
            Err(_) => eprintln!("recipient must be a numeric user id"),
        }
    }

    client.disconnect();
    Ok(())
}

async fn open_conversation(client: &ChatClient, rest: &RestClient, conversation_id: i64) {
    client.mark_active(conversation_id);
    if let Err(e) = rest.mark_chat_read(conversation_id).await {
        warn!("failed to mark conversation {} read: {}", conversation_id, e);
    }
    match rest.get_messages(conversation_id, None, None).await {
        Ok(history) => {
            for message in &history {
                print_message(message);
            }
        }
        Err(e) => warn!("failed to fetch history for conversation {}: {}", conversation_id, e),
    }
}
