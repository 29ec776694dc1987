//! Socket lifecycle for one chat client: at most one live connection, an
//! explicit state machine, and an optional reconnect cycle. All I/O runs on
//! a spawned driver task; the caller-facing operations never block.

use std::sync::{ Arc, Mutex };

use futures::{ SinkExt, StreamExt };
use log::{ debug, error, info, warn };
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::sync::mpsc::{ self, UnboundedSender };
use tokio_tungstenite::{ connect_async, WebSocketStream };
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::config::{ ChatConfig, TokenProvider };
use crate::error::ChatError;

/// Transport ready state. `Reconnecting` sits between an unexpected drop and
/// the next attempt; an explicit `disconnect()` always lands in `Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

/// Lifecycle hooks the facade installs. Invoked from the driver task, never
/// concurrently with each other for one socket.
pub(crate) trait ConnectionEvents: Send + Sync {
    fn on_open(&self);
    fn on_frame(&self, text: String);
    fn on_close(&self);
    fn on_error(&self, error: ChatError);
}

struct Shared {
    state: ConnectionState,
    outbound: Option<UnboundedSender<Message>>,
    /// Monotonic id of the current connection attempt. A driver task whose
    /// epoch no longer matches has been superseded and must stop touching
    /// shared state or firing callbacks.
    epoch: u64,
    user_closed: bool,
}

enum SocketEnd {
    Finished { user_closed: bool },
    Superseded,
}

pub(crate) struct ConnectionManager {
    config: ChatConfig,
    tokens: Arc<dyn TokenProvider>,
    events: Arc<dyn ConnectionEvents>,
    shared: Mutex<Shared>,
}

impl ConnectionManager {
    pub(crate) fn new(
        config: ChatConfig,
        tokens: Arc<dyn TokenProvider>,
        events: Arc<dyn ConnectionEvents>
    ) -> Self {
        Self {
            config,
            tokens,
            events,
            shared: Mutex::new(Shared {
                state: ConnectionState::Idle,
                outbound: None,
                epoch: 0,
                user_closed: false,
            }),
        }
    }

    /// Start a connection attempt. Idempotent: a no-op while an attempt is
    /// already in progress. Aborts without panicking when no token is
    /// available. Must be called from within a tokio runtime.
    pub(crate) fn connect(self: &Arc<Self>) {
        if self.attempt_in_progress() {
            info!("chat socket already has a connection attempt in progress");
            return;
        }
        let Some(token) = self.tokens.token() else {
            error!("chat connection failed: no auth token available");
            self.events.on_error(ChatError::AuthMissing);
            return;
        };

        let epoch = {
            let mut shared = self.shared.lock().unwrap();
            match shared.state {
                // a racing connect() got here first
                | ConnectionState::Connecting
                | ConnectionState::Open
                | ConnectionState::Reconnecting => {
                    return;
                }
                ConnectionState::Idle | ConnectionState::Closed => {}
            }
            shared.user_closed = false;
            shared.state = ConnectionState::Connecting;
            shared.epoch += 1;
            shared.epoch
        };

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.drive(token, epoch).await;
        });
    }

    /// Close the socket if one exists; idempotent no-op otherwise. Suppresses
    /// any reconnect cycle. The close callback fires from the driver task,
    /// once, when the socket actually ends.
    pub(crate) fn disconnect(&self) {
        let mut shared = self.shared.lock().unwrap();
        match shared.state {
            ConnectionState::Idle | ConnectionState::Closed => {
                debug!("disconnect: no chat socket to close");
            }
            _ => {
                shared.user_closed = true;
                // dropping the sender makes the driver run the close handshake
                shared.outbound = None;
                shared.state = ConnectionState::Closed;
            }
        }
    }

    fn attempt_in_progress(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Reconnecting
        )
    }

    /// True iff the socket is in the open ready state. Pure query.
    pub(crate) fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.shared.lock().unwrap().state
    }

    /// Queue one text frame for the driver task to write. Fails unless the
    /// socket is open; nothing is buffered across connections.
    pub(crate) fn send_raw(&self, text: String) -> Result<(), ChatError> {
        let shared = self.shared.lock().unwrap();
        if shared.state != ConnectionState::Open {
            return Err(ChatError::SendWhileDisconnected);
        }
        match shared.outbound.as_ref() {
            Some(tx) => tx.send(Message::Text(text)).map_err(|_| ChatError::SendWhileDisconnected),
            None => Err(ChatError::SendWhileDisconnected),
        }
    }

    async fn drive(self: Arc<Self>, token: String, epoch: u64) {
        let mut attempt: u32 = 0;
        loop {
            let url = match self.config.endpoint(&token) {
                Ok(url) => url,
                Err(e) => {
                    self.settle_closed(epoch);
                    self.events.on_error(e);
                    return;
                }
            };

            debug!("opening chat socket to {}", self.config.host);
            match connect_async(url.as_str()).await {
                Ok((socket, _response)) => {
                    attempt = 0;
                    match self.run_socket(socket, epoch).await {
                        SocketEnd::Superseded => {
                            return;
                        }
                        SocketEnd::Finished { user_closed: true } => {
                            return;
                        }
                        SocketEnd::Finished { user_closed: false } => {}
                    }
                }
                Err(e) => {
                    error!("chat socket handshake failed: {}", e);
                    self.events.on_error(ChatError::Transport(e));
                }
            }

            // the socket is gone without an explicit disconnect()
            let Some(policy) = self.config.reconnect else {
                self.settle_closed(epoch);
                return;
            };
            if attempt >= policy.max_retries {
                warn!("giving up on the chat socket after {} reconnect attempts", attempt);
                self.settle_closed(epoch);
                return;
            }
            if !self.transition(epoch, ConnectionState::Reconnecting) {
                return;
            }
            let delay = policy.jittered_delay(attempt);
            info!(
                "reconnecting chat socket in {:?} (attempt {}/{})",
                delay,
                attempt + 1,
                policy.max_retries
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
            if !self.transition(epoch, ConnectionState::Connecting) {
                return;
            }
        }
    }

    /// Pump one established socket until it ends. Returns whether the close
    /// was user-requested, or that a newer attempt took over.
    async fn run_socket<S>(&self, socket: WebSocketStream<S>, epoch: u64) -> SocketEnd
        where S: AsyncRead + AsyncWrite + Unpin
    {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        {
            let mut shared = self.shared.lock().unwrap();
            if shared.epoch != epoch || shared.user_closed {
                // disconnect() raced the handshake; never report open
                return SocketEnd::Superseded;
            }
            shared.state = ConnectionState::Open;
            shared.outbound = Some(outbound_tx);
        }
        info!("chat socket established");
        self.events.on_open();

        let (mut sink, mut stream) = socket.split();
        loop {
            tokio::select! {
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => self.events.on_frame(text),
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        info!("chat socket closed by server");
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("ignoring binary frame on chat socket");
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        error!("chat socket receive error: {}", e);
                        self.events.on_error(ChatError::Transport(e));
                        break;
                    }
                    None => break,
                },
                queued = outbound_rx.recv() => match queued {
                    Some(frame) => {
                        if let Err(e) = sink.send(frame).await {
                            error!("chat socket send error: {}", e);
                            self.events.on_error(ChatError::Transport(e));
                            break;
                        }
                    }
                    // disconnect() dropped the sender: run the close handshake
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
            }
        }

        let user_closed = {
            let mut shared = self.shared.lock().unwrap();
            if shared.epoch != epoch {
                return SocketEnd::Superseded;
            }
            shared.outbound = None;
            if !shared.user_closed {
                // drive() may move this to Reconnecting next
                shared.state = ConnectionState::Closed;
            }
            shared.user_closed
        };
        self.events.on_close();
        SocketEnd::Finished { user_closed }
    }

    /// Move to `state` unless this attempt was superseded or the user closed
    /// the connection meanwhile.
    fn transition(&self, epoch: u64, state: ConnectionState) -> bool {
        let mut shared = self.shared.lock().unwrap();
        if shared.epoch != epoch || shared.user_closed {
            return false;
        }
        shared.state = state;
        true
    }

    fn settle_closed(&self, epoch: u64) {
        let mut shared = self.shared.lock().unwrap();
        if shared.epoch == epoch && !shared.user_closed {
            shared.state = ConnectionState::Closed;
        }
    }
}
