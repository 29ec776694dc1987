use std::time::Duration;

use rand::Rng;
use url::Url;

use crate::error::ChatError;

/// Fixed handshake path on the chat backend.
const WS_PATH: &str = "/api/v1/ws/chat";

/// Supplies the bearer token at connect/request time. The host application
/// owns token storage and refresh; returning `None` aborts the attempt with
/// `ChatError::AuthMissing`.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Fixed token, for the terminal client and tests. An empty string counts as
/// no token.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone()).filter(|t| !t.is_empty())
    }
}

/// Connection settings for one chat client instance. Constructor-injected;
/// there is no process-wide default.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Host (and optional port) of the chat backend, e.g. "127.0.0.1:8080".
    pub host: String,
    /// Use wss instead of ws.
    pub secure: bool,
    /// `None` leaves a dropped socket closed until the next explicit
    /// `connect()`, matching the non-critical-feature default.
    pub reconnect: Option<ReconnectPolicy>,
}

impl ChatConfig {
    pub fn new(host: impl Into<String>, secure: bool) -> Self {
        Self {
            host: host.into(),
            secure,
            reconnect: None,
        }
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = Some(policy);
        self
    }

    /// Endpoint URI with the bearer token as a query parameter. The backend
    /// reads the token from the query string because a browser handshake
    /// cannot carry custom headers; this client keeps that contract.
    pub fn endpoint(&self, token: &str) -> Result<Url, ChatError> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let mut url = Url::parse(&format!("{}://{}{}", scheme, self.host, WS_PATH))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }
}

/// Capped exponential backoff for reconnecting after an unexpected drop.
/// The attempt counter resets whenever a socket reaches the open state.
#[derive(Clone, Copy, Debug)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Deterministic part of the delay: `base * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay plus uniform jitter in `[0, delay/2]`, so simultaneous drops do
    /// not retry in lockstep.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if delay.is_zero() {
            return delay;
        }
        delay + (delay / 2).mul_f64(rand::thread_rng().gen_range(0.0..=1.0))
    }
}
