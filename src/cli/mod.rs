use clap::Parser;

use crate::config::{ ChatConfig, ReconnectPolicy };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Chat backend host and optional port (e.g. 127.0.0.1:8080)
    #[arg(long, env = "CHAT_HOST", default_value = "127.0.0.1:8080")]
    pub host: String,

    /// Use TLS (wss:// for the socket, https:// for the REST API)
    #[arg(long, env = "CHAT_SECURE", default_value = "false")]
    pub secure: bool,

    /// Bearer token identifying the signed-in user
    #[arg(long, env = "CHAT_TOKEN", default_value = "")]
    pub token: String,

    /// Base URL of the REST API. Derived from --host and --secure when unset.
    #[arg(long, env = "CHAT_API_BASE")]
    pub api_base: Option<String>,

    /// Reconnect automatically after an unexpected socket drop
    #[arg(long, env = "CHAT_RECONNECT", default_value = "true")]
    pub reconnect: bool,

    /// Maximum reconnect attempts before giving up
    #[arg(long, env = "CHAT_RECONNECT_RETRIES", default_value = "5")]
    pub reconnect_retries: u32,
}

impl Args {
    pub fn chat_config(&self) -> ChatConfig {
        let config = ChatConfig::new(self.host.clone(), self.secure);
        if self.reconnect {
            config.with_reconnect(ReconnectPolicy {
                max_retries: self.reconnect_retries,
                ..ReconnectPolicy::default()
            })
        } else {
            config
        }
    }

    pub fn rest_base(&self) -> String {
        self.api_base.clone().unwrap_or_else(|| {
            let scheme = if self.secure { "https" } else { "http" };
            format!("{}://{}/api/v1", scheme, self.host)
        })
    }
}
