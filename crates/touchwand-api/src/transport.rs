// Shared transport configuration for building reqwest::Client instances.
//
// The hub speaks plain HTTP on the LAN and keeps its session in a cookie,
// so every client gets a cookie jar unless the caller brings its own.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use url::Url;

use crate::error::Error;

const USER_AGENT: &str = concat!("touchwand-rs/", env!("CARGO_PKG_VERSION"));

/// Default REST port of the hub.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default port of the hub's event WebSocket.
pub const DEFAULT_WEBSOCKET_PORT: u16 = 1234;

/// Network location of one hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubAddress {
    pub host: String,
    pub port: u16,
}

impl HubAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL for REST calls: `http://{host}:{port}/`.
    pub fn base_url(&self) -> Result<Url, Error> {
        Ok(Url::parse(&format!("http://{}:{}/", self.host, self.port))?)
    }

    /// Event stream URL: `ws://{host}:{ws_port}/async`.
    pub fn websocket_url(&self, ws_port: u16) -> Result<Url, Error> {
        Ok(Url::parse(&format!("ws://{}:{}/async", self.host, ws_port))?)
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub cookie_jar: Option<Arc<Jar>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            cookie_jar: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        if let Some(ref jar) = self.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        builder.build().map_err(Error::Transport)
    }

    /// Create a config with a fresh cookie jar (for session auth).
    pub fn with_cookie_jar(mut self) -> Self {
        self.cookie_jar = Some(Arc::new(Jar::default()));
        self
    }
}
