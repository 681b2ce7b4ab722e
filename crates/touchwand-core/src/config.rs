// ── Runtime bridge configuration ──
//
// Describes *how* to reach one TouchWand hub and how the bridge behaves
// once connected. Carries credentials and tuning, never touches disk:
// the CLI (through touchwand-config) builds a `BridgeConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use touchwand_api::transport::{DEFAULT_HTTP_PORT, DEFAULT_WEBSOCKET_PORT};

/// Timing of the background discovery loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Delay before the first background scan.
    pub initial_delay: Duration,
    /// Fixed delay between the end of one scan and the start of the next.
    pub interval: Duration,
    /// Upper bound for a single manual scan.
    pub scan_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            interval: Duration::from_secs(60),
            scan_timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration for one hub bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Identifier reported as `bridge_id` on discovery results.
    pub bridge_id: String,
    /// Hub host name or IP address.
    pub host: String,
    /// REST port.
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Also discover units whose connectivity is neither Z-Wave nor KNX.
    pub add_secondary_units: bool,
    /// Suggested polling interval for unit status, exposed to callers.
    pub status_refresh_interval: Duration,
    pub discovery: DiscoveryConfig,
    /// Port of the `/async` WebSocket endpoint.
    pub websocket_port: u16,
    /// Reconnect the event stream after it drops.
    pub websocket_reconnect: bool,
    /// Interval between keep-alive frames on the event stream.
    pub keepalive_interval: Duration,
    /// HTTP request timeout.
    pub timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bridge_id: "touchwand".into(),
            host: "127.0.0.1".into(),
            port: DEFAULT_HTTP_PORT,
            username: String::new(),
            password: SecretString::from(String::new()),
            add_secondary_units: false,
            status_refresh_interval: Duration::from_secs(20),
            discovery: DiscoveryConfig::default(),
            websocket_port: DEFAULT_WEBSOCKET_PORT,
            websocket_reconnect: false,
            keepalive_interval: Duration::from_secs(600),
            timeout: Duration::from_secs(10),
        }
    }
}
