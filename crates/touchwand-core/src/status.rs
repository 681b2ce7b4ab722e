use std::fmt;

use serde::Serialize;

/// Why a bridge or unit is offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfflineReason {
    /// The hub could not be reached or rejected the request.
    CommunicationError,
    /// The owning bridge is not online.
    BridgeOffline,
    /// Missing or invalid configuration (e.g. an empty unit id).
    ConfigurationError,
    /// The bridge has been disposed.
    Disposed,
}

/// Reachability reported by bridge and unit controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThingStatus {
    #[default]
    Unknown,
    Online,
    Offline(OfflineReason),
}

impl ThingStatus {
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

impl fmt::Display for OfflineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CommunicationError => "communication error",
            Self::BridgeOffline => "bridge offline",
            Self::ConfigurationError => "configuration error",
            Self::Disposed => "disposed",
        })
    }
}

impl fmt::Display for ThingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("UNKNOWN"),
            Self::Online => f.write_str("ONLINE"),
            Self::Offline(reason) => write!(f, "OFFLINE ({reason})"),
        }
    }
}
