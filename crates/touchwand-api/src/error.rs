use thiserror::Error;

/// Top-level error type for the `touchwand-api` crate.
///
/// Covers every failure mode of the hub's REST and WebSocket surfaces.
/// The contract-level [`HubClient`](crate::HubClient) methods collapse
/// these into empty results; the typed methods hand them out as-is so
/// callers that care can tell "unreachable" apart from "unparseable".
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected by the hub (wrong credentials, locked account).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The hub rejected the session cookie (never logged in, or expired).
    #[error("Not authenticated -- login required")]
    NotAuthenticated,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The hub answered with a non-success HTTP status.
    #[error("Hub returned HTTP {status}")]
    Http { status: u16 },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A required field was absent or had the wrong JSON type.
    #[error("Missing or invalid field `{field}`")]
    MissingField { field: &'static str },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if the hub answered but the payload could not be used.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Deserialization { .. } | Self::MissingField { .. })
    }

    /// Returns `true` if re-authenticating might resolve this error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::NotAuthenticated)
    }
}
