// ── Core error types ──
//
// User-facing errors from touchwand-core. The `From<touchwand_api::Error>`
// impl folds transport-layer failures into domain variants so consumers
// don't match on HTTP status codes or JSON parse failures directly.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to hub at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Unit not found: {id}")]
    UnitNotFound { id: String },

    #[error("Unexpected hub response: {message}")]
    InvalidResponse { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<touchwand_api::Error> for CoreError {
    fn from(err: touchwand_api::Error) -> Self {
        match err {
            touchwand_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            touchwand_api::Error::NotAuthenticated => CoreError::AuthenticationFailed {
                message: "Session rejected by hub -- login required".into(),
            },
            touchwand_api::Error::Transport(ref e) => CoreError::ConnectionFailed {
                url: e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
                reason: e.to_string(),
            },
            touchwand_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            touchwand_api::Error::Http { status: 404 } => CoreError::UnitNotFound {
                id: String::new(),
            },
            touchwand_api::Error::Http { status } => CoreError::InvalidResponse {
                message: format!("HTTP {status}"),
            },
            touchwand_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            touchwand_api::Error::WebSocketClosed { code, reason } => {
                CoreError::ConnectionFailed {
                    url: String::new(),
                    reason: format!("WebSocket closed (code {code}): {reason}"),
                }
            }
            touchwand_api::Error::Deserialization { message, body: _ } => {
                CoreError::InvalidResponse { message }
            }
            touchwand_api::Error::MissingField { field } => CoreError::InvalidResponse {
                message: format!("missing or invalid field `{field}`"),
            },
        }
    }
}

impl CoreError {
    /// Attach a unit id to a `UnitNotFound` produced by the conversion.
    pub fn for_unit(self, id: &str) -> Self {
        match self {
            CoreError::UnitNotFound { .. } => CoreError::UnitNotFound { id: id.to_owned() },
            other => other,
        }
    }
}
