// TouchWand hub REST client
//
// Wraps `reqwest::Client` with hub-specific URL construction and the
// cookie session established by `/auth/login`. Every operation comes in
// two flavours: a typed `Result` method that keeps transport and parse
// failures apart, and a contract method (`connect`, `list_units`,
// `get_unit_by_id`, `send_command`) that logs the failure and collapses
// it into an empty/false result for callers that only need "now or not".

use std::sync::atomic::{AtomicBool, Ordering};

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::action::UnitAction;
use crate::error::Error;
use crate::models::{UnitRecord, parse_unit_list};
use crate::transport::{HubAddress, TransportConfig};

const LOGIN_PATH: &str = "auth/login";
const LIST_UNITS_PATH: &str = "units/listUnits";
const GET_UNIT_PATH: &str = "units/getUnitByID";
const UNIT_ACTION_PATH: &str = "units/action";

/// HTTP client for one hub.
///
/// Cheap to share behind an `Arc`; the session lives in the cookie jar of
/// the inner `reqwest::Client`.
pub struct HubClient {
    http: reqwest::Client,
    base_url: Url,
    authenticated: AtomicBool,
}

impl HubClient {
    /// Create a client for `address`.
    ///
    /// A cookie jar is added when the transport config doesn't carry one,
    /// since the hub session is cookie-based.
    pub fn new(address: &HubAddress, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        Ok(Self::with_client(http, address.base_url()?))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            authenticated: AtomicBool::new(false),
        }
    }

    /// The hub base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `true` after a successful login, until the hub rejects the session.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    // ── Typed operations ─────────────────────────────────────────────

    /// Log in and store the session cookie.
    ///
    /// `GET /auth/login?user={username}&psw={password}`
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let mut url = self.url(LOGIN_PATH)?;
        url.query_pairs_mut()
            .append_pair("user", username)
            .append_pair("psw", password.expose_secret());

        debug!(host = ?self.base_url.host_str(), username, "logging in");

        let result = async {
            let resp = self.http.get(url).send().await?;
            let status = resp.status();
            if status.is_success() {
                Ok(())
            } else {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::Authentication {
                    message: format!("login failed (HTTP {status}): {body}"),
                })
            }
        }
        .await;

        self.authenticated.store(result.is_ok(), Ordering::Release);
        if result.is_ok() {
            debug!("login successful");
        }
        result
    }

    /// List every unit the hub knows.
    ///
    /// `GET /units/listUnits`
    pub async fn fetch_units(&self) -> Result<Vec<UnitRecord>, Error> {
        let url = self.url(LIST_UNITS_PATH)?;
        let body = self.get_json(url).await?;
        parse_unit_list(&body)
    }

    /// Fetch one unit, requiring a usable status field.
    ///
    /// `GET /units/getUnitByID?id={id}`
    pub async fn fetch_unit(&self, id: &str) -> Result<UnitRecord, Error> {
        let mut url = self.url(GET_UNIT_PATH)?;
        url.query_pairs_mut().append_pair("id", id);
        let body = self.get_json(url).await?;
        UnitRecord::from_json(&body)?.require_status()
    }

    /// Apply an action to a unit.
    ///
    /// `POST /units/action` with `{"id": .., "value": ..}`
    pub async fn post_action(&self, id: &str, action: &UnitAction) -> Result<(), Error> {
        let url = self.url(UNIT_ACTION_PATH)?;
        debug!(unit = id, ?action, "POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(&action.payload(id))
            .send()
            .await?;
        self.check_status(resp.status())
    }

    // ── Contract operations ──────────────────────────────────────────

    /// Authenticate; `false` means the hub must be treated as unreachable.
    pub async fn connect(&self, username: &str, password: &SecretString) -> bool {
        match self.login(username, password).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "hub login failed");
                false
            }
        }
    }

    /// All parseable units, or an empty list on any failure.
    pub async fn list_units(&self) -> Vec<UnitRecord> {
        self.fetch_units().await.unwrap_or_else(|e| {
            warn!(error = %e, "list units failed");
            Vec::new()
        })
    }

    /// One unit, or `None` on any failure.
    pub async fn get_unit_by_id(&self, id: &str) -> Option<UnitRecord> {
        match self.fetch_unit(id).await {
            Ok(unit) => Some(unit),
            Err(e) => {
                debug!(unit = id, error = %e, "get unit failed");
                None
            }
        }
    }

    /// Best-effort action; no retry.
    pub async fn send_command(&self, id: &str, action: &UnitAction) -> bool {
        match self.post_action(id, action).await {
            Ok(()) => true,
            Err(e) => {
                warn!(unit = id, error = %e, "unit command failed");
                false
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json(&self, url: Url) -> Result<Value, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        self.check_status(resp.status())?;

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    fn check_status(&self, status: reqwest::StatusCode) -> Result<(), Error> {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.authenticated.store(false, Ordering::Release);
            return Err(Error::NotAuthenticated);
        }
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
