//! Configuration for the TouchWand CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `touchwand_core::BridgeConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use touchwand_core::{BridgeConfig, DiscoveryConfig};

/// Keyring service name; entries are keyed `{profile}/password`.
pub const KEYRING_SERVICE: &str = "touchwand";
pub const ENV_PREFIX: &str = "TOUCHWAND_";
pub const PASSWORD_ENV: &str = "TOUCHWAND_PASSWORD";
pub const USERNAME_ENV: &str = "TOUCHWAND_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named hub profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// A named hub profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Hub host name or IP address.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: Option<String>,

    /// Password (plaintext -- prefer keyring or `TOUCHWAND_PASSWORD`).
    pub password: Option<String>,

    /// Also discover units on non-primary connectivity.
    #[serde(default)]
    pub add_secondary_units: bool,

    #[serde(default = "default_status_refresh")]
    pub status_refresh_secs: u64,

    #[serde(default = "default_discovery_initial_delay")]
    pub discovery_initial_delay_secs: u64,

    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_secs: u64,

    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,

    #[serde(default)]
    pub websocket_reconnect: bool,

    /// Override the global timeout.
    pub timeout: Option<u64>,
}

fn default_port() -> u16 {
    80
}
fn default_status_refresh() -> u64 {
    20
}
fn default_discovery_initial_delay() -> u64 {
    5
}
fn default_discovery_interval() -> u64 {
    60
}
fn default_websocket_port() -> u16 {
    1234
}

impl Profile {
    /// A profile for `host` with every other field at its default.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: None,
            password: None,
            add_secondary_units: false,
            status_refresh_secs: default_status_refresh(),
            discovery_initial_delay_secs: default_discovery_initial_delay(),
            discovery_interval_secs: default_discovery_interval(),
            websocket_port: default_websocket_port(),
            websocket_reconnect: false,
            timeout: None,
        }
    }
}

impl Config {
    /// Pick a profile: the named one, else `default_profile`, else the only
    /// profile if there is exactly one.
    ///
    /// An explicit name never falls back.
    pub fn profile<'a>(&'a self, name: Option<&str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let lookup = |name: &str| {
            self.profiles
                .get_key_value(name)
                .map(|(name, profile)| (name.as_str(), profile))
        };

        if let Some(name) = name {
            return lookup(name).ok_or_else(|| ConfigError::UnknownProfile { name: name.into() });
        }
        if let Some(found) = self.default_profile.as_deref().and_then(lookup) {
            return Ok(found);
        }
        match self.profiles.iter().next() {
            Some((name, profile)) if self.profiles.len() == 1 => Ok((name.as_str(), profile)),
            _ => Err(ConfigError::UnknownProfile {
                name: self.default_profile.clone().unwrap_or_default(),
            }),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "touchwand", "touchwand").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("touchwand");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` + environment.
///
/// Environment keys nest with `__`, e.g.
/// `TOUCHWAND_PROFILES__HOME__HOST=10.0.0.5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve username + password: env, then keyring, then plaintext.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    resolve_credentials_with(profile, profile_name, |key| std::env::var(key).ok(), keyring_password)
}

/// Credential chain with injectable env and keyring lookups.
pub fn resolve_credentials_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<(String, SecretString), ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| env(USERNAME_ENV))
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    // 1. Env var
    if let Some(pw) = env(PASSWORD_ENV) {
        return Ok((username, SecretString::from(pw)));
    }

    // 2. Keyring
    if let Some(pw) = keyring(profile_name) {
        return Ok((username, SecretString::from(pw)));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

fn keyring_password(profile_name: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .and_then(|entry| entry.get_password())
        .ok()
}

/// Store a profile password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Translation ─────────────────────────────────────────────────────

/// Validate a profile and build a `BridgeConfig` from it.
pub fn profile_to_bridge_config(
    profile: &Profile,
    profile_name: &str,
    default_timeout: u64,
) -> Result<BridgeConfig, ConfigError> {
    let (username, password) = resolve_credentials(profile, profile_name)?;
    build_bridge_config(profile, profile_name, default_timeout, username, password)
}

/// Build a `BridgeConfig` from a profile and already-resolved credentials.
pub fn build_bridge_config(
    profile: &Profile,
    profile_name: &str,
    default_timeout: u64,
    username: String,
    password: SecretString,
) -> Result<BridgeConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }
    for (field, port) in [("port", profile.port), ("websocket_port", profile.websocket_port)] {
        if port == 0 {
            return Err(ConfigError::Validation {
                field: field.into(),
                reason: "must be between 1 and 65535".into(),
            });
        }
    }
    if profile.discovery_interval_secs == 0 {
        return Err(ConfigError::Validation {
            field: "discovery_interval_secs".into(),
            reason: "must be at least 1".into(),
        });
    }

    Ok(BridgeConfig {
        bridge_id: profile_name.into(),
        host: profile.host.trim().into(),
        port: profile.port,
        username,
        password,
        add_secondary_units: profile.add_secondary_units,
        status_refresh_interval: Duration::from_secs(profile.status_refresh_secs),
        discovery: DiscoveryConfig {
            initial_delay: Duration::from_secs(profile.discovery_initial_delay_secs),
            interval: Duration::from_secs(profile.discovery_interval_secs),
            ..DiscoveryConfig::default()
        },
        websocket_port: profile.websocket_port,
        websocket_reconnect: profile.websocket_reconnect,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(default_timeout)),
        ..BridgeConfig::default()
    })
}
