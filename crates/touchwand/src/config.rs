//! CLI-side config resolution: the shared profile store plus `GlobalOpts`
//! overrides.

use secrecy::SecretString;
use touchwand_core::BridgeConfig;

pub use touchwand_config::{
    Config, ConfigError, Profile, build_bridge_config, config_path, load_config,
    load_config_or_default, profile_to_bridge_config, save_config, store_password,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The profile selected by `--profile`, else the config default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// `ProfileNotFound` listing what the config does define.
pub fn profile_not_found(name: &str, cfg: &Config) -> CliError {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    names.sort();
    CliError::ProfileNotFound {
        name: name.to_owned(),
        available: if names.is_empty() {
            "(none)".into()
        } else {
            names.join(", ")
        },
    }
}

/// Build a `BridgeConfig` from the config file, profile, and CLI overrides.
///
/// Without a matching profile the hub is described by flags alone, which
/// then need at least `--host` and a username.
pub fn resolve_bridge_config(global: &GlobalOpts) -> Result<BridgeConfig, CliError> {
    let cfg = load_config_or_default();

    let (profile_name, mut profile) = match cfg.profile(global.profile.as_deref()) {
        Ok((name, profile)) => (name.to_owned(), profile.clone()),
        Err(ConfigError::UnknownProfile { .. }) => match (&global.host, &global.profile) {
            (Some(host), _) => (active_profile_name(global, &cfg), Profile::new(host.clone())),
            (None, Some(name)) => return Err(profile_not_found(name, &cfg)),
            (None, None) => {
                return Err(CliError::NoConfig {
                    path: config_path().display().to_string(),
                });
            }
        },
        Err(other) => return Err(other.into()),
    };

    apply_overrides(&mut profile, global);

    let timeout = global.timeout.unwrap_or(cfg.defaults.timeout);
    let bridge = match (&profile.username, &global.password) {
        (Some(user), Some(pw)) => build_bridge_config(
            &profile,
            &profile_name,
            timeout,
            user.clone(),
            SecretString::from(pw.clone()),
        )?,
        _ => profile_to_bridge_config(&profile, &profile_name, timeout)?,
    };
    Ok(bridge)
}

fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
}
