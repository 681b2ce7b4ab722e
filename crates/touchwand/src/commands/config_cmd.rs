//! Config subcommand handlers.

use std::fmt::Write as _;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output::Printer;

/// Format config for display, masking passwords.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for (name, p) in sorted_profiles(cfg) {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        let _ = writeln!(out, "port = {}", p.port);
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        let _ = writeln!(out, "add_secondary_units = {}", p.add_secondary_units);
        let _ = writeln!(out, "status_refresh_secs = {}", p.status_refresh_secs);
        let _ = writeln!(
            out,
            "discovery_initial_delay_secs = {}",
            p.discovery_initial_delay_secs
        );
        let _ = writeln!(out, "discovery_interval_secs = {}", p.discovery_interval_secs);
        let _ = writeln!(out, "websocket_port = {}", p.websocket_port);
        let _ = writeln!(out, "websocket_reconnect = {}", p.websocket_reconnect);
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out
}

fn sorted_profiles(cfg: &Config) -> Vec<(&String, &Profile)> {
    let mut profiles: Vec<_> = cfg.profiles.iter().collect();
    profiles.sort_by(|a, b| a.0.cmp(b.0));
    profiles
}

/// Make `name` the default profile; it must already exist.
fn select_default(cfg: &mut Config, name: &str) -> Result<(), CliError> {
    if !cfg.profiles.contains_key(name) {
        return Err(config::profile_not_found(name, cfg));
    }
    cfg.default_profile = Some(name.to_owned());
    Ok(())
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts, printer: &Printer) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            printer.text(&config::config_path().display().to_string());
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            printer.text(format_config_redacted(&cfg).trim_end());
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let default = cfg.default_profile.as_deref().unwrap_or_default();
            let lines: Vec<String> = sorted_profiles(&cfg)
                .into_iter()
                .map(|(name, profile)| {
                    let marker = if name == default { "*" } else { " " };
                    format!("{marker} {name}\t{}", profile.host)
                })
                .collect();
            printer.text(&lines.join("\n"));
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            select_default(&mut cfg, &name)?;
            config::save_config(&cfg)?;
            printer.note(&format!("Default profile set to '{name}'"));
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load_config_or_default();
            let profile = config::active_profile_name(global, &cfg);
            let password = rpassword::prompt_password(format!("Password for profile '{profile}': "))?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "must not be empty".into(),
                });
            }
            config::store_password(&profile, &password)?;
            printer.note(&format!("Password stored in keyring for profile '{profile}'"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn redacted_config_masks_password() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                username: Some("admin".into()),
                password: Some("hunter2".into()),
                ..Profile::new("10.0.0.5")
            },
        );

        let out = format_config_redacted(&cfg);
        assert!(out.contains("[profiles.home]"));
        assert!(out.contains("host = \"10.0.0.5\""));
        assert!(out.contains("password = \"****\""));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn select_default_requires_existing_profile() {
        let mut cfg = Config::default();
        cfg.profiles.insert("office".into(), Profile::new("10.0.0.9"));

        let err = select_default(&mut cfg, "lab").unwrap_err();
        assert!(
            matches!(err, CliError::ProfileNotFound { ref available, .. } if available == "office")
        );
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));

        select_default(&mut cfg, "office").unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("office"));
    }
}
