//! Command dispatch: bridges CLI args -> core calls -> output formatting.

pub mod config_cmd;
pub mod discover;
pub mod units;
pub mod watch;

use touchwand_core::{Bridge, BridgeConfig};

use crate::cli::Command;
use crate::error::CliError;
use crate::output::Printer;

/// Dispatch a hub-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: BridgeConfig,
    printer: &Printer,
) -> Result<(), CliError> {
    match cmd {
        Command::Units(args) => units::handle(&connect(config).await?, args, printer).await,
        Command::Discover(args) => discover::handle(config, &args, printer).await,
        Command::Watch(args) => watch::handle(config, args, printer).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not need a hub and is handled before dispatch".into(),
        )),
    }
}

/// Build a bridge and log in, surfacing the login error as-is.
///
/// Used by one-shot commands that talk to the REST API only.
async fn connect(config: BridgeConfig) -> Result<Bridge, CliError> {
    let profile = config.bridge_id.clone();
    let bridge = Bridge::new(config)?;
    let cfg = bridge.config();
    bridge
        .client()
        .login(&cfg.username, &cfg.password)
        .await
        .map_err(|e| match e {
            touchwand_core::ApiError::Authentication { .. } => CliError::AuthFailed { profile },
            other => other.into(),
        })?;
    Ok(bridge)
}

/// Activate a full bridge (login, event stream, discovery timer).
async fn activate(config: BridgeConfig) -> Result<Bridge, CliError> {
    let bridge = Bridge::new(config)?;
    if !bridge.activate().await.is_online() {
        let host = bridge.config().host.clone();
        bridge.dispose().await;
        return Err(CliError::BridgeOffline { host });
    }
    Ok(bridge)
}
