//! Watch command: live unit status through the bridge's event stream.

use std::time::Duration;

use owo_colors::OwoColorize;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use touchwand_core::{BridgeConfig, ThingStatus, UnitController, UnitState};

use crate::cli::WatchArgs;
use crate::error::CliError;
use crate::output::{self, Printer};

#[derive(Serialize)]
struct WatchEvent<'a> {
    unit: &'a str,
    name: &'a str,
    status: ThingStatus,
    level: Option<i64>,
}

impl<'a> WatchEvent<'a> {
    fn new(unit: &'a str, state: &'a UnitState) -> Self {
        Self {
            unit,
            name: state.record.as_ref().map_or("", |r| r.label()),
            status: state.status,
            level: state.level,
        }
    }
}

fn line(event: &WatchEvent<'_>, color: bool) -> String {
    let level = event
        .level
        .map_or_else(|| "-".into(), |l| l.to_string());
    let unit = if color {
        event.unit.bold().to_string()
    } else {
        event.unit.to_string()
    };
    format!(
        "{unit}\t{}\t{}\tlevel={level}",
        event.name,
        output::paint_status(event.status, color)
    )
}

pub async fn handle(
    config: BridgeConfig,
    args: WatchArgs,
    printer: &Printer,
) -> Result<(), CliError> {
    let bridge = super::activate(config).await?;

    let units: Vec<_> = bridge
        .client()
        .list_units()
        .await
        .into_iter()
        .filter(|u| args.units.is_empty() || args.units.contains(&u.id))
        .collect();
    if units.is_empty() {
        bridge.dispose().await;
        if args.units.is_empty() {
            return Ok(());
        }
        return Err(CliError::NotFound {
            resource_type: "unit".into(),
            identifier: args.units.join(", "),
            list_command: "units list".into(),
        });
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<(String, UnitState)>();
    let mut forwarders = JoinSet::new();
    let mut controllers = Vec::with_capacity(units.len());

    for unit in &units {
        let controller = UnitController::new(&bridge, unit.id.clone())?;
        controller.activate().await;

        let mut states = controller.watch_state();
        let tx = tx.clone();
        let id = unit.id.clone();
        forwarders.spawn(async move {
            let initial = states.borrow_and_update().clone();
            if tx.send((id.clone(), initial)).is_err() {
                return;
            }
            while states.changed().await.is_ok() {
                let state = states.borrow_and_update().clone();
                if tx.send((id.clone(), state)).is_err() {
                    break;
                }
            }
        });
        controllers.push(controller);
    }
    drop(tx);

    printer.note(&format!("Watching {} unit(s), Ctrl-C to stop", controllers.len()));

    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let mut outcome = Ok(());
    loop {
        tokio::select! {
            biased;
            _ = &mut interrupt => break,
            () = &mut deadline => break,
            msg = rx.recv() => {
                let Some((id, state)) = msg else { break };
                if let Err(e) = printer.record(&WatchEvent::new(&id, &state), line) {
                    outcome = Err(e);
                    break;
                }
            }
        }
    }

    for controller in &controllers {
        controller.deactivate();
    }
    forwarders.abort_all();
    bridge.dispose().await;
    outcome
}
