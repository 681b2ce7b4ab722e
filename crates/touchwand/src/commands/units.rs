//! Unit command handlers.

use tabled::Tabled;
use touchwand_core::{ApiError, Bridge, CoreError, UnitAction, UnitRecord};

use crate::cli::{ShutterDirection, SwitchState, UnitsArgs, UnitsCommand};
use crate::error::CliError;
use crate::output::Printer;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    unit_type: String,
    #[tabled(rename = "Connectivity")]
    connectivity: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&UnitRecord> for UnitRow {
    fn from(u: &UnitRecord) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            unit_type: u.unit_type.to_string(),
            connectivity: u.connectivity.to_string(),
            level: u.level().map(|l| l.to_string()).unwrap_or_default(),
            status: u.liveness.clone().unwrap_or_default(),
        }
    }
}

fn detail(u: &UnitRecord) -> String {
    [
        format!("ID:           {}", u.id),
        format!("Name:         {}", u.label()),
        format!("Type:         {}", u.unit_type),
        format!("Connectivity: {}", u.connectivity),
        format!(
            "Level:        {}",
            u.level().map_or_else(|| "-".into(), |l| l.to_string())
        ),
        format!("Status:       {}", u.liveness.as_deref().unwrap_or("-")),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(bridge: &Bridge, args: UnitsArgs, printer: &Printer) -> Result<(), CliError> {
    let client = bridge.client();
    match args.command {
        UnitsCommand::List => {
            let units = client.fetch_units().await?;
            printer.list(&units, |u| UnitRow::from(u), |u| u.id.clone())
        }

        UnitsCommand::Get { id } => {
            let unit = client
                .fetch_unit(&id)
                .await
                .map_err(|e| not_found_for(e, &id))?;
            printer.item(&unit, detail, |u| u.id.clone())
        }

        UnitsCommand::Switch { id, state } => {
            let action = UnitAction::Switch(matches!(state, SwitchState::On));
            send(bridge, &id, &action, printer).await
        }

        UnitsCommand::Dim { id, level } => send(bridge, &id, &UnitAction::Level(level), printer).await,

        UnitsCommand::Shutter { id, direction } => {
            let action = match direction {
                ShutterDirection::Up => UnitAction::ShutterUp,
                ShutterDirection::Down => UnitAction::ShutterDown,
                ShutterDirection::Stop => UnitAction::ShutterStop,
            };
            send(bridge, &id, &action, printer).await
        }
    }
}

async fn send(
    bridge: &Bridge,
    id: &str,
    action: &UnitAction,
    printer: &Printer,
) -> Result<(), CliError> {
    bridge
        .client()
        .post_action(id, action)
        .await
        .map_err(|e| not_found_for(e, id))?;
    printer.note(&format!("Command sent to unit {id}"));
    Ok(())
}

fn not_found_for(err: ApiError, id: &str) -> CliError {
    CoreError::from(err).for_unit(id).into()
}
