//! Discovery command handler.

use tabled::Tabled;
use touchwand_core::{BridgeConfig, DiscoveryResult};

use crate::cli::DiscoverArgs;
use crate::error::CliError;
use crate::output::Printer;

#[derive(Tabled)]
struct DiscoveryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Bridge")]
    bridge: String,
}

impl From<&DiscoveryResult> for DiscoveryRow {
    fn from(r: &DiscoveryResult) -> Self {
        Self {
            id: r.unit_id.clone(),
            label: r.label.clone(),
            kind: r.kind.as_str(),
            bridge: r.bridge_id.clone(),
        }
    }
}

pub async fn handle(
    mut config: BridgeConfig,
    args: &DiscoverArgs,
    printer: &Printer,
) -> Result<(), CliError> {
    if args.secondary {
        config.add_secondary_units = true;
    }

    let bridge = super::activate(config).await?;
    let results = bridge.discovery().start_scan().await;
    bridge.dispose().await;

    if results.is_empty() && !printer.is_structured() {
        printer.note("No supported units found");
        return Ok(());
    }
    printer.list(&results, |r| DiscoveryRow::from(r), |r| r.unit_id.clone())
}
