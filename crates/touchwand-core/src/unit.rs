// ── Unit controller ──
//
// Device-side counterpart of one hub unit. Registers with its bridge to
// receive status updates, checks the hub for reachability on activation,
// and forwards commands without waiting for the hub's answer.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use touchwand_api::{UnitAction, UnitRecord};
use tracing::{debug, warn};

use crate::bridge::Bridge;
use crate::error::CoreError;
use crate::listener::UnitUpdateListener;
use crate::status::{OfflineReason, ThingStatus};

/// Cached view of one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnitState {
    pub status: ThingStatus,
    /// Last integer level the hub reported.
    pub level: Option<i64>,
    /// Most recent record, from a reachability check, a discovery scan or the event stream.
    pub record: Option<UnitRecord>,
}

/// A command addressed to one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitCommand {
    /// Report the cached state; no hub I/O.
    Refresh,
    Action(UnitAction),
}

impl From<UnitAction> for UnitCommand {
    fn from(action: UnitAction) -> Self {
        Self::Action(action)
    }
}

/// What [`UnitController::handle_command`] did with a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The cached state, for `Refresh`.
    Cached(UnitState),
    /// The action was queued on the bridge scheduler.
    Dispatched,
    /// The bridge is gone; nothing was sent.
    Dropped,
}

/// Cheaply cloneable handle to one unit's controller.
#[derive(Clone)]
pub struct UnitController {
    unit: Arc<UnitShared>,
    bridge: Bridge,
}

struct UnitShared {
    id: String,
    state: watch::Sender<UnitState>,
}

impl UnitUpdateListener for UnitShared {
    fn unit_id(&self) -> &str {
        &self.id
    }

    fn on_status_update(&self, unit: &UnitRecord) {
        self.state.send_modify(|state| {
            if let Some(level) = unit.level() {
                state.level = Some(level);
            }
            if unit.is_alive() {
                state.status = ThingStatus::Online;
            } else if let Some(tag) = unit.liveness.as_deref() {
                debug!(unit = %self.id, tag, "liveness tag leaves reachability unchanged");
            }
            state.record = Some(unit.clone());
        });
    }
}

impl UnitController {
    /// Create a controller for unit `id` on `bridge`. The id must be non-empty.
    pub fn new(bridge: &Bridge, id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::Config {
                message: "unit id must not be empty".into(),
            });
        }
        let (state, _) = watch::channel(UnitState::default());
        Ok(Self {
            unit: Arc::new(UnitShared { id, state }),
            bridge: bridge.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.unit.id
    }

    pub fn state(&self) -> UnitState {
        self.unit.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn watch_state(&self) -> watch::Receiver<UnitState> {
        self.unit.state.subscribe()
    }

    fn listener(&self) -> Arc<dyn UnitUpdateListener> {
        Arc::clone(&self.unit) as Arc<dyn UnitUpdateListener>
    }

    fn set_status(&self, status: ThingStatus) {
        self.unit.state.send_modify(|state| state.status = status);
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Register with the bridge and check the hub for this unit.
    ///
    /// Reports Offline(BridgeOffline) first when the bridge is not online;
    /// the check then decides Online or Offline(CommunicationError).
    pub async fn activate(&self) -> ThingStatus {
        self.set_status(ThingStatus::Unknown);
        if !self.bridge.status().is_online() {
            self.set_status(ThingStatus::Offline(OfflineReason::BridgeOffline));
        }

        self.bridge.register_unit(self.listener());

        let status = match self.bridge.client().get_unit_by_id(&self.unit.id).await {
            Some(record) => {
                self.unit.state.send_modify(|state| {
                    if let Some(level) = record.level() {
                        state.level = Some(level);
                    }
                    state.record = Some(record);
                    state.status = ThingStatus::Online;
                });
                ThingStatus::Online
            }
            None => {
                warn!(unit = %self.unit.id, "unit reachability check failed");
                let status = ThingStatus::Offline(OfflineReason::CommunicationError);
                self.set_status(status);
                status
            }
        };
        debug!(unit = %self.unit.id, %status, "unit activated");
        status
    }

    /// Run [`activate()`](Self::activate) on the bridge scheduler.
    pub fn initialize(&self) {
        let unit = self.clone();
        self.bridge.scheduler().spawn(async move {
            unit.activate().await;
        });
    }

    /// Stop receiving updates. Idempotent.
    pub fn deactivate(&self) {
        self.bridge.unregister_unit(&self.listener());
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Handle a command without blocking.
    ///
    /// `Refresh` answers from the cache. Actions are sent on the bridge
    /// scheduler; their outcome is only logged.
    pub fn handle_command(&self, command: UnitCommand) -> CommandOutcome {
        match command {
            UnitCommand::Refresh => CommandOutcome::Cached(self.state()),
            UnitCommand::Action(action) => {
                if self.bridge.scheduler().is_shut_down() {
                    debug!(unit = %self.unit.id, "bridge shut down, command dropped");
                    return CommandOutcome::Dropped;
                }
                let client = Arc::clone(self.bridge.client());
                let id = self.unit.id.clone();
                self.bridge.scheduler().spawn(async move {
                    if client.send_command(&id, &action).await {
                        debug!(unit = %id, ?action, "command sent");
                    }
                });
                CommandOutcome::Dispatched
            }
        }
    }

    /// Apply a status record as if it came from the bridge.
    pub fn on_status_update(&self, unit: &UnitRecord) {
        self.unit.on_status_update(unit);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::config::BridgeConfig;

    fn controller() -> UnitController {
        let bridge = Bridge::new(BridgeConfig::default()).unwrap();
        UnitController::new(&bridge, "7").unwrap()
    }

    fn record(value: serde_json::Value) -> UnitRecord {
        UnitRecord::from_json(&value).unwrap()
    }

    #[test]
    fn empty_id_is_a_configuration_error() {
        let bridge = Bridge::new(BridgeConfig::default()).unwrap();
        assert!(matches!(
            UnitController::new(&bridge, " "),
            Err(CoreError::Config { .. })
        ));
    }

    #[test]
    fn alive_tag_sets_online() {
        let unit = controller();
        unit.on_status_update(&record(json!({ "id": 7, "type": "Switch", "status": "ALIVE" })));
        assert_eq!(unit.state().status, ThingStatus::Online);
    }

    #[test]
    fn other_liveness_tags_leave_status_unchanged() {
        let unit = controller();
        unit.set_status(ThingStatus::Offline(OfflineReason::CommunicationError));

        unit.on_status_update(&record(json!({ "id": 7, "type": "Switch", "status": "DEAD" })));

        let state = unit.state();
        assert_eq!(
            state.status,
            ThingStatus::Offline(OfflineReason::CommunicationError)
        );
        assert_eq!(state.record.unwrap().liveness.as_deref(), Some("DEAD"));
    }

    #[test]
    fn level_updates_cached_level() {
        let unit = controller();
        unit.on_status_update(&record(json!({ "id": 7, "type": "dimmer", "currStatus": 128 })));
        unit.on_status_update(&record(json!({ "id": 7, "type": "dimmer", "status": "ALIVE" })));

        assert_eq!(unit.state().level, Some(128));
    }

    #[test]
    fn refresh_returns_cached_state() {
        let unit = controller();
        unit.on_status_update(&record(json!({ "id": 7, "type": "Switch", "currStatus": 255 })));

        match unit.handle_command(UnitCommand::Refresh) {
            CommandOutcome::Cached(state) => assert_eq!(state.level, Some(255)),
            other => panic!("expected cached state, got {other:?}"),
        }
    }
}
