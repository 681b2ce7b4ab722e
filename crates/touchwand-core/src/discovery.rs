// ── Unit discovery ──
//
// Periodically lists the hub's units, keeps the ones this bridge can
// drive, and announces them to discovery sinks. Switch and dimmer units
// additionally have their record pushed to status listeners, so their
// controllers pick up the current level without a separate poll.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use touchwand_api::{HubClient, UnitRecord, UnitStatusListener, UnitType};
use tracing::{debug, warn};

use crate::config::DiscoveryConfig;
use crate::listener::DiscoverySink;
use crate::scheduler::{ScheduledTask, Scheduler};
use crate::status::ThingStatus;

/// Property key holding the unit id; also the representation property.
pub const PROPERTY_ID: &str = "id";
pub const PROPERTY_NAME: &str = "name";

// ── UnitKind ─────────────────────────────────────────────────────────

/// The unit types a bridge can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnitKind {
    Switch,
    Dimmer,
    Shutter,
    WallController,
    AlarmSensor,
}

impl UnitKind {
    pub fn from_unit_type(unit_type: &UnitType) -> Option<Self> {
        match unit_type {
            UnitType::Switch => Some(Self::Switch),
            UnitType::Dimmer => Some(Self::Dimmer),
            UnitType::Shutter => Some(Self::Shutter),
            UnitType::WallController => Some(Self::WallController),
            UnitType::AlarmSensor => Some(Self::AlarmSensor),
            UnitType::Other(_) => None,
        }
    }

    /// Whether discovery also pushes the unit's record to status listeners.
    pub fn emits_status_on_discovery(self) -> bool {
        matches!(self, Self::Switch | Self::Dimmer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Dimmer => "dimmer",
            Self::Shutter => "shutter",
            Self::WallController => "wallcontroller",
            Self::AlarmSensor => "alarmsensor",
        }
    }
}

// ── DiscoveryResult ──────────────────────────────────────────────────

/// One discovered unit, as announced to sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryResult {
    pub unit_id: String,
    pub label: String,
    pub bridge_id: String,
    pub kind: UnitKind,
    pub properties: BTreeMap<String, String>,
}

impl DiscoveryResult {
    pub fn new(unit: &UnitRecord, kind: UnitKind, bridge_id: &str) -> Self {
        let label = unit.label().to_owned();
        let properties = BTreeMap::from([
            (PROPERTY_ID.to_owned(), unit.id.clone()),
            (PROPERTY_NAME.to_owned(), label.clone()),
        ]);
        Self {
            unit_id: unit.id.clone(),
            label,
            bridge_id: bridge_id.to_owned(),
            kind,
            properties,
        }
    }

    /// The property that identifies this result across scans.
    pub fn representation_property(&self) -> &'static str {
        PROPERTY_ID
    }
}

/// The units a scan keeps, with their kind, in input order.
///
/// Units on secondary connectivity are dropped unless `add_secondary_units`
/// is set; unsupported types are always dropped.
pub fn retained_units(
    units: &[UnitRecord],
    add_secondary_units: bool,
) -> impl Iterator<Item = (&UnitRecord, UnitKind)> {
    units.iter().filter_map(move |unit| {
        if !add_secondary_units && !unit.connectivity.is_primary() {
            return None;
        }
        UnitKind::from_unit_type(&unit.unit_type).map(|kind| (unit, kind))
    })
}

// ── DiscoveryLoop ────────────────────────────────────────────────────

/// Background and on-demand unit discovery for one bridge.
///
/// Cheaply cloneable; clones share sinks, listeners and the single-flight
/// guard.
#[derive(Clone)]
pub struct DiscoveryLoop {
    inner: Arc<DiscoveryInner>,
}

struct DiscoveryInner {
    client: Arc<HubClient>,
    bridge_id: String,
    add_secondary_units: bool,
    bridge_status: watch::Receiver<ThingStatus>,
    config: DiscoveryConfig,
    scheduler: Scheduler,
    sinks: ArcSwap<Vec<Arc<dyn DiscoverySink>>>,
    listeners: ArcSwap<Vec<Arc<dyn UnitStatusListener>>>,
    scanning: AtomicBool,
    background: Mutex<Option<ScheduledTask>>,
}

/// Clears the single-flight flag when a scan ends, however it ends.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DiscoveryLoop {
    pub fn new(
        client: Arc<HubClient>,
        bridge_id: impl Into<String>,
        add_secondary_units: bool,
        bridge_status: watch::Receiver<ThingStatus>,
        config: DiscoveryConfig,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            inner: Arc::new(DiscoveryInner {
                client,
                bridge_id: bridge_id.into(),
                add_secondary_units,
                bridge_status,
                config,
                scheduler,
                sinks: ArcSwap::from_pointee(Vec::new()),
                listeners: ArcSwap::from_pointee(Vec::new()),
                scanning: AtomicBool::new(false),
                background: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.inner.config
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Add a discovery sink. Adding the same sink twice is a no-op.
    pub fn add_sink(&self, sink: Arc<dyn DiscoverySink>) {
        add_unique(&self.inner.sinks, sink);
    }

    pub fn remove_sink(&self, sink: &Arc<dyn DiscoverySink>) {
        remove_ptr(&self.inner.sinks, sink);
    }

    /// Add a status listener. Adding the same listener twice is a no-op.
    pub fn register_listener(&self, listener: Arc<dyn UnitStatusListener>) {
        add_unique(&self.inner.listeners, listener);
    }

    pub fn unregister_listener(&self, listener: &Arc<dyn UnitStatusListener>) {
        remove_ptr(&self.inner.listeners, listener);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.load().len()
    }

    // ── Scanning ─────────────────────────────────────────────────────

    pub fn is_scanning(&self) -> bool {
        self.inner.scanning.load(Ordering::Acquire)
    }

    /// Run one discovery cycle and return what it announced.
    ///
    /// A call made while another scan is in flight returns immediately
    /// with nothing. Skipped (with a warning) while the bridge is offline.
    pub async fn scan(&self) -> Vec<DiscoveryResult> {
        let inner = &self.inner;
        if inner.scanning.swap(true, Ordering::AcqRel) {
            debug!("scan already in progress, skipping");
            return Vec::new();
        }
        let _guard = ScanGuard(&inner.scanning);

        if !inner.bridge_status.borrow().is_online() {
            warn!("could not scan units while bridge offline");
            return Vec::new();
        }

        let units = inner.client.list_units().await;
        if units.is_empty() {
            debug!("hub returned no units");
            return Vec::new();
        }

        let sinks = inner.sinks.load_full();
        let listeners = inner.listeners.load_full();
        let mut results = Vec::new();

        for (unit, kind) in retained_units(&units, inner.add_secondary_units) {
            let result = DiscoveryResult::new(unit, kind, &inner.bridge_id);
            for sink in sinks.iter() {
                sink.unit_discovered(&result);
            }
            if kind.emits_status_on_discovery() {
                for listener in listeners.iter() {
                    listener.on_unit_status(unit);
                }
            }
            results.push(result);
        }

        debug!(found = results.len(), listed = units.len(), "discovery scan finished");
        results
    }

    /// A manual scan bounded by the configured scan timeout.
    pub async fn start_scan(&self) -> Vec<DiscoveryResult> {
        let timeout = self.inner.config.scan_timeout;
        if let Ok(results) = tokio::time::timeout(timeout, self.scan()).await {
            results
        } else {
            warn!(timeout_secs = timeout.as_secs(), "discovery scan timed out");
            Vec::new()
        }
    }

    // ── Background job ───────────────────────────────────────────────

    /// Start the repeating scan. No-op if it is already running.
    pub async fn start_background(&self) {
        let mut background = self.inner.background.lock().await;
        if background.as_ref().is_some_and(|task| !task.is_cancelled()) {
            return;
        }

        let config = &self.inner.config;
        debug!(
            initial_delay_secs = config.initial_delay.as_secs(),
            interval_secs = config.interval.as_secs(),
            "starting background discovery"
        );

        let this = self.clone();
        *background = Some(self.inner.scheduler.schedule_with_fixed_delay(
            config.initial_delay,
            config.interval,
            move || {
                let this = this.clone();
                async move {
                    this.scan().await;
                }
            },
        ));
    }

    /// Stop the repeating scan, letting an in-progress scan finish.
    pub async fn stop_background(&self) {
        let task = self.inner.background.lock().await.take();
        if let Some(task) = task {
            task.stop().await;
            debug!("background discovery stopped");
        }
    }

    pub async fn is_background_running(&self) -> bool {
        self.inner
            .background
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_cancelled())
    }
}

// ── Copy-on-write listener lists ─────────────────────────────────────

fn add_unique<T: ?Sized>(list: &ArcSwap<Vec<Arc<T>>>, item: Arc<T>) {
    list.rcu(|current| {
        let mut next = Vec::clone(current);
        if !next.iter().any(|existing| Arc::ptr_eq(existing, &item)) {
            next.push(Arc::clone(&item));
        }
        next
    });
}

fn remove_ptr<T: ?Sized>(list: &ArcSwap<Vec<Arc<T>>>, item: &Arc<T>) {
    list.rcu(|current| {
        current
            .iter()
            .filter(|existing| !Arc::ptr_eq(existing, item))
            .cloned()
            .collect::<Vec<_>>()
    });
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn unit(id: u32, unit_type: &str, connectivity: &str) -> UnitRecord {
        UnitRecord::from_json(&json!({
            "id": id,
            "name": format!("unit {id}"),
            "type": unit_type,
            "connectivity": connectivity,
        }))
        .unwrap()
    }

    fn ids<'a>(retained: impl Iterator<Item = (&'a UnitRecord, UnitKind)>) -> Vec<String> {
        retained.map(|(unit, _)| unit.id.clone()).collect()
    }

    #[test]
    fn secondary_connectivity_dropped_by_default() {
        let units = vec![
            unit(1, "Switch", "zwave"),
            unit(2, "Switch", "rf"),
            unit(3, "shutter", "knx"),
        ];

        assert_eq!(ids(retained_units(&units, false)), vec!["1", "3"]);
        assert_eq!(ids(retained_units(&units, true)), vec!["1", "2", "3"]);
    }

    #[test]
    fn unsupported_types_always_dropped() {
        let units = vec![
            unit(1, "thermostat", "zwave"),
            unit(2, "dimmer", "zwave"),
            unit(3, "scene", "rf"),
        ];

        assert_eq!(ids(retained_units(&units, true)), vec!["2"]);
    }

    #[test]
    fn status_events_only_for_switch_and_dimmer() {
        let emitting: Vec<UnitKind> = [
            UnitKind::Switch,
            UnitKind::Dimmer,
            UnitKind::Shutter,
            UnitKind::WallController,
            UnitKind::AlarmSensor,
        ]
        .into_iter()
        .filter(|kind| kind.emits_status_on_discovery())
        .collect();

        assert_eq!(emitting, vec![UnitKind::Switch, UnitKind::Dimmer]);
    }

    #[test]
    fn result_carries_id_and_name_properties() {
        let result = DiscoveryResult::new(&unit(7, "Switch", "zwave"), UnitKind::Switch, "hub");

        assert_eq!(result.unit_id, "7");
        assert_eq!(result.label, "unit 7");
        assert_eq!(result.bridge_id, "hub");
        assert_eq!(result.properties.get(PROPERTY_ID).unwrap(), "7");
        assert_eq!(result.properties.get(PROPERTY_NAME).unwrap(), "unit 7");
        assert_eq!(result.representation_property(), "id");
    }
}
