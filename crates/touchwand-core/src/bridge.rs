// ── Bridge controller ──
//
// Lifecycle of one hub connection: authenticate, start the event stream
// and background discovery, and route unit-status events to the unit
// controller registered for each id.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use touchwand_api::{
    EventStream, HubAddress, HubClient, ReconnectConfig, StreamConfig, StreamState,
    TransportConfig, UnitStatusListener,
};
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::discovery::DiscoveryLoop;
use crate::error::CoreError;
use crate::listener::{DiscoverySink, UnitUpdateListener};
use crate::registry::UnitRegistry;
use crate::scheduler::Scheduler;
use crate::status::{OfflineReason, ThingStatus};

/// The hub-side controller.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. Owns the hub client, the
/// event stream, the unit registry, the discovery loop and the scheduler
/// that runs all of the bridge's background work.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    client: Arc<HubClient>,
    stream: EventStream,
    registry: Arc<UnitRegistry>,
    discovery: DiscoveryLoop,
    scheduler: Scheduler,
    status: watch::Sender<ThingStatus>,
    disposed: AtomicBool,
    /// Held while activation starts background work and while disposal
    /// tears it down, so the two never interleave.
    lifecycle: Mutex<()>,
}

impl Bridge {
    /// Build a bridge from configuration. Does NOT connect -- call
    /// [`activate()`](Self::activate) or [`initialize()`](Self::initialize).
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        let address = HubAddress::new(config.host.clone(), config.port);
        let transport = TransportConfig {
            timeout: config.timeout,
            ..TransportConfig::default()
        };
        let client = HubClient::new(&address, &transport)?;
        Self::with_client(config, client)
    }

    /// Build a bridge around an existing client (custom HTTP stack, tests).
    ///
    /// The event stream still connects to `config.host:config.websocket_port`.
    pub fn with_client(config: BridgeConfig, client: HubClient) -> Result<Self, CoreError> {
        let address = HubAddress::new(config.host.clone(), config.port);
        let mut stream_config = StreamConfig::new(address.websocket_url(config.websocket_port)?);
        stream_config.keepalive_interval = config.keepalive_interval;
        if config.websocket_reconnect {
            stream_config.reconnect = ReconnectConfig::enabled();
        }

        let client = Arc::new(client);
        let registry = Arc::new(UnitRegistry::new());
        let scheduler = Scheduler::new();
        let (status, status_rx) = watch::channel(ThingStatus::Unknown);

        let stream = EventStream::new(stream_config);
        stream.register_listener(Arc::clone(&registry) as Arc<dyn UnitStatusListener>);

        let discovery = DiscoveryLoop::new(
            Arc::clone(&client),
            config.bridge_id.clone(),
            config.add_secondary_units,
            status_rx,
            config.discovery.clone(),
            scheduler.clone(),
        );
        discovery.register_listener(Arc::clone(&registry) as Arc<dyn UnitStatusListener>);

        Ok(Self {
            inner: Arc::new(BridgeInner {
                config,
                client,
                stream,
                registry,
                discovery,
                scheduler,
                status,
                disposed: AtomicBool::new(false),
                lifecycle: Mutex::new(()),
            }),
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn bridge_id(&self) -> &str {
        &self.inner.config.bridge_id
    }

    pub fn client(&self) -> &Arc<HubClient> {
        &self.inner.client
    }

    pub fn is_add_secondary_units(&self) -> bool {
        self.inner.config.add_secondary_units
    }

    pub fn status_refresh_interval(&self) -> Duration {
        self.inner.config.status_refresh_interval
    }

    pub fn status(&self) -> ThingStatus {
        *self.inner.status.borrow()
    }

    /// Subscribe to bridge status changes.
    pub fn watch_status(&self) -> watch::Receiver<ThingStatus> {
        self.inner.status.subscribe()
    }

    pub fn stream_state(&self) -> watch::Receiver<StreamState> {
        self.inner.stream.state()
    }

    pub fn discovery(&self) -> &DiscoveryLoop {
        &self.inner.discovery
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.inner.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Authenticate and start background work.
    ///
    /// On success the bridge goes Online and the event stream and
    /// background discovery are started. On failure it goes
    /// Offline(CommunicationError) and neither is started.
    ///
    /// A bridge disposed while the login is in flight stays
    /// Offline(Disposed) and starts nothing.
    pub async fn activate(&self) -> ThingStatus {
        let inner = &self.inner;
        if !self.transition(ThingStatus::Unknown) {
            return self.status();
        }

        if !inner
            .client
            .connect(&inner.config.username, &inner.config.password)
            .await
        {
            warn!(host = %inner.config.host, "hub unreachable or credentials rejected");
            self.transition(ThingStatus::Offline(OfflineReason::CommunicationError));
            return self.status();
        }

        let _lifecycle = inner.lifecycle.lock().await;
        if !self.transition(ThingStatus::Online) {
            debug!(bridge = %inner.config.bridge_id, "bridge disposed during activation");
            return self.status();
        }
        info!(host = %inner.config.host, bridge = %inner.config.bridge_id, "bridge online");
        inner.stream.connect().await;
        inner.discovery.start_background().await;
        ThingStatus::Online
    }

    /// Run [`activate()`](Self::activate) on the bridge scheduler and return
    /// immediately.
    pub fn initialize(&self) {
        let bridge = self.clone();
        self.inner.scheduler.spawn(async move {
            bridge.activate().await;
        });
    }

    /// Stop discovery, close the event stream, clear the registry and shut
    /// down the scheduler, in that order. Idempotent.
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(bridge = %self.inner.config.bridge_id, "disposing bridge");

        {
            let _lifecycle = self.inner.lifecycle.lock().await;
            // Offline first, so a scan triggered from elsewhere bails out.
            self.inner
                .status
                .send_replace(ThingStatus::Offline(OfflineReason::Disposed));
            self.inner.discovery.stop_background().await;
            self.inner.stream.dispose().await;
            self.inner.registry.clear();
        }
        // Outside the lock: a pending `initialize()` may be waiting on it.
        self.inner.scheduler.shutdown().await;
    }

    // ── Registry ─────────────────────────────────────────────────────

    /// Register a unit controller. A later registration for the same id
    /// replaces this one.
    pub fn register_unit(&self, listener: Arc<dyn UnitUpdateListener>) {
        if self.is_disposed() {
            debug!(unit = listener.unit_id(), "bridge disposed, registration ignored");
            return;
        }
        self.inner.registry.register(listener);
    }

    /// Unregister a unit controller. Idempotent.
    pub fn unregister_unit(&self, listener: &Arc<dyn UnitUpdateListener>) {
        self.inner.registry.unregister(listener);
    }

    pub fn add_discovery_sink(&self, sink: Arc<dyn DiscoverySink>) {
        self.inner.discovery.add_sink(sink);
    }

    /// Publish `status` unless the bridge has been disposed.
    fn transition(&self, status: ThingStatus) -> bool {
        self.inner.status.send_if_modified(|current| {
            if self.inner.disposed.load(Ordering::Acquire) {
                return false;
            }
            *current = status;
            true
        })
    }
}
