//! Bridge, discovery and unit controllers on top of `touchwand-api`.
//!
//! - **[`Bridge`]** owns one hub connection: it authenticates, starts the
//!   event stream and background discovery, and routes unit-status events
//!   through the [`UnitRegistry`] to the controller registered for each id.
//!
//! - **[`DiscoveryLoop`]** lists the hub's units on a fixed delay, keeps
//!   the supported ones and announces them to [`DiscoverySink`]s.
//!
//! - **[`UnitController`]** is the device-side half: it checks its unit on
//!   activation, caches the latest status and sends commands
//!   fire-and-forget on the bridge [`Scheduler`].
//!
//! Reachability of bridges and units is reported as [`ThingStatus`]
//! through `tokio::sync::watch` channels.

pub mod bridge;
pub mod config;
pub mod discovery;
pub mod error;
pub mod listener;
pub mod registry;
pub mod scheduler;
pub mod status;
pub mod unit;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use config::{BridgeConfig, DiscoveryConfig};
pub use discovery::{DiscoveryLoop, DiscoveryResult, UnitKind};
pub use error::CoreError;
pub use listener::{DiscoverySink, UnitUpdateListener};
pub use registry::UnitRegistry;
pub use scheduler::{ScheduledTask, Scheduler};
pub use status::{OfflineReason, ThingStatus};
pub use unit::{CommandOutcome, UnitCommand, UnitController, UnitState};

// Data types callers need alongside the controllers.
pub use touchwand_api::{Error as ApiError, HubClient, UnitAction, UnitRecord, UnitType};
