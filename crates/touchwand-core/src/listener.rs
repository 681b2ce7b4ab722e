// Upward interfaces: what the bridge calls on the things attached to it.

use touchwand_api::UnitRecord;

use crate::discovery::DiscoveryResult;

/// A device-side controller that wants status updates for one unit.
///
/// `on_status_update` runs without any registry lock held, so it may
/// register or unregister units on the [`UnitRegistry`](crate::UnitRegistry).
/// Once unregistered, a listener receives no further calls.
pub trait UnitUpdateListener: Send + Sync {
    /// The unit id this listener is registered under.
    fn unit_id(&self) -> &str;

    fn on_status_update(&self, unit: &UnitRecord);
}

/// Receives a result for every unit a discovery scan retains.
pub trait DiscoverySink: Send + Sync {
    fn unit_discovered(&self, result: &DiscoveryResult);
}
