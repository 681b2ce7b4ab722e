// ── Unit registry ──
//
// Unit id -> listener. At most one listener per id, the last registration
// wins. Dispatch runs outside the map's shard locks, so a listener may
// register or unregister units from its own callback. Each entry carries a
// gate that removal closes and waits on: once `unregister`/`remove`/`clear`
// has returned, the removed listener is not running and never runs again.
// The one exception is a listener removing itself from inside its own
// callback; that call cannot wait for itself and returns at once.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use touchwand_api::{UnitRecord, UnitStatusListener};
use tracing::{debug, trace};

use crate::listener::UnitUpdateListener;

thread_local! {
    /// Address of the slot whose callback is running on this thread, or 0.
    static DELIVERING: Cell<usize> = const { Cell::new(0) };
}

struct Slot {
    listener: Arc<dyn UnitUpdateListener>,
    active: AtomicBool,
    /// Read-held for the length of each callback.
    gate: RwLock<()>,
}

impl Slot {
    fn new(listener: Arc<dyn UnitUpdateListener>) -> Arc<Self> {
        Arc::new(Self {
            listener,
            active: AtomicBool::new(true),
            gate: RwLock::new(()),
        })
    }

    fn addr(&self) -> usize {
        std::ptr::from_ref(self) as usize
    }

    fn deliver(&self, unit: &UnitRecord) -> bool {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        let _running = Running::enter(self.addr());
        self.listener.on_status_update(unit);
        true
    }

    /// Stop future callbacks and wait out the ones in flight.
    fn retire(&self) {
        self.active.store(false, Ordering::Release);
        if DELIVERING.get() != self.addr() {
            drop(self.gate.write().unwrap_or_else(PoisonError::into_inner));
        }
    }
}

/// Marks a slot as running on this thread; restores the outer mark on drop.
struct Running(usize);

impl Running {
    fn enter(addr: usize) -> Self {
        Self(DELIVERING.replace(addr))
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        DELIVERING.set(self.0);
    }
}

#[derive(Default)]
pub struct UnitRegistry {
    units: DashMap<String, Arc<Slot>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under its unit id, replacing any previous one.
    ///
    /// Returns the listener that was replaced.
    pub fn register(
        &self,
        listener: Arc<dyn UnitUpdateListener>,
    ) -> Option<Arc<dyn UnitUpdateListener>> {
        let id = listener.unit_id().to_owned();
        let previous = self.units.insert(id.clone(), Slot::new(listener))?;
        debug!(unit = %id, "listener replaced");
        previous.retire();
        Some(Arc::clone(&previous.listener))
    }

    /// Remove `listener`, if it is still the one registered under its id.
    ///
    /// A controller that was superseded by a later registration does not
    /// evict its replacement. Idempotent.
    pub fn unregister(&self, listener: &Arc<dyn UnitUpdateListener>) -> bool {
        let removed = self.units.remove_if(listener.unit_id(), |_, slot| {
            Arc::ptr_eq(&slot.listener, listener)
        });
        match removed {
            Some((_, slot)) => {
                slot.retire();
                true
            }
            None => false,
        }
    }

    /// Remove whatever is registered under `id`. Idempotent.
    pub fn remove(&self, id: &str) -> bool {
        match self.units.remove(id) {
            Some((_, slot)) => {
                slot.retire();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.units.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn clear(&self) {
        let ids: Vec<String> = self.units.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            self.remove(&id);
        }
    }

    /// Hand `unit` to the listener registered under its id.
    ///
    /// Returns `false` (and drops the record) when nothing is registered.
    pub fn deliver(&self, unit: &UnitRecord) -> bool {
        let slot = self.units.get(&unit.id).map(|entry| Arc::clone(entry.value()));
        match slot {
            Some(slot) => slot.deliver(unit),
            None => {
                trace!(unit = %unit.id, "no listener registered, update dropped");
                false
            }
        }
    }
}

impl UnitStatusListener for UnitRegistry {
    fn on_unit_status(&self, unit: &UnitRecord) {
        self.deliver(unit);
    }
}
