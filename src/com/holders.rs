//! String-keyed holders of signals and slots.
//!
//! Objects and services expose their signals and slots through these holders
//! so that connections can be made by name (from configuration) with the
//! argument type checked once, at connection time.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ComError;

use super::signal::{Connection, Signal};
use super::slot::{Slot, SlotBase};
use super::worker::Worker;

type AnyArc = Arc<dyn Any + Send + Sync>;

// =============================================================================
// Signals
// =============================================================================

/// Named signals of an object or service. Cloning shares the holder.
#[derive(Clone, Default)]
pub struct Signals {
    map: Arc<RwLock<BTreeMap<String, AnyArc>>>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a signal under `key`.
    pub fn new_signal<A>(&self, key: &str) -> Result<Arc<Signal<A>>, ComError>
    where
        A: Clone + Send + 'static,
    {
        let signal = Signal::<A>::new(key);
        self.insert(key, Arc::clone(&signal))?;
        Ok(signal)
    }

    /// Register an existing signal under `key`.
    pub fn insert<A>(&self, key: &str, signal: Arc<Signal<A>>) -> Result<(), ComError>
    where
        A: Clone + Send + 'static,
    {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(key) {
            return Err(ComError::DuplicateKey(key.to_string()));
        }
        map.insert(key.to_string(), signal as AnyArc);
        Ok(())
    }

    /// Typed lookup.
    pub fn get<A>(&self, key: &str) -> Result<Arc<Signal<A>>, ComError>
    where
        A: Clone + Send + 'static,
    {
        let any = self
            .map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| ComError::UnknownSignal(key.to_string()))?;

        any.downcast::<Signal<A>>()
            .map_err(|_| ComError::SignatureMismatch {
                key: key.to_string(),
                expected: type_name::<A>(),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for Signals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

// =============================================================================
// Slots
// =============================================================================

struct SlotEntry {
    any: AnyArc,
    base: Arc<dyn SlotBase>,
}

/// Named slots of a service. Cloning shares the holder.
#[derive(Clone, Default)]
pub struct Slots {
    map: Arc<RwLock<BTreeMap<String, SlotEntry>>>,
}

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a slot under `key`.
    pub fn new_slot<A, F>(&self, key: &str, func: F) -> Result<Arc<Slot<A>>, ComError>
    where
        A: Send + 'static,
        F: Fn(A) + Send + Sync + 'static,
    {
        let slot = Slot::new(key, func);
        self.insert(key, Arc::clone(&slot))?;
        Ok(slot)
    }

    /// Register an existing slot under `key`.
    pub fn insert<A: Send + 'static>(&self, key: &str, slot: Arc<Slot<A>>) -> Result<(), ComError> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(key) {
            return Err(ComError::DuplicateKey(key.to_string()));
        }
        let base: Arc<dyn SlotBase> = Arc::clone(&slot) as Arc<dyn SlotBase>;
        map.insert(
            key.to_string(),
            SlotEntry {
                any: slot as AnyArc,
                base,
            },
        );
        Ok(())
    }

    /// Typed lookup.
    pub fn get<A: Send + 'static>(&self, key: &str) -> Result<Arc<Slot<A>>, ComError> {
        let any = self
            .map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|entry| Arc::clone(&entry.any))
            .ok_or_else(|| ComError::UnknownSlot(key.to_string()))?;

        any.downcast::<Slot<A>>()
            .map_err(|_| ComError::SignatureMismatch {
                key: key.to_string(),
                expected: type_name::<A>(),
            })
    }

    /// Bind every registered slot to `worker`.
    pub fn set_worker(&self, worker: Option<Arc<Worker>>) {
        for entry in self
            .map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            entry.base.bind_worker(worker.clone());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for Slots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

/// Connect the signal `signal_key` of `signals` to the slot `slot_key` of
/// `slots`.
///
/// # Returns
/// The connection, or a `ComError` if a key is unknown or the argument types
/// differ.
pub fn connect_by_name<A>(
    signals: &Signals,
    signal_key: &str,
    slots: &Slots,
    slot_key: &str,
) -> Result<Connection, ComError>
where
    A: Clone + Send + 'static,
{
    let signal = signals.get::<A>(signal_key)?;
    let slot = slots.get::<A>(slot_key)?;
    Ok(signal.connect(&slot))
}
