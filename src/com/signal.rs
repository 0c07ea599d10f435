//! Typed signals, connections and blockers.
//!
//! ```text
//!   Signal<A> ──connect(slot)──► Connection ──block()──► Blocker (RAII)
//!       │
//!       ├── emit(a)        : every unblocked slot, caller thread, connection order
//!       └── async_emit(a)  : every unblocked slot, posted on its worker
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{trace, warn};

use super::slot::Slot;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

struct ConnectionEntry<A> {
    id: u64,
    slot: Arc<Slot<A>>,
    blocked: Arc<AtomicUsize>,
}

impl<A> ConnectionEntry<A> {
    fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst) > 0
    }
}

// =============================================================================
// Signal
// =============================================================================

/// A named event carrying values of type `A` to connected slots.
pub struct Signal<A> {
    name: String,
    connections: RwLock<Vec<Arc<ConnectionEntry<A>>>>,
}

impl<A: Clone + Send + 'static> Signal<A> {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            connections: RwLock::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connect `slot`.
    ///
    /// Connecting a slot that is already connected returns the existing
    /// connection.
    pub fn connect(self: &Arc<Self>, slot: &Arc<Slot<A>>) -> Connection {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let entry = match connections.iter().find(|c| Arc::ptr_eq(&c.slot, slot)) {
            Some(existing) => Arc::clone(existing),
            None => {
                let entry = Arc::new(ConnectionEntry {
                    id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                    slot: Arc::clone(slot),
                    blocked: Arc::new(AtomicUsize::new(0)),
                });
                connections.push(Arc::clone(&entry));
                trace!(signal = %self.name, slot = %slot.name(), "connected");
                entry
            }
        };

        let signal: Weak<dyn SignalBase> = Arc::downgrade(self) as Weak<dyn SignalBase>;
        Connection {
            id: entry.id,
            blocked: Arc::clone(&entry.blocked),
            signal,
        }
    }

    /// Remove the connection to `slot`, if any.
    pub fn disconnect(&self, slot: &Arc<Slot<A>>) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|c| !Arc::ptr_eq(&c.slot, slot));
    }

    pub fn disconnect_all(&self) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn connection_count(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn snapshot(&self) -> Vec<Arc<ConnectionEntry<A>>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Call every unblocked slot synchronously, in connection order.
    pub fn emit(&self, args: A) {
        for connection in self.snapshot() {
            if connection.is_blocked() {
                continue;
            }
            connection.slot.run(args.clone());
        }
    }

    /// Schedule every unblocked slot on its worker, in connection order.
    ///
    /// Slots that have no worker run inline on the caller thread.
    pub fn async_emit(&self, args: A) {
        for connection in self.snapshot() {
            if connection.is_blocked() {
                continue;
            }
            if connection.slot.worker().is_none() {
                connection.slot.run(args.clone());
                continue;
            }
            if let Err(e) = connection.slot.async_run(args.clone()) {
                warn!(
                    signal = %self.name,
                    slot = %connection.slot.name(),
                    error = %e,
                    "could not schedule slot"
                );
            }
        }
    }
}

impl<A> std::fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("name", &self.name).finish()
    }
}

/// Type-erased signal operations used by [`Connection`].
trait SignalBase: Send + Sync {
    fn disconnect_id(&self, id: u64);
    fn has_connection(&self, id: u64) -> bool;
}

impl<A: Send + 'static> SignalBase for Signal<A> {
    fn disconnect_id(&self, id: u64) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|c| c.id != id);
    }

    fn has_connection(&self, id: u64) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|c| c.id == id)
    }
}

// =============================================================================
// Connection / Blocker
// =============================================================================

/// Handle on one signal-to-slot connection.
#[derive(Clone)]
pub struct Connection {
    id: u64,
    blocked: Arc<AtomicUsize>,
    signal: Weak<dyn SignalBase>,
}

impl Connection {
    /// Block the connection until the returned guard is dropped.
    ///
    /// Blockers nest: the connection is delivered again once every blocker
    /// has been released.
    pub fn block(&self) -> Blocker {
        self.blocked.fetch_add(1, Ordering::SeqCst);
        Blocker {
            blocked: Arc::clone(&self.blocked),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst) > 0
    }

    pub fn is_connected(&self) -> bool {
        self.signal
            .upgrade()
            .is_some_and(|signal| signal.has_connection(self.id))
    }

    pub fn disconnect(&self) {
        if let Some(signal) = self.signal.upgrade() {
            signal.disconnect_id(self.id);
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

/// Keeps a connection blocked while alive.
#[must_use = "the connection is unblocked as soon as the blocker is dropped"]
#[derive(Debug)]
pub struct Blocker {
    blocked: Arc<AtomicUsize>,
}

impl Drop for Blocker {
    fn drop(&mut self) {
        self.blocked.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A set of connections released together.
#[derive(Debug, Default)]
pub struct Connections {
    connections: Vec<Connection>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Block every connection of the set.
    pub fn block(&self) -> Vec<Blocker> {
        self.connections.iter().map(Connection::block).collect()
    }

    pub fn disconnect(&mut self) {
        for connection in self.connections.drain(..) {
            connection.disconnect();
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
