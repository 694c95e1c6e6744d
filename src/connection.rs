//! Connection handles.

use slotmap::new_key_type;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Weak;

new_key_type! {
    /// Generational key of a slot inside a signal's arena.
    pub struct ConnectionKey;
}

/// What a [`Connection`] needs from the signal it belongs to.
///
/// Implemented by every signal regardless of its callback signature, so a
/// connection can route back to its signal without being generic over it.
pub(crate) trait SignalBase {
    fn is_connected(&self, key: ConnectionKey) -> bool;

    /// Invalidate the slot and sweep it unless a dispatch is running.
    fn disconnect(&self, key: ConnectionKey);
}

/// A handle to one subscription on a [`Signal`](crate::Signal).
///
/// Connections are cheap to clone and every clone refers to the same
/// subscription: disconnecting through one copy is observed by all of them.
/// A default-constructed connection is detached; it is never valid and
/// disconnecting it does nothing.
#[derive(Clone, Default)]
pub struct Connection {
    index: Option<u64>,
    fire_once: bool,
    key: ConnectionKey,
    signal: Option<Weak<dyn SignalBase>>,
}

impl Connection {
    pub(crate) fn new(
        index: u64,
        fire_once: bool,
        key: ConnectionKey,
        signal: Weak<dyn SignalBase>,
    ) -> Self {
        Self {
            index: Some(index),
            fire_once,
            key,
            signal: Some(signal),
        }
    }

    /// Stop the subscription.
    ///
    /// Safe to call any number of times; only the first call on a live
    /// connection has an effect. If the signal is currently dispatching, the
    /// slot is skipped for the rest of that dispatch and removed afterwards.
    pub fn disconnect(&self) {
        if let Some(signal) = self.signal.as_ref().and_then(Weak::upgrade) {
            signal.disconnect(self.key);
        }
    }

    /// Whether the subscription is still active.
    ///
    /// Becomes `false` on disconnect, after a fire-once callback has run, or
    /// when the owning signal is dropped.
    pub fn valid(&self) -> bool {
        self.signal
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|signal| signal.is_connected(self.key))
    }

    /// Dispatch position within the owning signal, `None` when detached.
    pub fn index(&self) -> Option<u64> {
        self.index
    }

    pub fn fire_once(&self) -> bool {
        self.fire_once
    }

    /// Address of the owning signal, used to tell apart equal indices issued
    /// by different signals.
    fn signal_addr(&self) -> usize {
        self.signal
            .as_ref()
            .map_or(0, |signal| signal.as_ptr() as *const () as usize)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.signal_addr() == other.signal_addr()
    }
}

impl Eq for Connection {}

impl PartialOrd for Connection {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Connection {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index
            .cmp(&other.index)
            .then_with(|| self.signal_addr().cmp(&other.signal_addr()))
    }
}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.signal_addr().hash(state);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("index", &self.index)
            .field("fire_once", &self.fire_once)
            .field("valid", &self.valid())
            .finish()
    }
}
