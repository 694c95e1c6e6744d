//! Generational arena storage for signal slots.
//!
//! Every subscription gets a slot in a slot map keyed by a generational
//! [`ConnectionKey`]. A key whose slot has been swept never resolves again, so
//! a connection handle that outlives its slot simply reads as disconnected.
//! Dispatch order comes from a separate index map, not from the arena.

use crate::connection::ConnectionKey;
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Keys captured at the start of a dispatch.
pub(crate) type Snapshot = SmallVec<[ConnectionKey; 8]>;

/// A registered callback and the state of its connection.
pub(crate) struct Slot<F: ?Sized> {
    /// Dispatch position, unique for the lifetime of the owning signal.
    pub index: u64,
    /// Cleared exactly once, when the connection is disconnected.
    pub valid: bool,
    pub fire_once: bool,
    pub callback: Rc<F>,
}

/// Slot arena for a single signal.
pub(crate) struct SlotStorage<F: ?Sized> {
    slots: SlotMap<ConnectionKey, Slot<F>>,
    /// Index -> key, so iteration follows subscription order.
    order: BTreeMap<u64, ConnectionKey>,
    next_index: u64,
}

impl<F: ?Sized> SlotStorage<F> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: BTreeMap::new(),
            next_index: 0,
        }
    }

    /// Store a callback and return its key and dispatch index.
    pub fn insert(&mut self, callback: Rc<F>, fire_once: bool) -> (ConnectionKey, u64) {
        let index = self.next_index;
        self.next_index += 1;

        let key = self.slots.insert(Slot {
            index,
            valid: true,
            fire_once,
            callback,
        });
        self.order.insert(index, key);
        (key, index)
    }

    /// Number of registered slots, swept or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether `key` names a slot that is still connected.
    pub fn is_valid(&self, key: ConnectionKey) -> bool {
        self.slots.get(key).is_some_and(|slot| slot.valid)
    }

    /// Mark a slot disconnected. Returns `true` only on the first call.
    pub fn invalidate(&mut self, key: ConnectionKey) -> bool {
        match self.slots.get_mut(key) {
            Some(slot) if slot.valid => {
                slot.valid = false;
                true
            }
            _ => false,
        }
    }

    /// Mark every slot disconnected, returning how many were still valid.
    pub fn invalidate_all(&mut self) -> usize {
        let mut count = 0;
        for (_, slot) in self.slots.iter_mut() {
            if slot.valid {
                slot.valid = false;
                count += 1;
            }
        }
        count
    }

    /// Keys of all slots in dispatch order.
    pub fn snapshot(&self) -> Snapshot {
        self.order.values().copied().collect()
    }

    /// Hand out the callback for a slot about to be invoked.
    ///
    /// Returns `None` for slots that were disconnected since the snapshot was
    /// taken. Fire-once slots are invalidated here, before they run, so a
    /// reentrant dispatch cannot reach them a second time.
    pub fn acquire(&mut self, key: ConnectionKey) -> Option<Rc<F>> {
        let slot = self.slots.get_mut(key).filter(|slot| slot.valid)?;
        if slot.fire_once {
            slot.valid = false;
        }
        Some(Rc::clone(&slot.callback))
    }

    /// Remove every invalidated slot.
    ///
    /// The removed callbacks are returned rather than dropped so the caller
    /// can release its borrow of the arena first; dropping a callback may run
    /// arbitrary code that touches this signal again.
    pub fn sweep(&mut self) -> SmallVec<[Rc<F>; 4]> {
        let stale: SmallVec<[(u64, ConnectionKey); 8]> = self
            .order
            .iter()
            .filter(|(_, key)| !self.is_valid(**key))
            .map(|(index, key)| (*index, *key))
            .collect();

        stale
            .into_iter()
            .filter_map(|(index, key)| {
                self.order.remove(&index);
                let slot = self.slots.remove(key)?;
                debug_assert_eq!(slot.index, index);
                Some(slot.callback)
            })
            .collect()
    }
}
