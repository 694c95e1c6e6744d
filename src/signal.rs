//! Core Signal type and dispatch.

use crate::connection::{Connection, ConnectionKey, SignalBase};
use crate::observer::ConnectionOwner;
use crate::storage::SlotStorage;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

/// Per-subscription settings.
///
/// ```rust,no_run
/// use prop_signals::prelude::*;
///
/// let signal: Signal<dyn Fn(&i32)> = Signal::new();
/// let observer = Observer::new();
/// signal.subscribe_with(|n| println!("{n}"), ConnectOptions::new().once().owned_by(&observer));
/// ```
#[derive(Clone, Copy, Default)]
pub struct ConnectOptions<'a> {
    fire_once: bool,
    owner: Option<&'a dyn ConnectionOwner>,
}

impl<'a> ConnectOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disconnect automatically on the first invocation.
    ///
    /// The connection is invalidated just before the callback runs, so it
    /// already reports `valid() == false` from inside the callback and stays
    /// disconnected if the callback panics.
    pub fn once(mut self) -> Self {
        self.fire_once = true;
        self
    }

    /// Register the connection with `owner`, which disconnects it when dropped.
    pub fn owned_by(mut self, owner: &'a dyn ConnectionOwner) -> Self {
        self.owner = Some(owner);
        self
    }
}

impl fmt::Debug for ConnectOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("fire_once", &self.fire_once)
            .field("owned", &self.owner.is_some())
            .finish()
    }
}

/// Shared state behind a [`Signal`]. Connections hold it weakly.
struct SignalCore<F: ?Sized> {
    storage: RefCell<SlotStorage<F>>,
    /// True only while `emit_with` runs. Saved and restored per call frame.
    dispatching: Cell<bool>,
}

impl<F: ?Sized> SignalCore<F> {
    fn sweep(&self) {
        if self.dispatching.get() {
            return;
        }
        // The borrow ends with this statement; callbacks drop after it.
        let removed = self.storage.borrow_mut().sweep();
        if !removed.is_empty() {
            trace!(count = removed.len(), "swept disconnected slots");
        }
    }
}

impl<F: ?Sized> SignalBase for SignalCore<F> {
    fn is_connected(&self, key: ConnectionKey) -> bool {
        self.storage.borrow().is_valid(key)
    }

    fn disconnect(&self, key: ConnectionKey) {
        if self.storage.borrow_mut().invalidate(key) {
            trace!(?key, "disconnected slot");
            self.sweep();
        }
    }
}

/// Restores the dispatch flag of the enclosing frame, even on unwind.
struct DispatchScope<'a> {
    flag: &'a Cell<bool>,
    outer: bool,
}

impl<'a> DispatchScope<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        let outer = flag.replace(true);
        Self { flag, outer }
    }
}

impl Drop for DispatchScope<'_> {
    fn drop(&mut self) {
        self.flag.set(self.outer);
    }
}

/// A multicast, ordered, synchronous event dispatcher.
///
/// `F` is the callback signature as a trait object, for example
/// `Signal<dyn Fn(&str)>` or `Signal<dyn Fn(&i32, &i32) -> bool>`. Signatures
/// with up to three by-reference arguments get `subscribe` and `emit`
/// directly; any other shape can be dispatched through [`Signal::emit_with`].
///
/// Callbacks run in subscription order. A callback may subscribe, disconnect
/// or emit on the same signal while it is being dispatched:
///
/// - slots added during a dispatch are first invoked by the next one;
/// - slots disconnected during a dispatch are skipped for the rest of it and
///   removed once the outermost dispatch returns.
///
/// Dropping a signal disconnects all of its connections.
///
/// # Examples
///
/// ```rust,no_run
/// use prop_signals::Signal;
///
/// let clicked: Signal<dyn Fn(&u32)> = Signal::new();
/// let connection = clicked.subscribe(|button| println!("button {button}"));
/// clicked.emit(&1);
/// connection.disconnect();
/// ```
pub struct Signal<F: ?Sized> {
    core: Rc<SignalCore<F>>,
}

impl<F: ?Sized> Signal<F> {
    /// Create a signal with no subscribers.
    pub fn new() -> Self {
        Self {
            core: Rc::new(SignalCore {
                storage: RefCell::new(SlotStorage::new()),
                dispatching: Cell::new(false),
            }),
        }
    }

    /// Whether at least one slot is registered, including disconnected slots
    /// that have not been swept yet.
    pub fn connected(&self) -> bool {
        !self.core.storage.borrow().is_empty()
    }

    /// Number of registered slots.
    pub fn len(&self) -> usize {
        self.core.storage.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.connected()
    }

    /// Whether a dispatch of this signal is in progress.
    pub fn is_dispatching(&self) -> bool {
        self.core.dispatching.get()
    }

    /// Disconnect every currently valid connection.
    pub fn disconnect_all(&self) {
        let count = self.core.storage.borrow_mut().invalidate_all();
        if count > 0 {
            trace!(count, "disconnected all slots");
        }
        self.core.sweep();
    }

    /// Invoke every valid slot through `call`, in subscription order.
    ///
    /// Returns the value produced by the last slot that ran, or `None` when no
    /// slot ran.
    pub fn emit_with<R>(&self, mut call: impl FnMut(&F) -> R) -> Option<R> {
        let scope = DispatchScope::enter(&self.core.dispatching);
        let keys = self.core.storage.borrow().snapshot();

        let mut result = None;
        for key in keys {
            let Some(callback) = self.core.storage.borrow_mut().acquire(key) else {
                continue;
            };
            result = Some(call(&*callback));
        }

        let outermost = !scope.outer;
        drop(scope);
        if outermost {
            self.core.sweep();
        }
        result
    }
}

impl<F: ?Sized + 'static> Signal<F> {
    fn connect_slot(&self, callback: Rc<F>, options: ConnectOptions<'_>) -> Connection {
        self.core.sweep();

        let (key, index) = self
            .core
            .storage
            .borrow_mut()
            .insert(callback, options.fire_once);
        let signal: Weak<dyn SignalBase> = Rc::downgrade(&self.core) as Weak<dyn SignalBase>;
        let connection = Connection::new(index, options.fire_once, key, signal);

        if let Some(owner) = options.owner {
            owner.add_connection(connection.clone());
        }
        trace!(index, fire_once = options.fire_once, "subscribed slot");
        connection
    }
}

impl<F: ?Sized> Default for Signal<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> Drop for Signal<F> {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}

impl<F: ?Sized> fmt::Debug for Signal<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.len())
            .field("dispatching", &self.is_dispatching())
            .finish()
    }
}

macro_rules! impl_signal_arity {
    ($($arg:ident: $ty:ident),*) => {
        impl<R: 'static, $($ty: ?Sized + 'static),*> Signal<dyn Fn($(&$ty),*) -> R> {
            /// Subscribe a callback that runs on every dispatch until disconnected.
            pub fn subscribe(&self, callback: impl Fn($(&$ty),*) -> R + 'static) -> Connection {
                self.subscribe_with(callback, ConnectOptions::new())
            }

            /// Subscribe a callback that runs at most once.
            ///
            /// The connection is invalidated as the callback starts, before it
            /// returns. See [`ConnectOptions::once`].
            pub fn subscribe_once(&self, callback: impl Fn($(&$ty),*) -> R + 'static) -> Connection {
                self.subscribe_with(callback, ConnectOptions::new().once())
            }

            /// Subscribe a callback whose lifetime is bound to `owner`.
            pub fn subscribe_owned(
                &self,
                callback: impl Fn($(&$ty),*) -> R + 'static,
                owner: &dyn ConnectionOwner,
            ) -> Connection {
                self.subscribe_with(callback, ConnectOptions::new().owned_by(owner))
            }

            pub fn subscribe_with(
                &self,
                callback: impl Fn($(&$ty),*) -> R + 'static,
                options: ConnectOptions<'_>,
            ) -> Connection {
                self.connect_slot(Rc::new(callback), options)
            }

            /// Dispatch to every valid slot.
            ///
            /// Returns the last slot's result, or `None` if no slot ran.
            pub fn emit(&self $(, $arg: &$ty)*) -> Option<R> {
                self.emit_with(|slot| slot($($arg),*))
            }
        }
    };
}

impl_signal_arity!();
impl_signal_arity!(a: A);
impl_signal_arity!(a: A, b: B);
impl_signal_arity!(a: A, b: B, c: C);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Observer;
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    fn recorder() -> (Rc<RefCell<Vec<i32>>>, impl Fn(i32) -> Box<dyn Fn(&i32)>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let make = {
            let calls = calls.clone();
            move |tag: i32| -> Box<dyn Fn(&i32)> {
                let calls = calls.clone();
                Box::new(move |v: &i32| calls.borrow_mut().push(tag * 100 + *v))
            }
        };
        (calls, make)
    }

    #[test]
    fn test_subscribe_and_emit() {
        let signal: Signal<dyn Fn(&i32)> = Signal::new();
        let count = Arc::new(Mutex::new(Vec::new()));
        let count_clone = count.clone();

        signal.subscribe(move |v| count_clone.lock().push(*v));

        signal.emit(&1);
        signal.emit(&2);
        assert_eq!(*count.lock(), vec![1, 2]);
    }

    #[test]
    fn test_dispatch_in_subscription_order() {
        let signal: Signal<dyn Fn(&i32)> = Signal::new();
        let (calls, make) = recorder();
        for tag in 1..=3 {
            let callback = make(tag);
            signal.subscribe(move |v| callback(v));
        }
        signal.emit(&7);
        assert_eq!(*calls.borrow(), vec![107, 207, 307]);
    }

    #[test]
    fn test_disconnect_before_emit() {
        let signal: Signal<dyn Fn(&i32)> = Signal::new();
        let (calls, make) = recorder();
        let first = make(1);
        let second = make(2);
        let connection = signal.subscribe(move |v| first(v));
        signal.subscribe(move |v| second(v));

        connection.disconnect();
        signal.emit(&1);
        signal.emit(&2);
        assert_eq!(*calls.borrow(), vec![201, 202]);
        assert_eq!(signal.len(), 1);
    }

    #[test]
    fn test_fire_once() {
        let signal: Signal<dyn Fn()> = Signal::new();
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        let connection = signal.subscribe_once(move || hits_clone.set(hits_clone.get() + 1));

        assert!(connection.valid());
        signal.emit();
        assert!(!connection.valid());
        signal.emit();
        assert_eq!(hits.get(), 1);
        assert!(!signal.connected());
    }

    #[test]
    fn test_fire_once_invalid_inside_callback() {
        let signal: Signal<dyn Fn(&Connection)> = Signal::new();
        let seen = Rc::new(Cell::new(None));
        let seen_clone = seen.clone();
        let connection = signal.subscribe_once(move |c| seen_clone.set(Some(c.valid())));

        signal.emit(&connection);
        assert_eq!(seen.get(), Some(false));
    }

    #[test]
    fn test_fire_once_disconnected_after_panic() {
        let signal: Signal<dyn Fn()> = Signal::new();
        let connection = signal.subscribe_once(|| panic!("boom"));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| signal.emit()));
        assert!(result.is_err());
        assert!(!connection.valid());
        assert!(!signal.is_dispatching());
    }

    #[test]
    fn test_fire_once_not_repeated_by_reentrant_emit() {
        let signal: Rc<Signal<dyn Fn(&u32)>> = Rc::new(Signal::new());
        let hits = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&signal);
        let hits_clone = hits.clone();
        signal.subscribe_once(move |depth| {
            hits_clone.set(hits_clone.get() + 1);
            if let Some(signal) = weak.upgrade() {
                if *depth < 3 {
                    signal.emit(&(depth + 1));
                }
            }
        });

        signal.emit(&0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_emit_returns_last_result() {
        let signal: Signal<dyn Fn(&i32) -> i32> = Signal::new();
        assert_eq!(signal.emit(&1), None);

        signal.subscribe(|v| v + 1);
        signal.subscribe(|v| v * 10);
        assert_eq!(signal.emit(&3), Some(30));
    }

    #[test]
    fn test_emit_skips_invalid_for_result() {
        let signal: Signal<dyn Fn() -> &'static str> = Signal::new();
        signal.subscribe(|| "first");
        let last = signal.subscribe(|| "second");
        last.disconnect();
        assert_eq!(signal.emit(), Some("first"));
    }

    #[test]
    fn test_multiple_arguments() {
        let signal: Signal<dyn Fn(&str, &usize, &bool) -> String> = Signal::new();
        signal.subscribe(|name, count, flag| format!("{name}:{count}:{flag}"));
        assert_eq!(signal.emit("a", &2, &true), Some("a:2:true".to_string()));
    }

    #[test]
    fn test_subscribe_during_emit_is_deferred() {
        let signal: Rc<Signal<dyn Fn()>> = Rc::new(Signal::new());
        let late_hits = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&signal);
        let late = late_hits.clone();
        signal.subscribe(move || {
            let late = late.clone();
            if let Some(signal) = weak.upgrade() {
                signal.subscribe(move || late.set(late.get() + 1));
            }
        });

        signal.emit();
        assert_eq!(late_hits.get(), 0);
        assert_eq!(signal.len(), 2);

        signal.emit();
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn test_disconnect_later_slot_during_emit() {
        let signal: Signal<dyn Fn()> = Signal::new();
        let victim: Rc<RefCell<Connection>> = Rc::default();
        let victim_hits = Rc::new(Cell::new(0));

        let victim_clone = victim.clone();
        signal.subscribe(move || victim_clone.borrow().disconnect());
        let hits = victim_hits.clone();
        *victim.borrow_mut() = signal.subscribe(move || hits.set(hits.get() + 1));

        signal.emit();
        assert_eq!(victim_hits.get(), 0);
        assert_eq!(signal.len(), 1);
    }

    #[test]
    fn test_disconnect_self_during_emit() {
        let signal: Signal<dyn Fn()> = Signal::new();
        let own: Rc<RefCell<Connection>> = Rc::default();
        let after = Rc::new(Cell::new(0));

        let own_clone = own.clone();
        *own.borrow_mut() = signal.subscribe(move || {
            let connection = own_clone.borrow().clone();
            connection.disconnect();
            assert!(!connection.valid());
        });
        let after_clone = after.clone();
        signal.subscribe(move || after_clone.set(after_clone.get() + 1));

        signal.emit();
        signal.emit();
        assert_eq!(after.get(), 2);
        assert!(!own.borrow().valid());
        assert_eq!(signal.len(), 1);
    }

    #[test]
    fn test_reentrant_emit_completes_inner_dispatch_first() {
        let signal: Rc<Signal<dyn Fn(&u32)>> = Rc::new(Signal::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let weak = Rc::downgrade(&signal);
        let log_first = log.clone();
        signal.subscribe(move |depth| {
            log_first.borrow_mut().push(format!("first@{depth}"));
            if *depth == 0 {
                if let Some(signal) = weak.upgrade() {
                    signal.emit(&1);
                }
            }
        });
        let log_second = log.clone();
        signal.subscribe(move |depth| log_second.borrow_mut().push(format!("second@{depth}")));

        signal.emit(&0);
        assert_eq!(
            *log.borrow(),
            vec!["first@0", "first@1", "second@1", "second@0"]
        );
        assert!(!signal.is_dispatching());
    }

    #[test]
    fn test_reentrant_sweep_is_deferred_to_outer_dispatch() {
        let signal: Rc<Signal<dyn Fn(&u32)>> = Rc::new(Signal::new());
        let third: Rc<RefCell<Connection>> = Rc::default();
        let third_hits = Rc::new(Cell::new(0));
        let second_hits = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&signal);
        let third_clone = third.clone();
        signal.subscribe(move |depth| {
            if *depth == 0 {
                third_clone.borrow().disconnect();
                if let Some(signal) = weak.upgrade() {
                    signal.emit(&1);
                    // Inner dispatch must not have swept the slot.
                    assert_eq!(signal.len(), 3);
                }
            }
        });
        let hits = second_hits.clone();
        signal.subscribe(move |_| hits.set(hits.get() + 1));
        let hits = third_hits.clone();
        *third.borrow_mut() = signal.subscribe(move |_| hits.set(hits.get() + 1));

        signal.emit(&0);
        assert_eq!(second_hits.get(), 2);
        assert_eq!(third_hits.get(), 0);
        assert_eq!(signal.len(), 2);
    }

    #[test]
    fn test_disconnect_all() {
        let signal: Signal<dyn Fn()> = Signal::new();
        let first = signal.subscribe(|| {});
        let second = signal.subscribe(|| {});

        signal.disconnect_all();
        assert!(!first.valid());
        assert!(!second.valid());
        assert!(!signal.connected());
    }

    #[test]
    fn test_disconnect_all_during_emit() {
        let signal: Rc<Signal<dyn Fn()>> = Rc::new(Signal::new());
        let hits = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&signal);
        signal.subscribe(move || {
            if let Some(signal) = weak.upgrade() {
                signal.disconnect_all();
            }
        });
        let hits_clone = hits.clone();
        signal.subscribe(move || hits_clone.set(hits_clone.get() + 1));

        signal.emit();
        assert_eq!(hits.get(), 0);
        assert!(!signal.connected());
    }

    #[test]
    fn test_drop_signal_releases_callbacks() {
        let signal: Signal<dyn Fn()> = Signal::new();
        let token = Rc::new(());
        let held = token.clone();
        let connection = signal.subscribe(move || {
            let _held = &held;
        });

        assert_eq!(Rc::strong_count(&token), 2);
        drop(signal);
        assert_eq!(Rc::strong_count(&token), 1);
        assert!(!connection.valid());
    }

    #[test]
    fn test_sweep_drops_callback_after_disconnect() {
        let signal: Signal<dyn Fn()> = Signal::new();
        let token = Rc::new(());
        let held = token.clone();
        let connection = signal.subscribe(move || {
            let _held = &held;
        });

        connection.disconnect();
        assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn test_dropping_callback_may_touch_signal() {
        // The callback owns an observer holding another connection on the
        // same signal; sweeping it disconnects that connection re-entrantly.
        let signal: Signal<dyn Fn()> = Signal::new();
        let observer = Observer::new();
        let other = signal.subscribe_owned(|| {}, &observer);

        let connection = signal.subscribe(move || {
            let _observer = &observer;
        });
        connection.disconnect();

        assert!(!other.valid());
        assert!(!signal.connected());
    }

    #[test]
    fn test_owned_subscription() {
        let signal: Signal<dyn Fn(&i32)> = Signal::new();
        let hits = Rc::new(Cell::new(0));
        let observer = Observer::new();

        let hits_clone = hits.clone();
        let connection = signal.subscribe_with(
            move |_| hits_clone.set(hits_clone.get() + 1),
            ConnectOptions::new().owned_by(&observer),
        );
        assert_eq!(observer.len(), 1);

        signal.emit(&1);
        drop(observer);
        signal.emit(&2);
        assert_eq!(hits.get(), 1);
        assert!(!connection.valid());
    }

    #[test]
    fn test_randomized_against_model() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let signal: Signal<dyn Fn(&())> = Signal::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        let mut live: Vec<(u64, Connection)> = Vec::new();
        let mut once: Vec<u64> = Vec::new();

        for _ in 0..500 {
            match rng.gen_range(0..4) {
                0 | 1 => {
                    let fire_once = rng.gen_bool(0.2);
                    let fired = fired.clone();
                    let id = Rc::new(Cell::new(0u64));
                    let id_clone = id.clone();
                    let options = if fire_once {
                        ConnectOptions::new().once()
                    } else {
                        ConnectOptions::new()
                    };
                    let connection = signal
                        .subscribe_with(move |_| fired.borrow_mut().push(id_clone.get()), options);
                    let index = connection.index().unwrap();
                    id.set(index);
                    if fire_once {
                        once.push(index);
                    }
                    live.push((index, connection));
                }
                2 if !live.is_empty() => {
                    let (_, connection) = live.remove(rng.gen_range(0..live.len()));
                    connection.disconnect();
                }
                _ => {
                    fired.borrow_mut().clear();
                    signal.emit(&());
                    let expected: Vec<u64> = live.iter().map(|(index, _)| *index).collect();
                    assert_eq!(*fired.borrow(), expected);
                    live.retain(|(index, _)| !once.contains(index));
                }
            }
            assert!(live.iter().all(|(_, connection)| connection.valid()));
            assert_eq!(signal.len(), live.len());
        }
    }
}
