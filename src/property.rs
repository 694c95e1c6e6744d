//! Observable value containers.

use crate::connection::Connection;
use crate::equality::{Equality, ValueEq};
use crate::signal::{ConnectOptions, Signal};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// Read access plus change notification.
///
/// Every property flavour implements this, whatever its storage. Two signals
/// are exposed: [`changed`](Observable::changed) carries the new value,
/// [`changed_pair`](Observable::changed_pair) carries the new and the old one.
pub trait Observable<T: 'static> {
    /// Current value.
    fn get(&self) -> T;

    fn changed(&self) -> &Signal<dyn Fn(&T)>;

    fn changed_pair(&self) -> &Signal<dyn Fn(&T, &T)>;

    /// Call `callback` with every new value.
    fn connect(&self, callback: impl Fn(&T) + 'static) -> Connection
    where
        Self: Sized,
    {
        self.changed().subscribe(callback)
    }

    fn connect_with(
        &self,
        callback: impl Fn(&T) + 'static,
        options: ConnectOptions<'_>,
    ) -> Connection
    where
        Self: Sized,
    {
        self.changed().subscribe_with(callback, options)
    }

    /// Call `callback` with `(new, old)` on every change.
    ///
    /// The old value is only retained while such a subscriber exists.
    fn connect_change(&self, callback: impl Fn(&T, &T) + 'static) -> Connection
    where
        Self: Sized,
    {
        self.changed_pair().subscribe(callback)
    }

    fn connect_change_with(
        &self,
        callback: impl Fn(&T, &T) + 'static,
        options: ConnectOptions<'_>,
    ) -> Connection
    where
        Self: Sized,
    {
        self.changed_pair().subscribe_with(callback, options)
    }

    /// A stream of every new value, ending when the property is dropped.
    #[cfg(feature = "stream")]
    fn changes(&self) -> crate::stream::Changes<T>
    where
        Self: Sized,
        T: Clone,
    {
        crate::stream::Changes::new(self.changed())
    }
}

/// Write access for properties that accept assignment.
pub trait Writable<T: 'static>: Observable<T> {
    /// Assign a value, notifying subscribers if it counts as a change.
    ///
    /// Returns whether subscribers were notified.
    fn set(&self, value: T) -> bool;

    /// An assignment function that does not keep the property alive.
    ///
    /// Writes through it are ignored once the property has been dropped.
    fn weak_setter(&self) -> Box<dyn Fn(T)>;
}

/// Storage and signals shared by a property and its read-only views.
struct PropertyInner<T: 'static> {
    value: RefCell<T>,
    changed: Signal<dyn Fn(&T)>,
    changed_pair: Signal<dyn Fn(&T, &T)>,
}

impl<T: 'static> PropertyInner<T> {
    fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            changed: Signal::new(),
            changed_pair: Signal::new(),
        }
    }

    fn assign<E: Equality<T>>(&self, value: T) -> bool
    where
        T: Clone,
    {
        if E::equal(&self.value.borrow(), &value) {
            return false;
        }

        // Decided before the write: only keep the old value if someone wants it.
        let keep_old = self.changed_pair.connected();
        let old = self.value.replace(value);
        let pair = keep_old.then(|| (self.value.borrow().clone(), old));

        // Each slot gets a fresh copy: an earlier slot may have assigned again.
        self.changed.emit_with(|slot| {
            let current = self.value.borrow().clone();
            slot(&current)
        });
        if let Some((new, old)) = pair {
            self.changed_pair.emit(&new, &old);
        }
        true
    }
}

/// An observable value.
///
/// Assigning runs the change-detection policy `E`; only real changes are
/// stored and announced. `Property` is a cheap handle: clones share the same
/// value and signals.
///
/// # Examples
///
/// ```rust,no_run
/// use prop_signals::prelude::*;
///
/// let volume = Property::new(0);
/// volume.connect(|v| println!("volume is now {v}"));
/// volume.connect_change(|new, old| println!("{old} -> {new}"));
///
/// volume.set(5); // notifies
/// volume.set(5); // equal, no notification
/// ```
pub struct Property<T: 'static, E = ValueEq> {
    inner: Rc<PropertyInner<T>>,
    _policy: PhantomData<E>,
}

impl<T: PartialEq + 'static> Property<T, ValueEq> {
    /// Create a property compared with `PartialEq`.
    pub fn new(value: T) -> Self {
        Self::with_equality(value)
    }
}

impl<T: 'static, E: Equality<T>> Property<T, E> {
    /// Create a property with the change-detection policy `E`.
    pub fn with_equality(value: T) -> Self {
        Self {
            inner: Rc::new(PropertyInner::new(value)),
            _policy: PhantomData,
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value.
    ///
    /// The borrow must end before the property is assigned again.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.value.borrow()
    }

    /// Read the current value with a closure.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.borrow())
    }

    /// Assign a new value.
    ///
    /// Returns `true` if the value changed and subscribers were notified.
    pub fn set(&self, value: T) -> bool
    where
        T: Clone,
    {
        self.inner.assign::<E>(value)
    }

    /// Modify a copy of the value in place, then assign it.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool
    where
        T: Clone,
    {
        let mut next = self.get();
        f(&mut next);
        self.set(next)
    }

    pub fn changed(&self) -> &Signal<dyn Fn(&T)> {
        &self.inner.changed
    }

    pub fn changed_pair(&self) -> &Signal<dyn Fn(&T, &T)> {
        &self.inner.changed_pair
    }

    /// A view of this property that cannot be assigned.
    pub fn read_only(&self) -> ReadOnlyProperty<T> {
        ReadOnlyProperty {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static, E: Equality<T>> Observable<T> for Property<T, E> {
    fn get(&self) -> T {
        Property::get(self)
    }

    fn changed(&self) -> &Signal<dyn Fn(&T)> {
        &self.inner.changed
    }

    fn changed_pair(&self) -> &Signal<dyn Fn(&T, &T)> {
        &self.inner.changed_pair
    }
}

impl<T: Clone + 'static, E: Equality<T> + 'static> Writable<T> for Property<T, E> {
    fn set(&self, value: T) -> bool {
        Property::set(self, value)
    }

    fn weak_setter(&self) -> Box<dyn Fn(T)> {
        let inner = Rc::downgrade(&self.inner);
        Box::new(move |value| {
            if let Some(inner) = inner.upgrade() {
                inner.assign::<E>(value);
            }
        })
    }
}

impl<T: 'static, E> Clone for Property<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            _policy: PhantomData,
        }
    }
}

impl<T: PartialEq + Default + 'static> Default for Property<T, ValueEq> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug + 'static, E> fmt::Debug for Property<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

/// A property that cannot be assigned.
///
/// Either a view of a [`Property`] (it still notifies when the underlying
/// property changes) or a standalone constant that never does.
pub struct ReadOnlyProperty<T: 'static> {
    inner: Rc<PropertyInner<T>>,
}

impl<T: 'static> ReadOnlyProperty<T> {
    /// A constant value.
    pub fn constant(value: T) -> Self {
        Self {
            inner: Rc::new(PropertyInner::new(value)),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.value.borrow()
    }

    /// Read the current value with a closure.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.borrow())
    }
}

impl<T: Clone + 'static> Observable<T> for ReadOnlyProperty<T> {
    fn get(&self) -> T {
        ReadOnlyProperty::get(self)
    }

    fn changed(&self) -> &Signal<dyn Fn(&T)> {
        &self.inner.changed
    }

    fn changed_pair(&self) -> &Signal<dyn Fn(&T, &T)> {
        &self.inner.changed_pair
    }
}

impl<T: 'static> Clone for ReadOnlyProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for ReadOnlyProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyProperty")
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}
