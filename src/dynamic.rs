//! Properties whose storage lives in a host object.
//!
//! A [`DynamicProperty`] holds no value of its own. Reads go through a getter
//! and writes through a setter, usually methods of some host struct. Whether
//! a write counts as a change is up to the host: either the setter reports
//! it, or every write is treated as one.

use crate::property::{Observable, Writable};
use crate::signal::Signal;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct DynamicInner<T: 'static> {
    getter: Box<dyn Fn() -> T>,
    /// Returns whether the host value changed.
    setter: Box<dyn Fn(T) -> bool>,
    changed: Signal<dyn Fn(&T)>,
    changed_pair: Signal<dyn Fn(&T, &T)>,
}

impl<T: 'static> DynamicInner<T> {
    fn assign(&self, value: T) -> bool {
        let old = self.changed_pair.connected().then(|| (self.getter)());
        if !(self.setter)(value) {
            return false;
        }

        let pair = old.map(|old| ((self.getter)(), old));

        // Read back per slot: an earlier slot may have written again.
        self.changed.emit_with(|slot| slot(&(self.getter)()));
        if let Some((new, old)) = pair {
            self.changed_pair.emit(&new, &old);
        }
        true
    }
}

/// A property backed by accessors on a host object.
///
/// The host is shared through `Rc<RefCell<H>>` and kept alive by the
/// property. Storing the property inside its own host creates a reference
/// cycle; give the host a separate owner in that case.
///
/// # Examples
///
/// ```rust,no_run
/// use prop_signals::prelude::*;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// struct Window { title: String }
///
/// impl Window {
///     fn title(&self) -> String { self.title.clone() }
///     fn set_title(&mut self, title: String) -> bool {
///         if self.title == title { return false; }
///         self.title = title;
///         true
///     }
/// }
///
/// let window = Rc::new(RefCell::new(Window { title: String::new() }));
/// let title = DynamicProperty::new(&window, Window::title, Window::set_title);
/// title.connect(|t| println!("title: {t}"));
/// title.set("Untitled".into());
/// ```
pub struct DynamicProperty<T: 'static> {
    inner: Rc<DynamicInner<T>>,
}

impl<T: 'static> DynamicProperty<T> {
    /// Bind to a host whose setter reports whether the value changed.
    ///
    /// Subscribers are notified only when the setter returns `true`.
    pub fn new<H: 'static>(
        host: &Rc<RefCell<H>>,
        getter: impl Fn(&H) -> T + 'static,
        setter: impl Fn(&mut H, T) -> bool + 'static,
    ) -> Self {
        let read = Rc::clone(host);
        let write = Rc::clone(host);
        Self::from_accessors(
            move || getter(&*read.borrow()),
            move |value| setter(&mut *write.borrow_mut(), value),
        )
    }

    /// Bind to a host whose setter gives no feedback.
    ///
    /// Every write notifies, even one that stores an equal value.
    pub fn unchecked<H: 'static>(
        host: &Rc<RefCell<H>>,
        getter: impl Fn(&H) -> T + 'static,
        setter: impl Fn(&mut H, T) + 'static,
    ) -> Self {
        Self::new(host, getter, move |host, value| {
            setter(host, value);
            true
        })
    }

    /// Build from free-standing accessor closures.
    pub fn from_accessors(
        getter: impl Fn() -> T + 'static,
        setter: impl Fn(T) -> bool + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(DynamicInner {
                getter: Box::new(getter),
                setter: Box::new(setter),
                changed: Signal::new(),
                changed_pair: Signal::new(),
            }),
        }
    }

    /// Read through the getter.
    pub fn get(&self) -> T {
        (self.inner.getter)()
    }

    /// Write through the setter and notify if the write counted as a change.
    pub fn set(&self, value: T) -> bool {
        self.inner.assign(value)
    }

    pub fn changed(&self) -> &Signal<dyn Fn(&T)> {
        &self.inner.changed
    }

    pub fn changed_pair(&self) -> &Signal<dyn Fn(&T, &T)> {
        &self.inner.changed_pair
    }

    /// A view that can read and subscribe but not write.
    pub fn read_only(&self) -> ReadOnlyDynamicProperty<T> {
        ReadOnlyDynamicProperty {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Observable<T> for DynamicProperty<T> {
    fn get(&self) -> T {
        DynamicProperty::get(self)
    }

    fn changed(&self) -> &Signal<dyn Fn(&T)> {
        &self.inner.changed
    }

    fn changed_pair(&self) -> &Signal<dyn Fn(&T, &T)> {
        &self.inner.changed_pair
    }
}

impl<T: 'static> Writable<T> for DynamicProperty<T> {
    fn set(&self, value: T) -> bool {
        DynamicProperty::set(self, value)
    }

    fn weak_setter(&self) -> Box<dyn Fn(T)> {
        let inner = Rc::downgrade(&self.inner);
        Box::new(move |value| {
            if let Some(inner) = inner.upgrade() {
                inner.assign(value);
            }
        })
    }
}

impl<T: 'static> Clone for DynamicProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for DynamicProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicProperty")
            .field("value", &self.get())
            .finish()
    }
}

/// A getter-only dynamic property.
pub struct ReadOnlyDynamicProperty<T: 'static> {
    inner: Rc<DynamicInner<T>>,
}

impl<T: 'static> ReadOnlyDynamicProperty<T> {
    /// Bind to a host getter. Nothing can write through this property, so
    /// its signals only fire when it was created by
    /// [`DynamicProperty::read_only`].
    pub fn new<H: 'static>(host: &Rc<RefCell<H>>, getter: impl Fn(&H) -> T + 'static) -> Self {
        let read = Rc::clone(host);
        Self {
            inner: Rc::new(DynamicInner {
                getter: Box::new(move || getter(&*read.borrow())),
                setter: Box::new(|_| false),
                changed: Signal::new(),
                changed_pair: Signal::new(),
            }),
        }
    }

    pub fn get(&self) -> T {
        (self.inner.getter)()
    }
}

impl<T: 'static> Observable<T> for ReadOnlyDynamicProperty<T> {
    fn get(&self) -> T {
        ReadOnlyDynamicProperty::get(self)
    }

    fn changed(&self) -> &Signal<dyn Fn(&T)> {
        &self.inner.changed
    }

    fn changed_pair(&self) -> &Signal<dyn Fn(&T, &T)> {
        &self.inner.changed_pair
    }
}

impl<T: 'static> Clone for ReadOnlyDynamicProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for ReadOnlyDynamicProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyDynamicProperty")
            .field("value", &self.get())
            .finish()
    }
}
