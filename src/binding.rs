//! One-way bindings between properties.
//!
//! A binding is nothing more than a subscription on the source's
//! single-value signal that writes into the destination. The returned
//! [`Connection`] is the binding; disconnect it to stop propagation.
//!
//! The destination is held weakly: the binding never keeps it alive, and
//! changes arriving after it has been dropped are ignored.
//!
//! Bindings are not checked for cycles. Binding `a` to `b` and `b` to `a` is
//! fine as long as the values settle (equal assignments do not notify), but
//! properties that keep producing new values from each other's writes recurse
//! without bound.

use crate::connection::Connection;
use crate::property::{Observable, Writable};
use tracing::debug;

/// Propagate every change of `source` into `dest`.
///
/// ```rust,no_run
/// use prop_signals::prelude::*;
///
/// let slider = Property::new(0);
/// let label = Property::new(0);
/// let binding = prop_signals::connect(&slider, &label);
/// slider.set(4);
/// assert_eq!(label.get(), 4);
/// binding.disconnect();
/// ```
pub fn connect<T, S, D>(source: &S, dest: &D) -> Connection
where
    T: Clone + 'static,
    S: Observable<T>,
    D: Writable<T>,
{
    let assign = dest.weak_setter();
    let connection = source.connect(move |value: &T| assign(value.clone()));
    debug!(index = ?connection.index(), "bound property");
    connection
}

/// Propagate every change of `source` into `dest`, converted by `converter`.
pub fn connect_map<A, B, S, D>(
    source: &S,
    dest: &D,
    converter: impl Fn(&A) -> B + 'static,
) -> Connection
where
    A: 'static,
    B: 'static,
    S: Observable<A>,
    D: Writable<B>,
{
    let assign = dest.weak_setter();
    let connection = source.connect(move |value: &A| assign(converter(value)));
    debug!(index = ?connection.index(), "bound property with conversion");
    connection
}
