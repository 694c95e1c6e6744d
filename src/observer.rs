//! Lifetime-bound ownership of connections.

use crate::connection::Connection;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

/// Something that can take ownership of connections.
///
/// Passed to [`ConnectOptions::owned_by`](crate::ConnectOptions::owned_by)
/// and the `subscribe_owned` family. Types that embed an [`Observer`] can
/// implement this by delegating to it.
pub trait ConnectionOwner {
    fn add_connection(&self, connection: Connection);
}

impl<T: ConnectionOwner + ?Sized> ConnectionOwner for Rc<T> {
    fn add_connection(&self, connection: Connection) {
        (**self).add_connection(connection);
    }
}

/// Disconnects every connection it was given when dropped.
///
/// Keep an `Observer` next to the state your callbacks capture; once the
/// owner goes away, so do its subscriptions.
///
/// ```rust,no_run
/// use prop_signals::prelude::*;
///
/// let resized: Signal<dyn Fn(&u32, &u32)> = Signal::new();
/// {
///     let observer = Observer::new();
///     resized.subscribe_owned(|w, h| println!("{w}x{h}"), &observer);
///     resized.emit(&640, &480);
/// }
/// // Nothing runs here: the observer disconnected its subscription.
/// resized.emit(&800, &600);
/// ```
#[derive(Default)]
pub struct Observer {
    connections: RefCell<BTreeSet<Connection>>,
}

impl Observer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a connection.
    ///
    /// Connections already disconnected elsewhere are dropped here, so a
    /// long-lived observer does not accumulate dead entries.
    pub fn add_connection(&self, connection: Connection) {
        let mut connections = self.connections.borrow_mut();
        connections.retain(Connection::valid);
        connections.insert(connection);
    }

    /// Number of connections held, including ones disconnected elsewhere
    /// since the last [`add_connection`](Observer::add_connection).
    pub fn len(&self) -> usize {
        self.connections.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.borrow().is_empty()
    }

    /// Disconnect and forget every held connection.
    pub fn disconnect_all(&self) {
        // Release the borrow first: a disconnect can drop callbacks that own
        // further connections.
        let connections = std::mem::take(&mut *self.connections.borrow_mut());
        for connection in &connections {
            connection.disconnect();
        }
    }
}

impl ConnectionOwner for Observer {
    fn add_connection(&self, connection: Connection) {
        Observer::add_connection(self, connection);
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("connections", &self.len())
            .finish()
    }
}
