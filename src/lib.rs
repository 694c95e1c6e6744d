//! # Prop Signals
//!
//! Signals, connections and observable properties for single-threaded,
//! synchronous dataflow.
//!
//! ## Features
//!
//! - **Ordered dispatch**: `Signal` calls its subscribers in subscription order
//! - **Reentrancy-safe**: callbacks may subscribe, disconnect or emit while a
//!   dispatch is in progress
//! - **Shared handles**: every clone of a `Connection` sees the same state
//! - **Lifetime binding**: an `Observer` disconnects everything it owns on drop
//! - **Properties**: values that notify on change, stored locally or delegated
//!   to a host object's accessors
//! - **Bindings**: one-way propagation between properties, with optional
//!   conversion
//!
//! ## Example
//!
//! ```rust,no_run
//! use prop_signals::prelude::*;
//!
//! let celsius = Property::new(20.0_f64);
//! let fahrenheit = Property::new(68.0_f64);
//! connect_map(&celsius, &fahrenheit, |c: &f64| c * 9.0 / 5.0 + 32.0);
//!
//! let observer = Observer::new();
//! fahrenheit.connect_with(|f| println!("{f}°F"), ConnectOptions::new().owned_by(&observer));
//!
//! celsius.set(25.0);
//! assert_eq!(fahrenheit.get(), 77.0);
//! ```

mod binding;
mod connection;
mod dynamic;
mod equality;
mod error;
mod function;
mod observer;
mod property;
mod signal;
mod storage;
#[cfg(feature = "stream")]
mod stream;

pub use binding::{connect, connect_map};
pub use connection::Connection;
pub use dynamic::{DynamicProperty, ReadOnlyDynamicProperty};
pub use equality::{Equality, NeverEq, ValueEq, WeakEq};
pub use error::{Error, Result};
pub use function::ErasedFn;
pub use observer::{ConnectionOwner, Observer};
pub use property::{Observable, Property, ReadOnlyProperty, Writable};
pub use signal::{ConnectOptions, Signal};
#[cfg(feature = "stream")]
pub use stream::Changes;

// Re-export the prelude
pub mod prelude {
    pub use crate::{
        connect, connect_map, ConnectOptions, Connection, ConnectionOwner, DynamicProperty,
        Observable, Observer, Property, ReadOnlyDynamicProperty, ReadOnlyProperty, Signal,
        Writable,
    };
}
