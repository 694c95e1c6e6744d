//! Error types

use thiserror::Error;

/// Errors surfaced by the crate.
///
/// Subscribing, disconnecting, reading and writing are total and never fail;
/// only type-erased invocation can.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A type-erased callable was invoked with a signature it was not built with
    #[error("callable type mismatch: stored `{expected}`, called as `{found}`")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Result type for fallible operations
pub type Result<T> = std::result::Result<T, Error>;
