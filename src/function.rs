//! Type-erased callables.

use crate::error::{Error, Result};
use std::any::{type_name, Any};
use std::fmt;
use tracing::debug;

/// A callable with its signature erased.
///
/// Built from any `Fn(A) -> R`; multiple arguments are passed as a tuple.
/// Calling it with a different `A` or `R` than it was built with fails with
/// [`Error::TypeMismatch`] instead of producing a value.
///
/// ```rust,no_run
/// use prop_signals::ErasedFn;
///
/// let add = ErasedFn::new(|(a, b): (i32, i32)| a + b);
/// assert_eq!(add.call::<(i32, i32), i32>((2, 3)), Ok(5));
/// assert!(add.call::<i32, i32>(2).is_err());
/// ```
pub struct ErasedFn {
    inner: Box<dyn Any>,
    signature: &'static str,
}

impl ErasedFn {
    pub fn new<A: 'static, R: 'static>(f: impl Fn(A) -> R + 'static) -> Self {
        let f: Box<dyn Fn(A) -> R> = Box::new(f);
        Self {
            inner: Box::new(f),
            signature: type_name::<fn(A) -> R>(),
        }
    }

    /// Invoke with the signature `fn(A) -> R`.
    pub fn call<A: 'static, R: 'static>(&self, args: A) -> Result<R> {
        match self.inner.downcast_ref::<Box<dyn Fn(A) -> R>>() {
            Some(f) => Ok(f(args)),
            None => {
                let found = type_name::<fn(A) -> R>();
                debug!(expected = self.signature, found, "erased call type mismatch");
                Err(Error::TypeMismatch {
                    expected: self.signature,
                    found,
                })
            }
        }
    }

    /// Whether the callable was built with the signature `fn(A) -> R`.
    pub fn is<A: 'static, R: 'static>(&self) -> bool {
        self.inner.is::<Box<dyn Fn(A) -> R>>()
    }

    /// Name of the signature the callable was built with.
    pub fn signature(&self) -> &'static str {
        self.signature
    }
}

impl fmt::Debug for ErasedFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedFn")
            .field("signature", &self.signature)
            .finish()
    }
}
