//! Change-detection policies for properties.
//!
//! A [`Property`](crate::Property) only notifies when its policy says the new
//! value differs from the stored one.

use std::rc;
use std::sync;

/// Decides whether an assignment is a change.
pub trait Equality<T: ?Sized> {
    /// `true` suppresses notification for the assignment.
    fn equal(lhs: &T, rhs: &T) -> bool;
}

/// Compares with `PartialEq`. The default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueEq;

impl<T: PartialEq + ?Sized> Equality<T> for ValueEq {
    fn equal(lhs: &T, rhs: &T) -> bool {
        lhs == rhs
    }
}

/// Never reports equality, so every assignment notifies.
///
/// For values that cannot be compared, such as boxed closures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverEq;

impl<T: ?Sized> Equality<T> for NeverEq {
    fn equal(_lhs: &T, _rhs: &T) -> bool {
        false
    }
}

/// Compares the referents of weak references.
///
/// Two expired references are equal; an expired and a live one are not.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeakEq;

impl<T: PartialEq + ?Sized> Equality<rc::Weak<T>> for WeakEq {
    fn equal(lhs: &rc::Weak<T>, rhs: &rc::Weak<T>) -> bool {
        match (lhs.upgrade(), rhs.upgrade()) {
            (Some(lhs), Some(rhs)) => *lhs == *rhs,
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: PartialEq + ?Sized> Equality<sync::Weak<T>> for WeakEq {
    fn equal(lhs: &sync::Weak<T>, rhs: &sync::Weak<T>) -> bool {
        match (lhs.upgrade(), rhs.upgrade()) {
            (Some(lhs), Some(rhs)) => *lhs == *rhs,
            (None, None) => true,
            _ => false,
        }
    }
}
