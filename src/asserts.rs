//! Assertion helpers for predicates, postconditions and filters.
//!
//! A failed [`assume`] discards the current case. The `ensure` family fails it,
//! and the message becomes the reported reason.

use crate::error::{EngineError, EngineResult};
use std::fmt::Debug;

pub fn assume(condition: bool) -> EngineResult<()> {
    if condition {
        Ok(())
    } else {
        Err(EngineError::FailedAssumption)
    }
}

pub fn ensure(condition: bool, message: impl Into<String>) -> EngineResult<()> {
    if condition {
        Ok(())
    } else {
        Err(EngineError::assertion(message))
    }
}

/// Fails with `left != right`.
pub fn ensure_eq<T: PartialEq + Debug>(left: T, right: T) -> EngineResult<()> {
    ensure(left == right, format!("{:?} != {:?}", left, right))
}

pub fn ensure_ne<T: PartialEq + Debug>(left: T, right: T) -> EngineResult<()> {
    ensure(left != right, format!("{:?} == {:?}", left, right))
}

/// Fails with `name(value) is false`.
pub fn ensure_that<T: Debug + ?Sized>(name: &str, predicate: impl Fn(&T) -> bool, value: &T) -> EngineResult<()> {
    ensure(predicate(value), format!("{}({:?}) is false", name, value))
}
