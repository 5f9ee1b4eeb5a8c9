//! Untracked, immutable view of an entity.

use serde::{Serialize, Serializer};
use std::ops::Deref;

/// Result of a read-only lookup.
///
/// Only shared access is offered. `into_inner` hands out an owned copy,
/// which no session tracks, so changes to it are never flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnly<T>(T);

impl<T> ReadOnly<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for ReadOnly<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Serialize> Serialize for ReadOnly<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
