//! Table mapping contract shared by all persisted records.

use super::ModelError;
use rusqlite::types::Value;
use rusqlite::Row;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Surrogate identifier backed by an SQLite `INTEGER PRIMARY KEY`.
pub trait EntityId: Copy + Eq + Hash + Debug + Display {
    fn from_raw(raw: i64) -> Self;
    fn raw(self) -> i64;
}

/// A record type the session can insert, update, delete and track.
///
/// Implemented only inside this crate; identity assignment and
/// association bookkeeping stay private to the session.
pub trait Entity: Clone + Debug + sealed::Managed {
    type Id: EntityId;

    /// Entity name used in errors and logs.
    const NAME: &'static str;
    const TABLE: &'static str;
    const ID_COLUMN: &'static str;
    /// Writable columns, in the order of `column_values`.
    const COLUMNS: &'static [&'static str];
    /// Base projection understood by `from_row`, without a `WHERE` clause.
    const SELECT_SQL: &'static str;
    /// Qualified id column inside `SELECT_SQL`.
    const ID_FILTER: &'static str;

    fn id(&self) -> Option<Self::Id>;

    /// Values for `COLUMNS`; also the snapshot used for dirty checking.
    fn column_values(&self) -> Vec<Value>;

    /// Maps one row selected by `SELECT_SQL` (or a query with the same
    /// column names).
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn validate(&self) -> Result<(), ModelError>;
}

pub(crate) mod sealed {
    use crate::session::identity::{IdentityMap, IdentityMaps};

    pub trait Managed: Sized {
        fn assign_id(&mut self, raw: i64);

        fn identity_map(maps: &IdentityMaps) -> &IdentityMap<Self>;

        fn identity_map_mut(maps: &mut IdentityMaps) -> &mut IdentityMap<Self>;

        /// Combines caller state with the managed copy on merge.
        fn merged(_managed: &Self, incoming: Self) -> Self {
            incoming
        }

        /// Adjusts a freshly loaded row to state the session has not flushed.
        fn on_load(&mut self, _maps: &IdentityMaps) {}

        fn after_persist(&self, _maps: &mut IdentityMaps) {}

        fn after_merge(_previous: &Self, _current: &Self, _maps: &mut IdentityMaps) {}

        fn after_remove(&self, _maps: &mut IdentityMaps) {}
    }
}
