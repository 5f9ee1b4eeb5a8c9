//! Unit of work over one SQLite transaction.
//!
//! # Responsibility
//! - Own the transaction scope: begin, commit-or-rollback on exit.
//! - Track loaded entities in an identity map and flush their changes.
//! - Offer the engine boundary repositories build on: `execute_query`,
//!   `execute_update`, `persist`, `remove`, `flush`, `clear`.
//!
//! # Invariants
//! - At most one managed instance per entity id per session.
//! - Lookups of an already managed id return the managed state, even when a
//!   set-based update changed the row since (see `clear`/`refresh`).
//! - Dropping a session without `commit` rolls the transaction back.

mod association;
pub mod identity;

use crate::config::{FlushMode, SessionConfig};
use crate::logging::log_preview;
use crate::model::{Entity, EntityId, Member, Team};
use crate::repo::{RepoError, RepoResult};
use identity::IdentityMaps;
use log::{debug, info, warn};
use rusqlite::{params_from_iter, Connection, Params, Row, Transaction};

const MAX_LOGGED_SQL_CHARS: usize = 240;

pub struct Session<'conn> {
    tx: Transaction<'conn>,
    config: SessionConfig,
    maps: IdentityMaps,
    statements: u64,
}

impl<'conn> Session<'conn> {
    /// Begins a deferred transaction on `conn`.
    pub fn begin(conn: &'conn mut Connection, config: SessionConfig) -> RepoResult<Self> {
        let tx = conn.transaction()?;
        debug!(
            "event=session_begin module=session status=ok flush_mode={:?}",
            config.flush_mode
        );
        Ok(Self {
            tx,
            config,
            maps: IdentityMaps::default(),
            statements: 0,
        })
    }

    /// Flushes pending changes and commits.
    pub fn commit(mut self) -> RepoResult<()> {
        self.flush()?;
        let Self { tx, statements, .. } = self;
        tx.commit()?;
        info!("event=session_commit module=session status=ok statements={statements}");
        Ok(())
    }

    /// Discards pending changes and everything written in this transaction.
    pub fn rollback(self) -> RepoResult<()> {
        let statements = self.statements;
        self.tx.rollback()?;
        info!("event=session_rollback module=session status=ok statements={statements}");
        Ok(())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Raw connection for imperative lookups. Statements issued here bypass
    /// auto-flush and statement counting.
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    /// Number of statements sent to the engine by this session.
    pub fn statement_count(&self) -> u64 {
        self.statements
    }

    /// Number of managed entities across all types.
    pub fn managed_count(&self) -> usize {
        self.maps.len()
    }

    /// Runs a query and maps each row. Flushes first in `FlushMode::Auto`.
    pub fn execute_query<T, P, F>(&mut self, sql: &str, params: P, map: F) -> RepoResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> RepoResult<T>,
    {
        self.before_statement()?;
        self.query_rows(sql, params, map)
    }

    /// Runs a single-value query such as `SELECT COUNT(*)`.
    pub fn execute_scalar<T, P>(&mut self, sql: &str, params: P) -> RepoResult<T>
    where
        P: Params,
        T: rusqlite::types::FromSql,
    {
        self.before_statement()?;
        self.record_statement(sql);
        let mut stmt = self.tx.prepare_cached(sql)?;
        Ok(stmt.query_row(params, |row| row.get(0))?)
    }

    /// Runs an `INSERT`/`UPDATE`/`DELETE` and returns the affected row count.
    ///
    /// Managed entities are not refreshed; after a set-based update they may
    /// be stale until `clear` or `refresh`.
    pub fn execute_update<P: Params>(&mut self, sql: &str, params: P) -> RepoResult<usize> {
        self.before_statement()?;
        self.update_rows(sql, params)
    }

    /// Runs caller-supplied SQL verbatim. Every engine failure other than a
    /// constraint or lock conflict surfaces as `MalformedNativeQuery`.
    pub fn execute_native<T, P, F>(&mut self, sql: &str, params: P, map: F) -> RepoResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.before_statement()?;
        self.record_statement(sql);
        run_native(&self.tx, sql, params, map).map_err(|err| {
            warn!(
                "event=native_query module=session status=error error={}",
                log_preview(&err.to_string(), MAX_LOGGED_SQL_CHARS)
            );
            RepoError::native(sql, err)
        })
    }

    /// Inserts a transient entity, assigns its id and starts tracking it.
    pub fn persist<E: Entity>(&mut self, entity: &mut E) -> RepoResult<E::Id> {
        if let Some(id) = entity.id() {
            return Err(RepoError::AlreadyPersisted {
                entity: E::NAME,
                id: id.raw(),
            });
        }
        entity.validate()?;
        self.before_statement()?;

        let sql = insert_sql::<E>();
        self.update_rows(&sql, params_from_iter(entity.column_values()))?;
        let id = E::Id::from_raw(self.tx.last_insert_rowid());
        entity.assign_id(id.raw());
        entity.after_persist(&mut self.maps);
        E::identity_map_mut(&mut self.maps).track(id, entity.clone());

        debug!(
            "event=entity_persist module=session status=ok entity={} id={}",
            E::NAME,
            id
        );
        Ok(id)
    }

    /// Copies detached state onto the managed instance; written on flush.
    ///
    /// Loads the row first when the id is not managed yet.
    pub fn merge<E: Entity>(&mut self, entity: E) -> RepoResult<E> {
        let id = entity.id().ok_or(RepoError::Transient(E::NAME))?;
        entity.validate()?;

        let previous = match E::identity_map(&self.maps).get(id) {
            Some(managed) => managed.clone(),
            None => self.load::<E>(id)?.ok_or(RepoError::NotFound {
                entity: E::NAME,
                id: id.raw(),
            })?,
        };

        let merged = E::merged(&previous, entity);
        E::after_merge(&previous, &merged, &mut self.maps);
        E::identity_map_mut(&mut self.maps).replace(id, merged.clone());
        Ok(merged)
    }

    /// Deletes the row and stops tracking it. Returns `false` when no row
    /// matched.
    pub fn remove<E: Entity>(&mut self, entity: E) -> RepoResult<bool> {
        let id = entity.id().ok_or(RepoError::Transient(E::NAME))?;
        self.before_statement()?;

        let sql = format!("DELETE FROM {} WHERE {} = ?1", E::TABLE, E::ID_COLUMN);
        let removed = self.update_rows(&sql, [id.raw()])? > 0;
        let managed = E::identity_map_mut(&mut self.maps)
            .evict(id)
            .unwrap_or(entity);
        managed.after_remove(&mut self.maps);

        debug!(
            "event=entity_remove module=session status=ok entity={} id={} removed={}",
            E::NAME,
            id,
            removed
        );
        Ok(removed)
    }

    /// Point lookup: identity map first, then one `SELECT`.
    pub fn find<E: Entity>(&mut self, id: E::Id) -> RepoResult<Option<E>> {
        if let Some(managed) = E::identity_map(&self.maps).get(id) {
            return Ok(Some(managed.clone()));
        }
        self.load(id)
    }

    /// Managed instance, if this session tracks `id`.
    pub fn get<E: Entity>(&self, id: E::Id) -> Option<&E> {
        E::identity_map(&self.maps).get(id)
    }

    /// Mutable managed instance; changes are written on the next flush.
    pub fn get_mut<E: Entity>(&mut self, id: E::Id) -> Option<&mut E> {
        E::identity_map_mut(&mut self.maps).get_mut(id)
    }

    pub fn contains<E: Entity>(&self, id: E::Id) -> bool {
        E::identity_map(&self.maps).contains(id)
    }

    /// Stops tracking `id` without writing pending changes.
    pub fn detach<E: Entity>(&mut self, id: E::Id) -> Option<E> {
        E::identity_map_mut(&mut self.maps).evict(id)
    }

    /// Discards managed state for `id` and reloads it from the database.
    pub fn refresh<E: Entity>(&mut self, id: E::Id) -> RepoResult<Option<E>> {
        E::identity_map_mut(&mut self.maps).evict(id);
        self.load(id)
    }

    /// Writes an `UPDATE` for every managed entity whose columns changed.
    pub fn flush(&mut self) -> RepoResult<usize> {
        let flushed = self.flush_map::<Team>()? + self.flush_map::<Member>()?;
        if flushed > 0 {
            debug!("event=session_flush module=session status=ok updated={flushed}");
        }
        Ok(flushed)
    }

    /// Forgets every managed entity. Pending changes are discarded.
    pub fn clear(&mut self) {
        let dropped = self.maps.len();
        self.maps.clear();
        debug!("event=session_clear module=session status=ok dropped={dropped}");
    }

    /// Tracks a loaded instance, or returns the already managed one.
    pub(crate) fn manage<E: Entity>(&mut self, mut loaded: E) -> E {
        let Some(id) = loaded.id() else {
            return loaded;
        };
        if let Some(managed) = E::identity_map(&self.maps).get(id) {
            return managed.clone();
        }
        loaded.on_load(&self.maps);
        E::identity_map_mut(&mut self.maps).track(id, loaded.clone());
        loaded
    }

    /// Managed state when tracked; otherwise the loaded value, untracked.
    pub(crate) fn managed_or_detached<E: Entity>(&self, loaded: E) -> E {
        loaded
            .id()
            .and_then(|id| E::identity_map(&self.maps).get(id).cloned())
            .unwrap_or(loaded)
    }

    fn load<E: Entity>(&mut self, id: E::Id) -> RepoResult<Option<E>> {
        self.before_statement()?;
        let sql = format!("{} WHERE {} = ?1", E::SELECT_SQL, E::ID_FILTER);
        let loaded = self.query_rows(&sql, [id.raw()], |row| Ok(E::from_row(row)?))?;
        Ok(loaded.into_iter().next().map(|entity| self.manage(entity)))
    }

    fn flush_map<E: Entity>(&mut self) -> RepoResult<usize> {
        let dirty = E::identity_map(&self.maps).dirty();
        let count = dirty.len();
        for (id, current) in dirty {
            if current.id() != Some(id) {
                return Err(RepoError::IdentifierChanged {
                    entity: E::NAME,
                    expected: id.raw(),
                    actual: current.id().map(EntityId::raw),
                });
            }
            current.validate()?;

            let mut values = current.column_values();
            values.push(rusqlite::types::Value::Integer(id.raw()));
            let updated = self.update_rows(&update_sql::<E>(), params_from_iter(values))?;
            if updated == 0 {
                return Err(RepoError::NotFound {
                    entity: E::NAME,
                    id: id.raw(),
                });
            }
            E::identity_map_mut(&mut self.maps).mark_clean(id);
        }
        Ok(count)
    }

    fn before_statement(&mut self) -> RepoResult<()> {
        if self.config.flush_mode == FlushMode::Auto {
            self.flush()?;
        }
        Ok(())
    }

    fn record_statement(&mut self, sql: &str) {
        self.statements += 1;
        debug!(
            "event=statement module=session status=start seq={} sql={}",
            self.statements,
            log_preview(&compact_sql(sql), MAX_LOGGED_SQL_CHARS)
        );
    }

    fn query_rows<T, P, F>(&mut self, sql: &str, params: P, mut map: F) -> RepoResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> RepoResult<T>,
    {
        self.record_statement(sql);
        let mut stmt = self.tx.prepare_cached(sql)?;
        let mut rows = stmt.query(params)?;
        let mut mapped = Vec::new();
        while let Some(row) = rows.next()? {
            mapped.push(map(row)?);
        }
        Ok(mapped)
    }

    fn update_rows<P: Params>(&mut self, sql: &str, params: P) -> RepoResult<usize> {
        self.record_statement(sql);
        let mut stmt = self.tx.prepare_cached(sql)?;
        Ok(stmt.execute(params)?)
    }
}

/// Runs `work` inside a session: commit on `Ok`, rollback on `Err`.
pub fn with_session<T, F>(conn: &mut Connection, config: SessionConfig, work: F) -> RepoResult<T>
where
    F: FnOnce(&mut Session<'_>) -> RepoResult<T>,
{
    let mut session = Session::begin(conn, config)?;
    match work(&mut session) {
        Ok(value) => {
            session.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback() {
                warn!(
                    "event=session_rollback module=session status=error error={}",
                    rollback_err
                );
            }
            Err(err)
        }
    }
}

fn run_native<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> rusqlite::Result<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map)?;
    rows.collect()
}

fn insert_sql<E: Entity>() -> String {
    let placeholders = (1..=E::COLUMNS.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        E::TABLE,
        E::COLUMNS.join(", ")
    )
}

fn update_sql<E: Entity>() -> String {
    let assignments = E::COLUMNS
        .iter()
        .enumerate()
        .map(|(index, column)| format!("{column} = ?{}", index + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {assignments} WHERE {} = ?{}",
        E::TABLE,
        E::ID_COLUMN,
        E::COLUMNS.len() + 1
    )
}

fn compact_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::{compact_sql, insert_sql, update_sql};
    use crate::model::{Member, Team};

    #[test]
    fn insert_and_update_sql_follow_column_order() {
        assert_eq!(
            insert_sql::<Member>(),
            "INSERT INTO member (username, age, team_id) VALUES (?1, ?2, ?3)"
        );
        assert_eq!(
            update_sql::<Member>(),
            "UPDATE member SET username = ?1, age = ?2, team_id = ?3 WHERE member_id = ?4"
        );
        assert_eq!(
            update_sql::<Team>(),
            "UPDATE team SET name = ?1 WHERE team_id = ?2"
        );
    }

    #[test]
    fn compact_sql_collapses_whitespace() {
        assert_eq!(compact_sql("SELECT a,\n   b\tFROM t"), "SELECT a, b FROM t");
    }
}
