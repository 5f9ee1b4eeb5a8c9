//! Runs bound member queries through a session.
//!
//! Shared by every member lookup so locking, eager fetch, read-only
//! handling and page/slice assembly behave the same everywhere.

use crate::model::{Entity, Member, Team};
use crate::page::{Page, PageRequest, Slice, Sort};
use crate::projection::Projection;
use crate::query::named::named_query;
use crate::query::{BoundQuery, FetchPlan, LockMode, Window};
use crate::repo::{RepoError, RepoResult};
use crate::session::Session;
use log::info;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Row};

/// Selects members, honoring the declaration's lock mode, fetch plan and
/// read-only flag.
pub(crate) fn select_members(
    session: &mut Session<'_>,
    bound: &BoundQuery<'_>,
    sort: &Sort,
    window: Option<Window>,
) -> RepoResult<Vec<Member>> {
    let query = bound.query();
    if query.lock_mode() == LockMode::PessimisticWrite {
        let (sql, values) = bound.lock();
        let locked = session.execute_update(&sql, params_from_iter(values))?;
        info!(
            "event=lock_acquire module=repo status=ok query={} rows={locked}",
            query.name()
        );
    }

    let fetch = query.fetch_plan();
    let (sql, values) = bound.select(sort, window)?;
    let rows = session.execute_query(&sql, params_from_iter(values), |row| {
        member_row(row, fetch)
    })?;

    Ok(rows
        .into_iter()
        .map(|(member, team)| {
            if query.is_read_only() {
                session.managed_or_detached(member)
            } else {
                session.manage_fetched(member, team)
            }
        })
        .collect())
}

pub(crate) fn count_members(session: &mut Session<'_>, bound: &BoundQuery<'_>) -> RepoResult<u64> {
    let (sql, values) = bound.count();
    let total = session.execute_scalar::<i64, _>(&sql, params_from_iter(values))?;
    to_total(total)
}

/// Content window plus total count. The count statement is skipped when
/// the window alone determines the total.
pub(crate) fn page_members(
    session: &mut Session<'_>,
    bound: &BoundQuery<'_>,
    request: &PageRequest,
) -> RepoResult<Page<Member>> {
    let content = select_members(session, bound, request.sort(), Some(window_of(request)))?;
    let total = page_total(request, content.len(), || count_members(session, bound))?;
    Ok(Page::new(content, request, total))
}

/// Fetches one row past the window to learn whether a next slice exists.
pub(crate) fn slice_members(
    session: &mut Session<'_>,
    bound: &BoundQuery<'_>,
    request: &PageRequest,
) -> RepoResult<Slice<Member>> {
    let window = Window {
        limit: u64::from(request.size()) + 1,
        offset: request.offset(),
    };
    let content = select_members(session, bound, request.sort(), Some(window))?;
    Ok(Slice::from_lookahead(content, request))
}

/// Runs a named member query and tracks the results.
pub(crate) fn named_members(
    session: &mut Session<'_>,
    name: &str,
    args: &[(&str, Value)],
    fetch: FetchPlan,
) -> RepoResult<Vec<Member>> {
    let rows = run_named(session, name, args, |row| member_row(row, fetch))?;
    Ok(rows
        .into_iter()
        .map(|(member, team)| session.manage_fetched(member, team))
        .collect())
}

/// Runs a named query with a custom row mapper; results are not tracked.
pub(crate) fn run_named<T, F>(
    session: &mut Session<'_>,
    name: &str,
    args: &[(&str, Value)],
    map: F,
) -> RepoResult<Vec<T>>
where
    F: FnMut(&Row<'_>) -> RepoResult<T>,
{
    let query = named_query(name)?;
    let bound = query.bind(args)?;
    session.execute_query(query.sql(), bound.as_slice(), map)
}

/// Runs a named set-based update. Managed members are cleared afterwards
/// when the session is configured to.
pub(crate) fn run_named_update(
    session: &mut Session<'_>,
    name: &str,
    args: &[(&str, Value)],
) -> RepoResult<usize> {
    let query = named_query(name)?;
    let bound = query.bind(args)?;
    let updated = session.execute_update(query.sql(), bound.as_slice())?;
    let cleared = session.config().clear_after_bulk_update;
    if cleared {
        session.clear();
    }
    info!(
        "event=bulk_update module=repo status=ok query={name} rows={updated} cleared={cleared}"
    );
    Ok(updated)
}

/// Pages caller-supplied SQL. Only `ORDER BY` (checked against the
/// projection's columns) and `LIMIT/OFFSET` are appended.
pub(crate) fn native_page<T: Projection>(
    session: &mut Session<'_>,
    content_sql: &str,
    count_sql: &str,
    request: &PageRequest,
) -> RepoResult<Page<T>> {
    let terms = request.sort().order_terms(|property| {
        T::COLUMNS.iter().copied().find(|column| *column == property)
    })?;
    let mut sql = content_sql.trim_end().to_string();
    if !terms.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }
    sql.push_str(" LIMIT ?1 OFFSET ?2");

    let window = window_of(request);
    let content = session.execute_native(
        &sql,
        [to_sql_integer(window.limit)?, to_sql_integer(window.offset)?],
        |row| T::from_row(row),
    )?;
    let total = page_total(request, content.len(), || {
        let counts = session.execute_native(count_sql, [], |row| row.get::<_, i64>(0))?;
        let total = counts.into_iter().next().ok_or_else(|| RepoError::MalformedNativeQuery {
            sql: count_sql.to_string(),
            message: "count query returned no row".to_string(),
        })?;
        to_total(total)
    })?;
    Ok(Page::new(content, request, total))
}

/// Total elements for a fetched window; runs `count` only when the window
/// cannot tell.
pub(crate) fn page_total<F>(request: &PageRequest, fetched: usize, count: F) -> RepoResult<u64>
where
    F: FnOnce() -> RepoResult<u64>,
{
    let fetched = fetched as u64;
    let size = u64::from(request.size());
    if request.offset() == 0 {
        if fetched < size {
            return Ok(fetched);
        }
        return count();
    }
    if fetched != 0 && fetched < size {
        return Ok(request.offset() + fetched);
    }
    count()
}

/// Single-result lookup over an already fetched list.
pub(crate) fn at_most_one<T>(query: &'static str, mut rows: Vec<T>) -> RepoResult<Option<T>> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        count => Err(RepoError::NonUniqueResult { query, count }),
    }
}

fn member_row(row: &Row<'_>, fetch: FetchPlan) -> RepoResult<(Member, Option<Team>)> {
    let member = Member::from_row(row)?;
    let team = match fetch {
        FetchPlan::Lazy => None,
        FetchPlan::Team => Team::from_member_join(row)?,
    };
    Ok((member, team))
}

fn window_of(request: &PageRequest) -> Window {
    Window {
        limit: u64::from(request.size()),
        offset: request.offset(),
    }
}

fn to_sql_integer(value: u64) -> RepoResult<i64> {
    i64::try_from(value)
        .map_err(|_| RepoError::InvalidPageRequest(format!("row window {value} is out of range")))
}

pub(crate) fn to_total(total: i64) -> RepoResult<u64> {
    u64::try_from(total).map_err(|_| RepoError::InvalidData(format!("negative row count {total}")))
}
