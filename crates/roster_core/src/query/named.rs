//! Registry of SQL text declared once under a stable name.
//!
//! Statements are prepared through the connection's statement cache, so
//! each name is compiled at most once per connection.

use crate::repo::{RepoError, RepoResult};
use log::debug;
use once_cell::sync::Lazy;
use rusqlite::types::{ToSql, Value};
use std::collections::HashMap;

pub const FIND_BY_USERNAME: &str = "Member.findByUsername";
pub const FIND_USER: &str = "Member.findUser";
pub const FIND_USERNAME_LIST: &str = "Member.findUsernameList";
pub const FIND_MEMBER_DTO: &str = "Member.findMemberDto";
pub const FIND_MEMBER_FETCH_JOIN: &str = "Member.findMemberFetchJoin";
pub const BULK_AGE_PLUS: &str = "Member.bulkAgePlus";

/// Parameterized SQL registered under `name`. Parameters use the
/// `:param` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedQuery {
    name: &'static str,
    sql: &'static str,
    params: &'static [&'static str],
}

impl NamedQuery {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn sql(&self) -> &'static str {
        self.sql
    }

    /// Declared parameter names, without the leading `:`.
    pub fn params(&self) -> impl Iterator<Item = &'static str> {
        self.params.iter().map(|param| param.trim_start_matches(':'))
    }

    /// Pairs `args` with the declared parameters. Every declared parameter
    /// must be supplied exactly once; order does not matter.
    pub(crate) fn bind<'a>(
        &self,
        args: &'a [(&str, Value)],
    ) -> RepoResult<Vec<(&'static str, &'a dyn ToSql)>> {
        if args.len() != self.params.len() {
            return Err(RepoError::ArgumentMismatch {
                query: self.name,
                expected: self.params.len(),
                actual: args.len(),
            });
        }
        self.params
            .iter()
            .map(|param| {
                let key = param.trim_start_matches(':');
                args.iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, value)| (*param, value as &dyn ToSql))
                    .ok_or_else(|| RepoError::ArgumentMismatch {
                        query: self.name,
                        expected: self.params.len(),
                        actual: args.iter().filter(|(name, _)| self.declares(name)).count(),
                    })
            })
            .collect()
    }

    fn declares(&self, name: &str) -> bool {
        self.params().any(|param| param == name)
    }
}

static REGISTRY: Lazy<HashMap<&'static str, NamedQuery>> = Lazy::new(|| {
    let queries = [
        NamedQuery {
            name: FIND_BY_USERNAME,
            sql: "SELECT m.member_id, m.username, m.age, m.team_id FROM member m
                  WHERE m.username = :username ORDER BY m.member_id",
            params: &[":username"],
        },
        NamedQuery {
            name: FIND_USER,
            sql: "SELECT m.member_id, m.username, m.age, m.team_id FROM member m
                  WHERE m.username = :username AND m.age = :age ORDER BY m.member_id",
            params: &[":username", ":age"],
        },
        NamedQuery {
            name: FIND_USERNAME_LIST,
            sql: "SELECT m.username FROM member m ORDER BY m.member_id",
            params: &[],
        },
        NamedQuery {
            name: FIND_MEMBER_DTO,
            sql: "SELECT m.member_id, m.username, t.name AS team_name
                  FROM member m JOIN team t ON t.team_id = m.team_id ORDER BY m.member_id",
            params: &[],
        },
        NamedQuery {
            name: FIND_MEMBER_FETCH_JOIN,
            sql: "SELECT m.member_id, m.username, m.age, m.team_id,
                  t.name AS team_name,
                  (SELECT group_concat(x.member_id) FROM member x WHERE x.team_id = t.team_id) AS team_member_ids
                  FROM member m LEFT JOIN team t ON t.team_id = m.team_id ORDER BY m.member_id",
            params: &[],
        },
        NamedQuery {
            name: BULK_AGE_PLUS,
            sql: "UPDATE member SET age = age + 1 WHERE age >= :age",
            params: &[":age"],
        },
    ];
    debug!(
        "event=named_query_registry module=query status=ok count={}",
        queries.len()
    );
    queries.into_iter().map(|query| (query.name, query)).collect()
});

/// Looks up a registered query by name.
pub fn named_query(name: &str) -> RepoResult<&'static NamedQuery> {
    REGISTRY
        .get(name)
        .ok_or_else(|| RepoError::UnknownNamedQuery(name.to_string()))
}
