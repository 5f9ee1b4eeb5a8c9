//! Typed member predicates.
//!
//! A `MemberQuery` fixes everything but the arguments at declaration time:
//! the predicate tree, a static ordering, whether the team is fetched in the
//! same statement, the lock mode and whether results are tracked. `bind`
//! checks the arguments against the predicate and renders SQL fragments.

use crate::model::{Entity, Member};
use crate::page::Sort;
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;

/// Member columns joined with the owning team and its back-collection.
pub const MEMBER_WITH_TEAM_SQL: &str = "SELECT m.member_id, m.username, m.age, m.team_id,
    t.name AS team_name,
    (SELECT group_concat(x.member_id) FROM member x WHERE x.team_id = t.team_id) AS team_member_ids
    FROM member m LEFT JOIN team t ON t.team_id = m.team_id";

const TEAM_JOIN_SQL: &str = " LEFT JOIN team t ON t.team_id = m.team_id";
const ID_TIEBREAKER: &str = "m.member_id ASC";

/// Queryable and sortable member properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberField {
    Id,
    Username,
    Age,
    Team,
}

impl MemberField {
    pub fn property(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Username => "username",
            Self::Age => "age",
            Self::Team => "teamId",
        }
    }

    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Id => "m.member_id",
            Self::Username => "m.username",
            Self::Age => "m.age",
            Self::Team => "m.team_id",
        }
    }

    pub fn from_property(property: &str) -> Option<Self> {
        [Self::Id, Self::Username, Self::Age, Self::Team]
            .into_iter()
            .find(|field| field.property() == property)
    }

    pub(crate) fn sort_column(property: &str) -> Option<&'static str> {
        Self::from_property(property).map(Self::column)
    }
}

/// Predicate tree over member fields. Leaves consume arguments in
/// left-to-right order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Eq(MemberField),
    Gt(MemberField),
    Ge(MemberField),
    Lt(MemberField),
    Le(MemberField),
    In(MemberField),
    IsNull(MemberField),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn and(self, other: Condition) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Condition) -> Self {
        match self {
            Self::Or(mut parts) => {
                parts.push(other);
                Self::Or(parts)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Number of arguments this predicate consumes.
    pub fn arity(&self) -> usize {
        match self {
            Self::IsNull(_) => 0,
            Self::And(parts) | Self::Or(parts) => parts.iter().map(Condition::arity).sum(),
            _ => 1,
        }
    }

    fn render(
        &self,
        query: &'static str,
        args: &[QueryArg],
        next: &mut usize,
        values: &mut Vec<Value>,
    ) -> RepoResult<String> {
        let comparison = |op: &str, field: MemberField, next: &mut usize, values: &mut Vec<Value>| {
            let value = take_scalar(query, args, next)?;
            values.push(value);
            Ok::<_, RepoError>(format!("{} {op} ?", field.column()))
        };

        match self {
            Self::Eq(field) => comparison("=", *field, next, values),
            Self::Gt(field) => comparison(">", *field, next, values),
            Self::Ge(field) => comparison(">=", *field, next, values),
            Self::Lt(field) => comparison("<", *field, next, values),
            Self::Le(field) => comparison("<=", *field, next, values),
            Self::In(field) => {
                let items = take_list(query, args, next)?;
                let placeholders = vec!["?"; items.len()].join(", ");
                values.extend(items);
                Ok(format!("{} IN ({placeholders})", field.column()))
            }
            Self::IsNull(field) => Ok(format!("{} IS NULL", field.column())),
            Self::And(parts) => render_group(parts, " AND ", query, args, next, values),
            Self::Or(parts) => render_group(parts, " OR ", query, args, next, values),
        }
    }
}

fn render_group(
    parts: &[Condition],
    joiner: &str,
    query: &'static str,
    args: &[QueryArg],
    next: &mut usize,
    values: &mut Vec<Value>,
) -> RepoResult<String> {
    let rendered = parts
        .iter()
        .map(|part| part.render(query, args, next, values))
        .collect::<RepoResult<Vec<_>>>()?;
    Ok(format!("({})", rendered.join(joiner)))
}

fn take_scalar(query: &'static str, args: &[QueryArg], next: &mut usize) -> RepoResult<Value> {
    let index = *next;
    *next += 1;
    match args.get(index) {
        Some(QueryArg::Scalar(value)) => Ok(value.clone()),
        Some(QueryArg::List(_)) => Err(RepoError::ArgumentType {
            query,
            index,
            expected: "single value",
        }),
        None => Err(RepoError::ArgumentMismatch {
            query,
            expected: index + 1,
            actual: args.len(),
        }),
    }
}

fn take_list(query: &'static str, args: &[QueryArg], next: &mut usize) -> RepoResult<Vec<Value>> {
    let index = *next;
    *next += 1;
    match args.get(index) {
        Some(QueryArg::List(values)) => Ok(values.clone()),
        Some(QueryArg::Scalar(value)) => Ok(vec![value.clone()]),
        None => Err(RepoError::ArgumentMismatch {
            query,
            expected: index + 1,
            actual: args.len(),
        }),
    }
}

/// One bound argument: a single value or a collection for `In`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArg {
    Scalar(Value),
    List(Vec<Value>),
}

impl QueryArg {
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn texts<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::List(
            items
                .into_iter()
                .map(|item| Value::Text(item.as_ref().to_string()))
                .collect(),
        )
    }
}

impl From<&str> for QueryArg {
    fn from(value: &str) -> Self {
        Self::Scalar(Value::Text(value.to_string()))
    }
}

impl From<String> for QueryArg {
    fn from(value: String) -> Self {
        Self::Scalar(Value::Text(value))
    }
}

impl From<i64> for QueryArg {
    fn from(value: i64) -> Self {
        Self::Scalar(Value::Integer(value))
    }
}

impl From<i32> for QueryArg {
    fn from(value: i32) -> Self {
        Self::Scalar(Value::Integer(i64::from(value)))
    }
}

impl From<&[&str]> for QueryArg {
    fn from(value: &[&str]) -> Self {
        Self::texts(value)
    }
}

impl From<&[String]> for QueryArg {
    fn from(value: &[String]) -> Self {
        Self::texts(value)
    }
}

/// Whether the owning team is loaded in the same statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchPlan {
    #[default]
    Lazy,
    Team,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockMode {
    #[default]
    None,
    /// Hold the database write lock for matched rows until the
    /// transaction ends.
    PessimisticWrite,
}

/// Declared member lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberQuery {
    name: &'static str,
    condition: Option<Condition>,
    order: Sort,
    fetch: FetchPlan,
    lock: LockMode,
    read_only: bool,
    count: Option<Box<MemberQuery>>,
}

impl MemberQuery {
    pub fn declare(name: &'static str) -> Self {
        Self {
            name,
            condition: None,
            order: Sort::unsorted(),
            fetch: FetchPlan::Lazy,
            lock: LockMode::None,
            read_only: false,
            count: None,
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Static ordering applied before any caller-supplied sort.
    pub fn order_by(mut self, order: Sort) -> Self {
        self.order = order;
        self
    }

    pub fn fetch(mut self, fetch: FetchPlan) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn lock(mut self, lock: LockMode) -> Self {
        self.lock = lock;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Replaces the derived total-count query. The count query receives the
    /// same arguments as the content query.
    pub fn count_with(mut self, count: MemberQuery) -> Self {
        self.count = Some(Box::new(count));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fetch_plan(&self) -> FetchPlan {
        self.fetch
    }

    pub fn lock_mode(&self) -> LockMode {
        self.lock
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn arity(&self) -> usize {
        self.condition.as_ref().map_or(0, Condition::arity)
    }

    /// Checks `args` against the predicate and renders the `WHERE` clauses
    /// of the content and count statements.
    pub fn bind(&self, args: &[QueryArg]) -> RepoResult<BoundQuery<'_>> {
        let (where_sql, values) = self.render_where(args)?;
        let count_query = self.count.as_deref().unwrap_or(self);
        let (count_where_sql, count_values) = count_query.render_where(args)?;
        Ok(BoundQuery {
            query: self,
            where_sql,
            values,
            count_fetch: count_query.fetch,
            count_where_sql,
            count_values,
        })
    }

    fn render_where(&self, args: &[QueryArg]) -> RepoResult<(String, Vec<Value>)> {
        let expected = self.arity();
        if args.len() != expected {
            return Err(RepoError::ArgumentMismatch {
                query: self.name,
                expected,
                actual: args.len(),
            });
        }
        let Some(condition) = &self.condition else {
            return Ok((String::new(), Vec::new()));
        };
        let mut values = Vec::with_capacity(args.len());
        let mut next = 0;
        let rendered = condition.render(self.name, args, &mut next, &mut values)?;
        Ok((format!(" WHERE {rendered}"), values))
    }
}

/// Row window appended as `LIMIT ? OFFSET ?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: u64,
    pub offset: u64,
}

/// A declaration with validated arguments.
#[derive(Debug)]
pub struct BoundQuery<'q> {
    query: &'q MemberQuery,
    where_sql: String,
    values: Vec<Value>,
    count_fetch: FetchPlan,
    count_where_sql: String,
    count_values: Vec<Value>,
}

impl BoundQuery<'_> {
    pub fn query(&self) -> &MemberQuery {
        self.query
    }

    /// Content statement: static ordering, then `sort`, then id as the
    /// final tiebreaker so paging is deterministic.
    pub fn select(&self, sort: &Sort, window: Option<Window>) -> RepoResult<(String, Vec<Value>)> {
        let base = match self.query.fetch {
            FetchPlan::Lazy => Member::SELECT_SQL,
            FetchPlan::Team => MEMBER_WITH_TEAM_SQL,
        };
        let mut terms = self.query.order.order_terms(MemberField::sort_column)?;
        terms.extend(sort.order_terms(MemberField::sort_column)?);
        terms.push(ID_TIEBREAKER.to_string());

        let mut sql = format!("{base}{} ORDER BY {}", self.where_sql, terms.join(", "));
        let mut values = self.values.clone();
        if let Some(window) = window {
            sql.push_str(" LIMIT ? OFFSET ?");
            values.push(Value::Integer(to_sql_integer(window.limit)?));
            values.push(Value::Integer(to_sql_integer(window.offset)?));
        }
        Ok((sql, values))
    }

    /// Projection statement over `member m LEFT JOIN team t` with the
    /// declared predicate and ordering.
    pub fn project(&self, select_list: &str) -> RepoResult<(String, Vec<Value>)> {
        let mut terms = self.query.order.order_terms(MemberField::sort_column)?;
        terms.push(ID_TIEBREAKER.to_string());
        Ok((
            format!(
                "SELECT {select_list} FROM member m{TEAM_JOIN_SQL}{} ORDER BY {}",
                self.where_sql,
                terms.join(", ")
            ),
            self.values.clone(),
        ))
    }

    pub fn count(&self) -> (String, Vec<Value>) {
        let join = match self.count_fetch {
            FetchPlan::Lazy => "",
            FetchPlan::Team => TEAM_JOIN_SQL,
        };
        (
            format!("SELECT COUNT(*) FROM member m{join}{}", self.count_where_sql),
            self.count_values.clone(),
        )
    }

    /// No-op update over the matched rows; takes the write lock before the
    /// content statement runs.
    pub fn lock(&self) -> (String, Vec<Value>) {
        (
            format!(
                "UPDATE member SET username = username WHERE member_id IN (SELECT m.member_id FROM member m{})",
                self.where_sql
            ),
            self.values.clone(),
        )
    }
}

fn to_sql_integer(value: u64) -> RepoResult<i64> {
    i64::try_from(value)
        .map_err(|_| RepoError::InvalidPageRequest(format!("row window {value} is out of range")))
}
