//! Paging and sorting envelopes.
//!
//! # Responsibility
//! - Describe a requested window (`PageRequest`) and ordering (`Sort`).
//! - Wrap bounded results as `Page` (with total count) or `Slice`
//!   (has-next flag only).
//!
//! # Invariants
//! - Page indexes are zero-based; page size is always greater than zero.
//! - Sort properties are plain identifiers; they are resolved against a
//!   whitelist when a query is rendered, never spliced in verbatim.

use crate::config::PagingConfig;
use crate::repo::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{Serialize, Serializer};
use serde::Serialize as DeriveSerialize;

static SORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*(?:,\s*((?i)asc|desc)\s*)?$")
        .expect("valid sort regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    property: String,
    direction: Direction,
}

impl Order {
    pub fn new(property: impl Into<String>, direction: Direction) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Ordered list of sort keys. Empty means unsorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(direction: Direction, properties: &[&str]) -> Self {
        Self {
            orders: properties
                .iter()
                .map(|property| Order::new(*property, direction))
                .collect(),
        }
    }

    pub fn asc(property: &str) -> Self {
        Self::by(Direction::Asc, &[property])
    }

    pub fn desc(property: &str) -> Self {
        Self::by(Direction::Desc, &[property])
    }

    pub fn and(mut self, other: Sort) -> Self {
        self.orders.extend(other.orders);
        self
    }

    /// Parses the `property[,asc|desc]` query-parameter form.
    pub fn parse(raw: &str) -> RepoResult<Self> {
        let captures = SORT_RE
            .captures(raw)
            .ok_or_else(|| RepoError::InvalidSort(raw.to_string()))?;
        let direction = match captures.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
            Some(value) if value == "desc" => Direction::Desc,
            _ => Direction::Asc,
        };
        Ok(Self::by(direction, &[&captures[1]]))
    }

    /// Parses several `sort` parameters, keeping their order.
    pub fn parse_all<'a>(exprs: impl IntoIterator<Item = &'a str>) -> RepoResult<Self> {
        exprs
            .into_iter()
            .try_fold(Self::unsorted(), |sort, raw| Ok(sort.and(Self::parse(raw)?)))
    }

    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Renders `expr ASC|DESC` terms, mapping each property through
    /// `resolve`. Unknown properties fail with `InvalidSort`.
    pub(crate) fn order_terms<F>(&self, resolve: F) -> RepoResult<Vec<String>>
    where
        F: Fn(&str) -> Option<&'static str>,
    {
        self.orders
            .iter()
            .map(|order| {
                resolve(&order.property)
                    .map(|expr| format!("{expr} {}", order.direction.as_sql()))
                    .ok_or_else(|| RepoError::InvalidSort(order.property.clone()))
            })
            .collect()
    }
}

/// Zero-based page index, page size and ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
    sort: Sort,
}

impl PageRequest {
    pub fn of(page: u32, size: u32) -> RepoResult<Self> {
        Self::of_sorted(page, size, Sort::unsorted())
    }

    pub fn of_sorted(page: u32, size: u32, sort: Sort) -> RepoResult<Self> {
        if size == 0 {
            return Err(RepoError::InvalidPageRequest(
                "page size must be greater than zero".to_string(),
            ));
        }
        Ok(Self { page, size, sort })
    }

    /// Builds a request from query-parameter style input.
    ///
    /// Missing or zero size falls back to the configured default, sizes above
    /// the configured maximum are clamped, and a missing sort uses the
    /// configured default sort.
    pub fn from_params(
        page: Option<u32>,
        size: Option<u32>,
        sort: Option<&str>,
        config: &PagingConfig,
    ) -> RepoResult<Self> {
        let sort = Sort::parse(sort.unwrap_or(&config.default_sort))?;
        Self::resolve(page, size, config.default_size, config.max_size, sort)
    }

    /// Like `from_params`, with the DTO listing defaults: `dto_default_size`
    /// and no ordering beyond the id tiebreaker.
    pub fn from_dto_params(
        page: Option<u32>,
        size: Option<u32>,
        sort: Option<&str>,
        config: &PagingConfig,
    ) -> RepoResult<Self> {
        let sort = sort.map(Sort::parse).transpose()?.unwrap_or_default();
        Self::resolve(page, size, config.dto_default_size, config.max_size, sort)
    }

    fn resolve(
        page: Option<u32>,
        size: Option<u32>,
        default_size: u32,
        max_size: u32,
        sort: Sort,
    ) -> RepoResult<Self> {
        let size = match size {
            None | Some(0) => default_size,
            Some(value) => value.min(max_size),
        };
        Self::of_sorted(page.unwrap_or(0), size, sort)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    pub fn with_sort(self, sort: Sort) -> Self {
        Self { sort, ..self }
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn previous_or_first(&self) -> Self {
        Self {
            page: self.page.saturating_sub(1),
            ..self.clone()
        }
    }

    pub fn first(&self) -> Self {
        Self {
            page: 0,
            ..self.clone()
        }
    }
}

/// Bounded result plus total-count metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    content: Vec<T>,
    number: u32,
    size: u32,
    total_elements: u64,
    sort: Sort,
}

impl<T> Page<T> {
    pub(crate) fn new(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            number: request.page,
            size: request.size,
            total_elements,
            sort: request.sort.clone(),
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn total_pages(&self) -> u64 {
        self.total_elements.div_ceil(u64::from(self.size))
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.number) + 1 < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
            sort: self.sort,
        }
    }

    pub fn try_map<U, E, F>(self, f: F) -> Result<Page<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        Ok(Page {
            content: self.content.into_iter().map(f).collect::<Result<_, _>>()?,
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
            sort: self.sort,
        })
    }
}

#[derive(DeriveSerialize)]
#[serde(rename_all = "camelCase")]
struct PageEnvelope<'a, T> {
    content: &'a [T],
    total_elements: u64,
    total_pages: u64,
    number: u32,
    size: u32,
    first: bool,
    last: bool,
    has_next: bool,
}

impl<T: Serialize> Serialize for Page<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PageEnvelope {
            content: &self.content,
            total_elements: self.total_elements,
            total_pages: self.total_pages(),
            number: self.number,
            size: self.size,
            first: self.is_first(),
            last: self.is_last(),
            has_next: self.has_next(),
        }
        .serialize(serializer)
    }
}

/// Bounded result that only knows whether another page exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice<T> {
    content: Vec<T>,
    number: u32,
    size: u32,
    has_next: bool,
    sort: Sort,
}

impl<T> Slice<T> {
    /// Trims a `size + 1` lookahead down to `size` and derives `has_next`.
    pub(crate) fn from_lookahead(mut content: Vec<T>, request: &PageRequest) -> Self {
        let size = usize::try_from(request.size).unwrap_or(usize::MAX);
        let has_next = content.len() > size;
        content.truncate(size);
        Self {
            content,
            number: request.page,
            size: request.size,
            has_next,
            sort: request.sort.clone(),
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Slice<U> {
        Slice {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            has_next: self.has_next,
            sort: self.sort,
        }
    }
}

#[derive(DeriveSerialize)]
#[serde(rename_all = "camelCase")]
struct SliceEnvelope<'a, T> {
    content: &'a [T],
    number: u32,
    size: u32,
    first: bool,
    has_next: bool,
}

impl<T: Serialize> Serialize for Slice<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SliceEnvelope {
            content: &self.content,
            number: self.number,
            size: self.size,
            first: self.is_first(),
            has_next: self.has_next,
        }
        .serialize(serializer)
    }
}
