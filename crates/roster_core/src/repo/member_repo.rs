//! Member repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Expose CRUD, declared lookups, named queries, projections, paging,
//!   bulk update, eager fetch, locking, read-only and native lookups over
//!   the `member` table.
//! - Keep SQL and identity-map details inside the session boundary.
//!
//! # Invariants
//! - Every lookup runs inside the session the repository was built with.
//! - Tracked results are the session's managed instances; read-only and
//!   projection results are never tracked.
//! - Sort properties are checked against a whitelist before any SQL runs.

use super::executor::{
    at_most_one, count_members, named_members, native_page, page_members, run_named,
    run_named_update, select_members, slice_members,
};
use super::member_queries::{
    ALL, ALL_WITH_TEAM, BY_AGE, BY_NAMES, BY_USERNAME_AND_AGE_GREATER_THAN,
    ENTITY_GRAPH_BY_USERNAME, EXTRACT_COUNT_BY_AGE, LOCK_BY_USERNAME, NATIVE_BY_USERNAME_SQL,
    NATIVE_PROJECTION_COUNT_SQL, NATIVE_PROJECTION_SQL, PROJECTIONS_BY_USERNAME,
    READ_ONLY_BY_USERNAME, SLICE_BY_AGE,
};
use super::RepoResult;
use crate::model::{Entity, Member, MemberId, ReadOnly, Team};
use crate::page::{Page, PageRequest, Slice, Sort};
use crate::projection::{MemberDto, MemberProjection, Projection, UsernameOnly};
use crate::query::named::{
    BULK_AGE_PLUS, FIND_BY_USERNAME, FIND_MEMBER_DTO, FIND_MEMBER_FETCH_JOIN, FIND_USER,
    FIND_USERNAME_LIST,
};
use crate::query::{FetchPlan, QueryArg};
use crate::session::Session;
use log::debug;
use rusqlite::params_from_iter;
use rusqlite::types::Value;

/// Lookups implemented imperatively against the session rather than
/// declared.
pub trait MemberCustomRepository {
    fn find_custom_member(&mut self) -> RepoResult<Vec<Member>>;
}

/// Repository interface for members.
pub trait MemberRepository: MemberCustomRepository {
    /// Inserts a new member or merges a saved one into managed state.
    fn save(&mut self, member: Member) -> RepoResult<Member>;
    fn find_by_id(&mut self, id: MemberId) -> RepoResult<Option<Member>>;
    /// All members with their team fetched in the same statement.
    fn find_all(&mut self) -> RepoResult<Vec<Member>>;
    fn find_all_paged(&mut self, request: &PageRequest) -> RepoResult<Page<Member>>;
    fn count(&mut self) -> RepoResult<u64>;
    fn delete(&mut self, member: Member) -> RepoResult<()>;
    /// Returns `false` when no member has `id`.
    fn delete_by_id(&mut self, id: MemberId) -> RepoResult<bool>;

    fn find_by_username_and_age_greater_than(
        &mut self,
        username: &str,
        age: i64,
    ) -> RepoResult<Vec<Member>>;
    fn find_by_names(&mut self, names: &[&str]) -> RepoResult<Vec<Member>>;
    fn find_by_age(&mut self, age: i64, request: &PageRequest) -> RepoResult<Page<Member>>;
    fn find_slice_by_age(&mut self, age: i64, request: &PageRequest) -> RepoResult<Slice<Member>>;
    /// Page whose content joins the team while the total is counted on
    /// `member` alone.
    fn find_extract_count_by_age(
        &mut self,
        age: i64,
        request: &PageRequest,
    ) -> RepoResult<Page<Member>>;

    fn find_by_username(&mut self, username: &str) -> RepoResult<Vec<Member>>;
    fn find_user(&mut self, username: &str, age: i64) -> RepoResult<Vec<Member>>;
    fn find_username_list(&mut self) -> RepoResult<Vec<String>>;
    /// Members that belong to a team, joined with the team name.
    fn find_member_dto(&mut self) -> RepoResult<Vec<MemberDto>>;

    fn find_projections_by_username(&mut self, username: &str) -> RepoResult<Vec<UsernameOnly>>;
    /// Same filter as `find_projections_by_username`, shape chosen by `T`.
    fn find_projections_by_username_as<T: Projection>(
        &mut self,
        username: &str,
    ) -> RepoResult<Vec<T>>
    where
        Self: Sized;

    /// Adds one year to every member aged `age` or older; returns the number
    /// of rows changed.
    ///
    /// Runs set-based, outside change tracking. Unless the session is
    /// configured to clear after bulk updates, members loaded before keep
    /// their old age until `Session::clear` or `Session::refresh`.
    fn bulk_age_plus(&mut self, age: i64) -> RepoResult<usize>;

    fn find_member_fetch_join(&mut self) -> RepoResult<Vec<Member>>;
    fn find_member_entity_graph(&mut self) -> RepoResult<Vec<Member>>;
    fn find_entity_graph_by_username(&mut self, username: &str) -> RepoResult<Vec<Member>>;

    /// Holds the database write lock over matching rows until the session
    /// ends. Fails with `LockTimeout` once the busy timeout elapses.
    fn find_lock_by_username(&mut self, username: &str) -> RepoResult<Vec<Member>>;
    fn find_read_only_by_username(&mut self, username: &str)
        -> RepoResult<Option<ReadOnly<Member>>>;

    fn find_by_native_query(&mut self, username: &str) -> RepoResult<Option<Member>>;
    fn find_by_native_projection(
        &mut self,
        request: &PageRequest,
    ) -> RepoResult<Page<MemberProjection>>;

    /// Resolves the member's team, from the session when already loaded.
    fn team_of(&mut self, member: &Member) -> RepoResult<Option<Team>>;
}

/// SQLite-backed member repository bound to one session.
pub struct SqliteMemberRepository<'s, 'conn> {
    session: &'s mut Session<'conn>,
}

impl<'s, 'conn> SqliteMemberRepository<'s, 'conn> {
    pub fn new(session: &'s mut Session<'conn>) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut Session<'conn> {
        self.session
    }
}

impl MemberCustomRepository for SqliteMemberRepository<'_, '_> {
    fn find_custom_member(&mut self) -> RepoResult<Vec<Member>> {
        let sql = format!("{} ORDER BY m.member_id", Member::SELECT_SQL);
        let loaded = self
            .session
            .execute_query(&sql, [], |row| Ok(Member::from_row(row)?))?;
        Ok(loaded
            .into_iter()
            .map(|member| self.session.manage(member))
            .collect())
    }
}

impl MemberRepository for SqliteMemberRepository<'_, '_> {
    fn save(&mut self, member: Member) -> RepoResult<Member> {
        if member.id().is_some() {
            return self.session.merge(member);
        }
        let mut member = member;
        self.session.persist(&mut member)?;
        Ok(member)
    }

    fn find_by_id(&mut self, id: MemberId) -> RepoResult<Option<Member>> {
        self.session.find::<Member>(id)
    }

    fn find_all(&mut self) -> RepoResult<Vec<Member>> {
        let bound = ALL_WITH_TEAM.bind(&[])?;
        select_members(self.session, &bound, &Sort::unsorted(), None)
    }

    fn find_all_paged(&mut self, request: &PageRequest) -> RepoResult<Page<Member>> {
        let bound = ALL.bind(&[])?;
        page_members(self.session, &bound, request)
    }

    fn count(&mut self) -> RepoResult<u64> {
        let bound = ALL.bind(&[])?;
        count_members(self.session, &bound)
    }

    fn delete(&mut self, member: Member) -> RepoResult<()> {
        self.session.remove(member)?;
        Ok(())
    }

    fn delete_by_id(&mut self, id: MemberId) -> RepoResult<bool> {
        match self.session.find::<Member>(id)? {
            Some(member) => self.session.remove(member),
            None => {
                debug!("event=member_delete module=repo status=skip reason=not_found id={id}");
                Ok(false)
            }
        }
    }

    fn find_by_username_and_age_greater_than(
        &mut self,
        username: &str,
        age: i64,
    ) -> RepoResult<Vec<Member>> {
        let bound = BY_USERNAME_AND_AGE_GREATER_THAN.bind(&[username.into(), age.into()])?;
        select_members(self.session, &bound, &Sort::unsorted(), None)
    }

    fn find_by_names(&mut self, names: &[&str]) -> RepoResult<Vec<Member>> {
        let bound = BY_NAMES.bind(&[QueryArg::texts(names)])?;
        select_members(self.session, &bound, &Sort::unsorted(), None)
    }

    fn find_by_age(&mut self, age: i64, request: &PageRequest) -> RepoResult<Page<Member>> {
        let bound = BY_AGE.bind(&[age.into()])?;
        page_members(self.session, &bound, request)
    }

    fn find_slice_by_age(&mut self, age: i64, request: &PageRequest) -> RepoResult<Slice<Member>> {
        let bound = SLICE_BY_AGE.bind(&[age.into()])?;
        slice_members(self.session, &bound, request)
    }

    fn find_extract_count_by_age(
        &mut self,
        age: i64,
        request: &PageRequest,
    ) -> RepoResult<Page<Member>> {
        let bound = EXTRACT_COUNT_BY_AGE.bind(&[age.into()])?;
        page_members(self.session, &bound, request)
    }

    fn find_by_username(&mut self, username: &str) -> RepoResult<Vec<Member>> {
        let args = [("username", Value::Text(username.to_string()))];
        named_members(self.session, FIND_BY_USERNAME, &args, FetchPlan::Lazy)
    }

    fn find_user(&mut self, username: &str, age: i64) -> RepoResult<Vec<Member>> {
        let args = [
            ("username", Value::Text(username.to_string())),
            ("age", Value::Integer(age)),
        ];
        named_members(self.session, FIND_USER, &args, FetchPlan::Lazy)
    }

    fn find_username_list(&mut self) -> RepoResult<Vec<String>> {
        run_named(self.session, FIND_USERNAME_LIST, &[], |row| Ok(row.get(0)?))
    }

    fn find_member_dto(&mut self) -> RepoResult<Vec<MemberDto>> {
        run_named(self.session, FIND_MEMBER_DTO, &[], |row| {
            Ok(MemberDto::from_row(row)?)
        })
    }

    fn find_projections_by_username(&mut self, username: &str) -> RepoResult<Vec<UsernameOnly>> {
        self.find_projections_by_username_as::<UsernameOnly>(username)
    }

    fn find_projections_by_username_as<T: Projection>(
        &mut self,
        username: &str,
    ) -> RepoResult<Vec<T>> {
        let bound = PROJECTIONS_BY_USERNAME.bind(&[username.into()])?;
        let (sql, values) = bound.project(T::SELECT_LIST)?;
        debug!("event=projection module=repo status=start shape={}", T::NAME);
        self.session
            .execute_query(&sql, params_from_iter(values), |row| Ok(T::from_row(row)?))
    }

    fn bulk_age_plus(&mut self, age: i64) -> RepoResult<usize> {
        run_named_update(self.session, BULK_AGE_PLUS, &[("age", Value::Integer(age))])
    }

    fn find_member_fetch_join(&mut self) -> RepoResult<Vec<Member>> {
        named_members(self.session, FIND_MEMBER_FETCH_JOIN, &[], FetchPlan::Team)
    }

    fn find_member_entity_graph(&mut self) -> RepoResult<Vec<Member>> {
        let bound = ALL_WITH_TEAM.bind(&[])?;
        select_members(self.session, &bound, &Sort::unsorted(), None)
    }

    fn find_entity_graph_by_username(&mut self, username: &str) -> RepoResult<Vec<Member>> {
        let bound = ENTITY_GRAPH_BY_USERNAME.bind(&[username.into()])?;
        select_members(self.session, &bound, &Sort::unsorted(), None)
    }

    fn find_lock_by_username(&mut self, username: &str) -> RepoResult<Vec<Member>> {
        let bound = LOCK_BY_USERNAME.bind(&[username.into()])?;
        select_members(self.session, &bound, &Sort::unsorted(), None)
    }

    fn find_read_only_by_username(
        &mut self,
        username: &str,
    ) -> RepoResult<Option<ReadOnly<Member>>> {
        let bound = READ_ONLY_BY_USERNAME.bind(&[username.into()])?;
        let rows = select_members(self.session, &bound, &Sort::unsorted(), None)?;
        Ok(at_most_one(READ_ONLY_BY_USERNAME.name(), rows)?.map(ReadOnly::new))
    }

    fn find_by_native_query(&mut self, username: &str) -> RepoResult<Option<Member>> {
        let rows = self
            .session
            .execute_native(NATIVE_BY_USERNAME_SQL, [username], |row| Member::from_row(row))?;
        Ok(at_most_one("Member.findByNativeQuery", rows)?.map(|member| self.session.manage(member)))
    }

    fn find_by_native_projection(
        &mut self,
        request: &PageRequest,
    ) -> RepoResult<Page<MemberProjection>> {
        native_page(
            self.session,
            NATIVE_PROJECTION_SQL,
            NATIVE_PROJECTION_COUNT_SQL,
            request,
        )
    }

    fn team_of(&mut self, member: &Member) -> RepoResult<Option<Team>> {
        self.session.team_of(member)
    }
}
