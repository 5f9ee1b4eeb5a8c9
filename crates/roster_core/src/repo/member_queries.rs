//! Member lookups declared once per process.

use crate::query::{Condition, FetchPlan, LockMode, MemberField, MemberQuery};
use once_cell::sync::Lazy;

pub(crate) static ALL: Lazy<MemberQuery> = Lazy::new(|| MemberQuery::declare("Member.findAll"));

pub(crate) static ALL_WITH_TEAM: Lazy<MemberQuery> =
    Lazy::new(|| MemberQuery::declare("Member.findAllWithTeam").fetch(FetchPlan::Team));

pub(crate) static BY_USERNAME_AND_AGE_GREATER_THAN: Lazy<MemberQuery> = Lazy::new(|| {
    MemberQuery::declare("Member.findByUsernameAndAgeGreaterThan")
        .filter(Condition::Eq(MemberField::Username).and(Condition::Gt(MemberField::Age)))
});

pub(crate) static BY_NAMES: Lazy<MemberQuery> = Lazy::new(|| {
    MemberQuery::declare("Member.findByNames").filter(Condition::In(MemberField::Username))
});

pub(crate) static BY_AGE: Lazy<MemberQuery> =
    Lazy::new(|| MemberQuery::declare("Member.findByAge").filter(Condition::Eq(MemberField::Age)));

pub(crate) static SLICE_BY_AGE: Lazy<MemberQuery> = Lazy::new(|| {
    MemberQuery::declare("Member.findSliceByAge").filter(Condition::Eq(MemberField::Age))
});

/// Content joins the team; the total is counted without the join.
pub(crate) static EXTRACT_COUNT_BY_AGE: Lazy<MemberQuery> = Lazy::new(|| {
    MemberQuery::declare("Member.findExtractCountByAge")
        .filter(Condition::Eq(MemberField::Age))
        .fetch(FetchPlan::Team)
        .count_with(
            MemberQuery::declare("Member.countByAge").filter(Condition::Eq(MemberField::Age)),
        )
});

pub(crate) static ENTITY_GRAPH_BY_USERNAME: Lazy<MemberQuery> = Lazy::new(|| {
    MemberQuery::declare("Member.findEntityGraphByUsername")
        .filter(Condition::Eq(MemberField::Username))
        .fetch(FetchPlan::Team)
});

pub(crate) static LOCK_BY_USERNAME: Lazy<MemberQuery> = Lazy::new(|| {
    MemberQuery::declare("Member.findLockByUsername")
        .filter(Condition::Eq(MemberField::Username))
        .lock(LockMode::PessimisticWrite)
});

pub(crate) static READ_ONLY_BY_USERNAME: Lazy<MemberQuery> = Lazy::new(|| {
    MemberQuery::declare("Member.findReadOnlyByUsername")
        .filter(Condition::Eq(MemberField::Username))
        .read_only()
});

pub(crate) static PROJECTIONS_BY_USERNAME: Lazy<MemberQuery> = Lazy::new(|| {
    MemberQuery::declare("Member.findProjectionsByUsername")
        .filter(Condition::Eq(MemberField::Username))
});

/// Raw SQL of the native single-member lookup.
pub(crate) const NATIVE_BY_USERNAME_SQL: &str = "select * from member where username = ?1";

/// Raw SQL of the native paged projection and its count.
pub(crate) const NATIVE_PROJECTION_SQL: &str = "select m.member_id as id, m.username, t.name as team_name
    from member m left join team t on t.team_id = m.team_id";
pub(crate) const NATIVE_PROJECTION_COUNT_SQL: &str = "select count(*) from member";
