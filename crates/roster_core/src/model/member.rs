//! Member entity: the root record of the roster.
//!
//! # Invariants
//! - `id` is `None` until the first save and immutable afterwards.
//! - `team_id` changes only through `Session::change_team` or a merge, both
//!   of which keep the team's back-collection in step.

use super::entity::{sealed::Managed, Entity, EntityId};
use super::team::{Team, TeamId};
use super::ModelError;
use crate::session::identity::{IdentityMap, IdentityMaps};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Generated surrogate key of `member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MemberId(i64);

impl EntityId for MemberId {
    fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    fn raw(self) -> i64 {
        self.0
    }
}

impl From<i64> for MemberId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for MemberId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    id: Option<MemberId>,
    pub username: String,
    pub age: i64,
    team_id: Option<TeamId>,
}

impl Member {
    pub fn new(username: impl Into<String>, age: i64) -> Self {
        Self {
            id: None,
            username: username.into(),
            age,
            team_id: None,
        }
    }

    /// Member with age `0`.
    pub fn named(username: impl Into<String>) -> Self {
        Self::new(username, 0)
    }

    /// Member that references an already saved team.
    ///
    /// The team's back-collection picks up the member when it is saved
    /// through a session that manages the team.
    pub fn with_team(
        username: impl Into<String>,
        age: i64,
        team: &Team,
    ) -> Result<Self, ModelError> {
        let team_id = team
            .id()
            .ok_or_else(|| ModelError::TeamNotPersisted(team.name.clone()))?;
        let mut member = Self::new(username, age);
        member.team_id = Some(team_id);
        Ok(member)
    }

    pub fn id(&self) -> Option<MemberId> {
        self.id
    }

    pub fn team_id(&self) -> Option<TeamId> {
        self.team_id
    }

    pub(crate) fn set_team_id(&mut self, team_id: Option<TeamId>) {
        self.team_id = team_id;
    }
}

impl Display for Member {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "Member(id={id}, username={}, age={})", self.username, self.age),
            None => write!(f, "Member(id=new, username={}, age={})", self.username, self.age),
        }
    }
}

impl Entity for Member {
    type Id = MemberId;

    const NAME: &'static str = "member";
    const TABLE: &'static str = "member";
    const ID_COLUMN: &'static str = "member_id";
    const COLUMNS: &'static [&'static str] = &["username", "age", "team_id"];
    const SELECT_SQL: &'static str = "SELECT m.member_id, m.username, m.age, m.team_id FROM member m";
    const ID_FILTER: &'static str = "m.member_id";

    fn id(&self) -> Option<MemberId> {
        self.id
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.username.clone()),
            Value::Integer(self.age),
            self.team_id
                .map_or(Value::Null, |team_id| Value::Integer(team_id.raw())),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(MemberId(row.get("member_id")?)),
            username: row.get("username")?,
            age: row.get("age")?,
            team_id: row.get::<_, Option<i64>>("team_id")?.map(TeamId::from_raw),
        })
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.username.trim().is_empty() {
            return Err(ModelError::BlankUsername);
        }
        if self.age < 0 {
            return Err(ModelError::NegativeAge(self.age));
        }
        Ok(())
    }
}

impl Managed for Member {
    fn assign_id(&mut self, raw: i64) {
        if self.id.is_none() {
            self.id = Some(MemberId(raw));
        }
    }

    fn identity_map(maps: &IdentityMaps) -> &IdentityMap<Self> {
        &maps.members
    }

    fn identity_map_mut(maps: &mut IdentityMaps) -> &mut IdentityMap<Self> {
        &mut maps.members
    }

    fn after_persist(&self, maps: &mut IdentityMaps) {
        if let (Some(id), Some(team_id)) = (self.id, self.team_id) {
            maps.attach_member(team_id, id);
        }
    }

    fn after_merge(previous: &Self, current: &Self, maps: &mut IdentityMaps) {
        let Some(id) = current.id else {
            return;
        };
        if previous.team_id == current.team_id {
            return;
        }
        if let Some(old_team) = previous.team_id {
            maps.detach_member(old_team, id);
        }
        if let Some(new_team) = current.team_id {
            maps.attach_member(new_team, id);
        }
    }

    fn after_remove(&self, maps: &mut IdentityMaps) {
        if let (Some(id), Some(team_id)) = (self.id, self.team_id) {
            maps.detach_member(team_id, id);
        }
    }
}
