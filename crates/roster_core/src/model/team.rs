//! Team entity and its member back-collection.
//!
//! # Invariants
//! - `members` is derived from `member.team_id`; it is never written as a
//!   column and stays sorted by id.
//! - Team names are unique (enforced by the schema).

use super::entity::{sealed::Managed, Entity, EntityId};
use super::member::MemberId;
use super::ModelError;
use crate::session::identity::{IdentityMap, IdentityMaps};
use rusqlite::types::{Type, Value};
use rusqlite::Row;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Generated surrogate key of `team`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TeamId(i64);

impl EntityId for TeamId {
    fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    fn raw(self) -> i64 {
        self.0
    }
}

impl From<i64> for TeamId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for TeamId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    id: Option<TeamId>,
    pub name: String,
    members: Vec<MemberId>,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<TeamId> {
        self.id
    }

    /// Ids of members referencing this team, ascending.
    pub fn members(&self) -> &[MemberId] {
        &self.members
    }

    pub(crate) fn attach_member(&mut self, member_id: MemberId) {
        if let Err(position) = self.members.binary_search(&member_id) {
            self.members.insert(position, member_id);
        }
    }

    pub(crate) fn detach_member(&mut self, member_id: MemberId) {
        if let Ok(position) = self.members.binary_search(&member_id) {
            self.members.remove(position);
        }
    }

    /// Maps the team columns of a member row that left-joined `team`.
    ///
    /// Expects `team_id`, `team_name` and `team_member_ids`; yields `None`
    /// when the member has no team.
    pub(crate) fn from_member_join(row: &Row<'_>) -> rusqlite::Result<Option<Self>> {
        let Some(team_id) = row.get::<_, Option<i64>>("team_id")? else {
            return Ok(None);
        };
        let member_ids_index = row.as_ref().column_index("team_member_ids")?;
        Ok(Some(Self {
            id: Some(TeamId(team_id)),
            name: row.get("team_name")?,
            members: parse_member_ids(row.get(member_ids_index)?, member_ids_index)?,
        }))
    }
}

impl Display for Team {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "Team(id={id}, name={})", self.name),
            None => write!(f, "Team(id=new, name={})", self.name),
        }
    }
}

impl Entity for Team {
    type Id = TeamId;

    const NAME: &'static str = "team";
    const TABLE: &'static str = "team";
    const ID_COLUMN: &'static str = "team_id";
    const COLUMNS: &'static [&'static str] = &["name"];
    const SELECT_SQL: &'static str = "SELECT t.team_id, t.name,
        (SELECT group_concat(x.member_id) FROM member x WHERE x.team_id = t.team_id) AS member_ids
        FROM team t";
    const ID_FILTER: &'static str = "t.team_id";

    fn id(&self) -> Option<TeamId> {
        self.id
    }

    fn column_values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let member_ids_index = row.as_ref().column_index("member_ids")?;
        Ok(Self {
            id: Some(TeamId(row.get("team_id")?)),
            name: row.get("name")?,
            members: parse_member_ids(row.get(member_ids_index)?, member_ids_index)?,
        })
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::BlankTeamName);
        }
        Ok(())
    }
}

impl Managed for Team {
    fn assign_id(&mut self, raw: i64) {
        if self.id.is_none() {
            self.id = Some(TeamId(raw));
        }
    }

    fn identity_map(maps: &IdentityMaps) -> &IdentityMap<Self> {
        &maps.teams
    }

    fn identity_map_mut(maps: &mut IdentityMaps) -> &mut IdentityMap<Self> {
        &mut maps.teams
    }

    fn on_load(&mut self, maps: &IdentityMaps) {
        maps.align_back_collection(self);
    }

    /// The back-collection belongs to the session, not to the caller's copy.
    fn merged(managed: &Self, incoming: Self) -> Self {
        Self {
            members: managed.members.clone(),
            ..incoming
        }
    }
}

fn parse_member_ids(raw: Option<String>, column: usize) -> rusqlite::Result<Vec<MemberId>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let mut ids = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map(MemberId::from_raw)
                .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
        })
        .collect::<rusqlite::Result<Vec<_>>>()?;
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}
