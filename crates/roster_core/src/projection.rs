//! Output-only shapes over member and team columns.
//!
//! # Responsibility
//! - Describe how a narrow row shape is selected and mapped (`Projection`).
//! - Provide the shapes callers ask for: a username view, a username DTO,
//!   a member/team DTO and the native paged projection.
//!
//! # Invariants
//! - Projections are never tracked by a session and never written back.
//! - `SELECT_LIST` is evaluated over `member m LEFT JOIN team t`.

use crate::model::{Member, MemberId, Team};
use crate::repo::{RepoError, RepoResult};
use rusqlite::Row;
use serde::Serialize;

/// A row shape that can be requested at the call site.
pub trait Projection: Sized {
    const NAME: &'static str;
    /// Output column names; also the sort whitelist for native paging.
    const COLUMNS: &'static [&'static str];
    /// Select list over `member m LEFT JOIN team t`, aliased to `COLUMNS`.
    const SELECT_LIST: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Read-only view exposing only the username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsernameOnly {
    username: String,
}

impl UsernameOnly {
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl Projection for UsernameOnly {
    const NAME: &'static str = "UsernameOnly";
    const COLUMNS: &'static [&'static str] = &["username"];
    const SELECT_LIST: &'static str = "m.username AS username";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            username: row.get("username")?,
        })
    }
}

/// Concrete single-field DTO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsernameOnlyDto {
    pub username: String,
}

impl UsernameOnlyDto {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

impl Projection for UsernameOnlyDto {
    const NAME: &'static str = "UsernameOnlyDto";
    const COLUMNS: &'static [&'static str] = &["username"];
    const SELECT_LIST: &'static str = "m.username AS username";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self::new(row.get::<_, String>("username")?))
    }
}

/// Member joined with its team name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub id: MemberId,
    pub username: String,
    pub team_name: Option<String>,
}

impl MemberDto {
    /// Builds the DTO from a saved member and its resolved team.
    pub fn from_member(member: &Member, team: Option<&Team>) -> RepoResult<Self> {
        let id = member.id().ok_or(RepoError::Transient("member"))?;
        Ok(Self {
            id,
            username: member.username.clone(),
            team_name: team.map(|team| team.name.clone()),
        })
    }
}

impl Projection for MemberDto {
    const NAME: &'static str = "MemberDto";
    const COLUMNS: &'static [&'static str] = &["member_id", "username", "team_name"];
    const SELECT_LIST: &'static str = "m.member_id AS member_id, m.username AS username, t.name AS team_name";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: MemberId::from(row.get::<_, i64>("member_id")?),
            username: row.get("username")?,
            team_name: row.get("team_name")?,
        })
    }
}

/// Shape of the native paged projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProjection {
    pub id: i64,
    pub username: String,
    pub team_name: Option<String>,
}

impl Projection for MemberProjection {
    const NAME: &'static str = "MemberProjection";
    const COLUMNS: &'static [&'static str] = &["id", "username", "team_name"];
    const SELECT_LIST: &'static str = "m.member_id AS id, m.username AS username, t.name AS team_name";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            team_name: row.get("team_name")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{MemberDto, MemberProjection, Projection, UsernameOnly};
    use crate::model::entity::sealed::Managed;
    use crate::model::{Member, Team};
    use crate::repo::RepoError;
    use rusqlite::Connection;

    fn select_one<P: Projection>(conn: &Connection) -> P {
        let sql = format!(
            "SELECT {} FROM member m LEFT JOIN team t ON t.team_id = m.team_id",
            P::SELECT_LIST
        );
        conn.query_row(&sql, [], |row| P::from_row(row)).unwrap()
    }

    fn seeded() -> Connection {
        let conn = crate::db::open_db_in_memory().unwrap();
        conn.execute("INSERT INTO team (name) VALUES ('teamA')", []).unwrap();
        conn.execute(
            "INSERT INTO member (username, age, team_id) VALUES ('m1', 10, 1)",
            [],
        )
        .unwrap();
        conn
    }

    #[test]
    fn projections_map_their_own_columns_only() {
        let conn = seeded();
        assert_eq!(select_one::<UsernameOnly>(&conn).username(), "m1");

        let projection = select_one::<MemberProjection>(&conn);
        assert_eq!(projection.id, 1);
        assert_eq!(projection.team_name.as_deref(), Some("teamA"));

        let dto = select_one::<MemberDto>(&conn);
        assert_eq!(dto.username, "m1");
    }

    #[test]
    fn member_dto_requires_saved_member() {
        let team = Team::new("teamA");
        let err = MemberDto::from_member(&Member::new("m1", 1), Some(&team)).unwrap_err();
        assert!(matches!(err, RepoError::Transient("member")));

        let mut member = Member::new("m1", 1);
        member.assign_id(3);
        let dto = MemberDto::from_member(&member, None).unwrap();
        assert_eq!(dto.team_name, None);
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["id"], 3);
        assert!(json.get("teamName").is_some());
    }
}
