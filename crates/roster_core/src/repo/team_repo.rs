//! Team repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Team names are unique; a duplicate fails with `ConstraintViolation`.
//! - A team still referenced by members cannot be deleted.

use super::executor::to_total;
use super::RepoResult;
use crate::model::{Entity, Team, TeamId};
use crate::session::Session;

/// Repository interface for teams.
pub trait TeamRepository {
    fn save(&mut self, team: Team) -> RepoResult<Team>;
    fn find_by_id(&mut self, id: TeamId) -> RepoResult<Option<Team>>;
    fn find_all(&mut self) -> RepoResult<Vec<Team>>;
    fn count(&mut self) -> RepoResult<u64>;
    fn delete(&mut self, team: Team) -> RepoResult<()>;
}

/// SQLite-backed team repository bound to one session.
pub struct SqliteTeamRepository<'s, 'conn> {
    session: &'s mut Session<'conn>,
}

impl<'s, 'conn> SqliteTeamRepository<'s, 'conn> {
    pub fn new(session: &'s mut Session<'conn>) -> Self {
        Self { session }
    }
}

impl TeamRepository for SqliteTeamRepository<'_, '_> {
    fn save(&mut self, team: Team) -> RepoResult<Team> {
        if team.id().is_some() {
            return self.session.merge(team);
        }
        let mut team = team;
        self.session.persist(&mut team)?;
        Ok(team)
    }

    fn find_by_id(&mut self, id: TeamId) -> RepoResult<Option<Team>> {
        self.session.find::<Team>(id)
    }

    fn find_all(&mut self) -> RepoResult<Vec<Team>> {
        let sql = format!("{} ORDER BY t.team_id", Team::SELECT_SQL);
        let loaded = self
            .session
            .execute_query(&sql, [], |row| Ok(Team::from_row(row)?))?;
        Ok(loaded
            .into_iter()
            .map(|team| self.session.manage(team))
            .collect())
    }

    fn count(&mut self) -> RepoResult<u64> {
        let total = self
            .session
            .execute_scalar::<i64, _>("SELECT COUNT(*) FROM team", [])?;
        to_total(total)
    }

    fn delete(&mut self, team: Team) -> RepoResult<()> {
        self.session.remove(team)?;
        Ok(())
    }
}
