//! Member/team association handling inside a session.

use super::Session;
use crate::model::{EntityId, Member, MemberId, Team, TeamId};
use crate::repo::{RepoError, RepoResult};
use log::debug;

impl Session<'_> {
    /// Moves a member to `team_id` (or out of any team), updating the
    /// member reference and both teams' back-collections in one step.
    ///
    /// Loads the member and the target team if they are not managed yet.
    /// The member row is written on the next flush.
    pub fn change_team(&mut self, member_id: MemberId, team_id: Option<TeamId>) -> RepoResult<()> {
        let member = self.find::<Member>(member_id)?.ok_or(RepoError::NotFound {
            entity: "member",
            id: member_id.raw(),
        })?;
        if let Some(team_id) = team_id {
            self.find::<Team>(team_id)?.ok_or(RepoError::NotFound {
                entity: "team",
                id: team_id.raw(),
            })?;
        }

        let previous = member.team_id();
        if previous == team_id {
            return Ok(());
        }
        if let Some(old_team) = previous {
            self.maps.detach_member(old_team, member_id);
        }
        if let Some(new_team) = team_id {
            self.maps.attach_member(new_team, member_id);
        }
        if let Some(managed) = self.maps.members.get_mut(member_id) {
            managed.set_team_id(team_id);
        }

        debug!(
            "event=change_team module=session status=ok member_id={} from={:?} to={:?}",
            member_id, previous, team_id
        );
        Ok(())
    }

    /// Resolves a member's team. Served from the identity map when the team
    /// was fetched eagerly or loaded before; otherwise one `SELECT`.
    pub fn team_of(&mut self, member: &Member) -> RepoResult<Option<Team>> {
        match member.team_id() {
            Some(team_id) => self.find::<Team>(team_id),
            None => Ok(None),
        }
    }

    /// Tracks a member together with the team fetched in the same row.
    pub(crate) fn manage_fetched(&mut self, member: Member, team: Option<Team>) -> Member {
        if let Some(team) = team {
            self.manage(team);
        }
        self.manage(member)
    }
}
