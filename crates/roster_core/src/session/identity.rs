//! Identity map with snapshots for dirty checking.

use crate::model::{Entity, EntityId, Member, MemberId, Team, TeamId};
use rusqlite::types::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Tracked<E> {
    current: E,
    snapshot: Vec<Value>,
}

/// Managed instances of one entity type, keyed by raw id.
#[derive(Debug)]
pub struct IdentityMap<E> {
    entries: HashMap<i64, Tracked<E>>,
}

impl<E> Default for IdentityMap<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<E: Entity> IdentityMap<E> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: E::Id) -> bool {
        self.entries.contains_key(&id.raw())
    }

    pub(crate) fn get(&self, id: E::Id) -> Option<&E> {
        self.entries.get(&id.raw()).map(|tracked| &tracked.current)
    }

    pub(crate) fn get_mut(&mut self, id: E::Id) -> Option<&mut E> {
        self.entries
            .get_mut(&id.raw())
            .map(|tracked| &mut tracked.current)
    }

    /// Starts tracking a freshly loaded or inserted instance as clean.
    pub(crate) fn track(&mut self, id: E::Id, entity: E) {
        let snapshot = entity.column_values();
        self.entries.insert(
            id.raw(),
            Tracked {
                current: entity,
                snapshot,
            },
        );
    }

    /// Replaces managed state, keeping the last flushed snapshot.
    pub(crate) fn replace(&mut self, id: E::Id, entity: E) {
        match self.entries.get_mut(&id.raw()) {
            Some(tracked) => tracked.current = entity,
            None => self.track(id, entity),
        }
    }

    pub(crate) fn evict(&mut self, id: E::Id) -> Option<E> {
        self.entries.remove(&id.raw()).map(|tracked| tracked.current)
    }

    /// Entries whose columns differ from their snapshot, ordered by id.
    pub(crate) fn dirty(&self) -> Vec<(E::Id, E)> {
        let mut dirty = self
            .entries
            .iter()
            .filter(|(raw, tracked)| {
                tracked.current.id().map(EntityId::raw) != Some(**raw)
                    || tracked.current.column_values() != tracked.snapshot
            })
            .map(|(raw, tracked)| (E::Id::from_raw(*raw), tracked.current.clone()))
            .collect::<Vec<_>>();
        dirty.sort_by_key(|(id, _)| id.raw());
        dirty
    }

    pub(crate) fn mark_clean(&mut self, id: E::Id) {
        if let Some(tracked) = self.entries.get_mut(&id.raw()) {
            tracked.snapshot = tracked.current.column_values();
        }
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &E> {
        self.entries.values().map(|tracked| &tracked.current)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// All identity maps of one session.
#[derive(Debug, Default)]
pub struct IdentityMaps {
    pub(crate) members: IdentityMap<Member>,
    pub(crate) teams: IdentityMap<Team>,
}

impl IdentityMaps {
    pub(crate) fn clear(&mut self) {
        self.members.clear();
        self.teams.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len() + self.teams.len()
    }

    /// Adds `member_id` to the managed team's back-collection, if managed.
    pub(crate) fn attach_member(&mut self, team_id: TeamId, member_id: MemberId) {
        if let Some(team) = self.teams.get_mut(team_id) {
            team.attach_member(member_id);
        }
    }

    pub(crate) fn detach_member(&mut self, team_id: TeamId, member_id: MemberId) {
        if let Some(team) = self.teams.get_mut(team_id) {
            team.detach_member(member_id);
        }
    }

    /// Rewrites a loaded team's member list so managed members count by
    /// their in-memory `team_id`, flushed or not.
    pub(crate) fn align_back_collection(&self, team: &mut Team) {
        let Some(team_id) = team.id() else {
            return;
        };
        for member in self.members.values() {
            let Some(member_id) = member.id() else {
                continue;
            };
            if member.team_id() == Some(team_id) {
                team.attach_member(member_id);
            } else {
                team.detach_member(member_id);
            }
        }
    }
}
