//! Entity model for members and their teams.
//!
//! # Responsibility
//! - Define the persisted record types and their identifiers.
//! - Describe how each entity maps to its table (`Entity`).
//!
//! # Invariants
//! - Identifiers are assigned by the session on first save and never change.
//! - `Member.team_id` and `Team.members` change together through
//!   `Session::change_team`.

pub mod entity;
pub mod member;
pub mod read_only;
pub mod team;

pub use entity::{Entity, EntityId};
pub use member::{Member, MemberId};
pub use read_only::ReadOnly;
pub use team::{Team, TeamId};

use thiserror::Error;

/// Field-level validation failures raised before any SQL is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("username must not be blank")]
    BlankUsername,
    #[error("age must not be negative, got {0}")]
    NegativeAge(i64),
    #[error("team name must not be blank")]
    BlankTeamName,
    #[error("team `{0}` must be saved before members can reference it")]
    TeamNotPersisted(String),
}
