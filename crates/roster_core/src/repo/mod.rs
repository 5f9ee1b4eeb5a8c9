//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the member and team data access contracts.
//! - Isolate SQL text, query binding and paging arithmetic from callers.
//!
//! # Invariants
//! - Repository writes go through the session, which validates entities
//!   before any SQL mutation.
//! - Repository APIs return semantic errors (`NotFound`,
//!   `ConstraintViolation`, `LockTimeout`) in addition to engine errors.

mod error;
mod executor;
mod member_queries;
pub mod member_repo;
pub mod team_repo;

pub use error::{RepoError, RepoResult};
pub use member_repo::{MemberCustomRepository, MemberRepository, SqliteMemberRepository};
pub use team_repo::{SqliteTeamRepository, TeamRepository};
