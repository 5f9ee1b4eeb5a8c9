//! Core domain logic for the member roster.
//! This crate is the single source of truth for persistence invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod page;
pub mod projection;
pub mod query;
pub mod repo;
pub mod service;
pub mod session;

pub use config::{CoreConfig, FlushMode, PagingConfig, SessionConfig};
pub use db::{open_db, open_db_in_memory, open_db_with_config, DbError};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LogTarget,
    LoggingError,
};
pub use model::{Member, MemberId, ModelError, ReadOnly, Team, TeamId};
pub use page::{Direction, Order, Page, PageRequest, Slice, Sort};
pub use projection::{MemberDto, MemberProjection, Projection, UsernameOnly, UsernameOnlyDto};
pub use repo::{
    MemberCustomRepository, MemberRepository, RepoError, RepoResult, SqliteMemberRepository,
    SqliteTeamRepository, TeamRepository,
};
pub use service::MemberService;
pub use session::{with_session, Session};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
