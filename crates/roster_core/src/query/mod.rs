//! Query definitions resolved once and bound per call.
//!
//! # Responsibility
//! - `derived`: typed member predicates declared in code (field, operator,
//!   fixed ordering, fetch plan, lock mode).
//! - `named`: SQL text registered under a stable name.
//!
//! # Invariants
//! - Declarations never embed caller values; only bound arguments vary.
//! - Sort properties reach SQL only through the member field whitelist.

pub mod derived;
pub mod named;

pub use derived::{
    BoundQuery, Condition, FetchPlan, LockMode, MemberField, MemberQuery, QueryArg, Window,
};
pub use named::{named_query, NamedQuery};
