//! Run-level hooks around collection and execution
//!
//! - [`filter`]: `-k` / `-m` selection expressions
//! - [`idempotent`]: stable UUIDs per test, validated at collection
//! - [`default_project`]: reuse the configured project, serialized by a file lock
//! - [`empty_results`]: the message printed when nothing was selected
//!
//! Retrieving a fixture by a name chosen at runtime needs no hook: it is
//! [`FixtureRequest::get_fixture_value`](crate::fixture::FixtureRequest::get_fixture_value).

pub mod default_project;
pub mod empty_results;
pub mod filter;
pub mod idempotent;

pub use filter::{Expr, Filter, FilterError};
pub use idempotent::CollectError;
