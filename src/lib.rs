//! Stepler - fixture-driven end-to-end tests for OpenStack clouds
//!
//! Tests are plain async functions that ask for what they need by name: a
//! client, a steps object, a ready-made volume. The fixture engine builds
//! those on demand, caches them per scope and tears them down in reverse
//! order when the scope ends, even if the test failed or panicked.
//!
//! # Layers
//!
//! - [`auth`] and [`client`]: Keystone auth and one REST client per service,
//!   each behind an async trait
//! - [`steps`]: create/wait/check/delete operations that register their own
//!   cleanup
//! - [`fixture`]: registry, scopes and teardown
//! - [`suite`]: the shipped test cases and the fixtures they use
//! - [`runner`]: sequential execution, `-k`/`-m` selection and the run report
//!
//! # Example
//!
//! ```ignore
//! use stepler::client::Volume;
//! use stepler::steps::VolumeSteps;
//!
//! #[stepler::test]
//! async fn test_volume_is_available(volume: Volume, volume_steps: VolumeSteps) {
//!     let stored = volume_steps.get_volume(&volume.id).await.unwrap();
//!     assert_eq!(stored.status, "available");
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Everything touching cinder, except the CLI checks
//! stepler run -m cinder -k "not cli"
//!
//! # Reuse the configured project, serialized across processes
//! stepler run --use-default-project
//!
//! # What would run
//! stepler list -k volume
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod exec;
pub mod fixture;
pub mod lock;
pub mod plugins;
pub mod report;
pub mod runner;
pub mod steps;
pub mod suite;
pub mod telemetry;
pub mod templates;
pub mod wait;

// Re-export commonly used types
pub use config::{ConfigError, Credentials, RunConfig, Timeouts, WaitPolicy};
pub use fixture::{Fixture, FixtureError, FixtureRequest, Registry, Scope, Session};
pub use runner::{ExitStatus, RunOptions, Runner};
pub use steps::StepError;
pub use stepler_macros::test;
pub use suite::{Suite, TestCase};

#[doc(hidden)]
pub mod __private {
    pub use futures;
    pub use tokio;
}
