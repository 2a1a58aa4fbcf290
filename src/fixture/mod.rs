//! Fixture registry, resolution and scope management
//!
//! A fixture is a named, lazily created value (a client, a steps object, a
//! cloud resource). Tests ask for fixtures by name; the resolver builds them
//! on first use, recursively resolving whatever they ask for, and caches the
//! result for the rest of the fixture's scope.
//!
//! Teardown is registered while a fixture is being set up through
//! [`FixtureRequest::add_finalizer`] (or through the [`Finalizers`] handle a
//! steps object holds) and runs in reverse registration order when the scope
//! ends.
//!
//! # Example
//!
//! ```ignore
//! use stepler::fixture::{Fixture, FixtureError, FixtureRequest, FixtureValue, Registry, Session};
//!
//! struct VolumeFixture;
//!
//! #[async_trait::async_trait]
//! impl Fixture for VolumeFixture {
//!     async fn setup(&self, req: &mut FixtureRequest<'_>) -> Result<FixtureValue, FixtureError> {
//!         let steps = req.get::<VolumeSteps>("volume_steps").await?;
//!         Ok(Arc::new(steps.create_volume(VolumeSpec::new()).await?))
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.register("volume", VolumeFixture);
//!
//! let mut session = Session::new(Arc::new(registry));
//! let mut scope = session.test_scope();
//! let volume = scope.request().get::<Volume>("volume").await?;
//! let failures = scope.finish().await;
//! ```

mod registry;
mod request;
mod scope;

pub use registry::{Fixture, FnFixture, Registry, SetupFn, ValueFixture};
pub use request::FixtureRequest;
pub use scope::{panic_message, Finalizers, Session, TeardownFailure, TestScope};

use std::any::Any;
use std::sync::Arc;

/// Boxed error used for fixture sources, teardowns and test bodies
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Type-erased fixture value as stored in a scope cache
pub type FixtureValue = Arc<dyn Any + Send + Sync>;

/// Test parameters (one parametrized instance of a test case)
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Lifetime of a fixture value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// Created per test, torn down when the test ends
    Test,
    /// Created once per run, torn down at the end of the run
    Session,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Test => write!(f, "test"),
            Scope::Session => write!(f, "session"),
        }
    }
}

/// Errors from fixture resolution
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("unknown fixture '{0}'")]
    UnknownFixture(String),

    #[error("circular fixture dependency: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("{requested_scope}-scoped fixture '{requested}' cannot be used from {requester}")]
    ScopeMismatch {
        requested: String,
        requested_scope: Scope,
        requester: String,
    },

    #[error("fixture '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("test parameter '{0}' is missing or has the wrong type")]
    MissingParam(String),

    #[error("fixture '{fixture}' setup failed: {source}")]
    SetupFailed {
        fixture: String,
        #[source]
        source: BoxError,
    },

    /// Failure raised inside a fixture body; resolution names the fixture
    #[error(transparent)]
    Failed(BoxError),
}

impl FixtureError {
    /// Wrap any error raised by fixture code
    pub fn failed(err: impl Into<BoxError>) -> Self {
        FixtureError::Failed(err.into())
    }
}

impl From<crate::steps::StepError> for FixtureError {
    fn from(e: crate::steps::StepError) -> Self {
        FixtureError::Failed(Box::new(e))
    }
}

impl From<crate::client::ClientError> for FixtureError {
    fn from(e: crate::client::ClientError) -> Self {
        FixtureError::Failed(Box::new(e))
    }
}

impl From<crate::lock::LockError> for FixtureError {
    fn from(e: crate::lock::LockError) -> Self {
        FixtureError::Failed(Box::new(e))
    }
}
