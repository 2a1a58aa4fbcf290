//! Verbs over service clients
//!
//! A steps object wraps one service API and the [`Finalizers`] of the scope it
//! was created in. Every create step registers the matching delete before it
//! returns (unless the caller opted out), then waits for the resource to
//! settle. Mutations take a `check` flag: with `check = true` the step
//! verifies its post-condition and fails with
//! [`StepError::AssertionMismatch`]; with `check = false` the caller does
//! (negative tests).
//!
//! [`Finalizers`]: crate::fixture::Finalizers

mod baremetal;
mod cli;
mod compute;
mod identity;
mod network;
mod orchestration;
mod volume;

pub use baremetal::{BaremetalSteps, NodeSpec};
pub use cli::CliSteps;
pub use compute::KeypairSteps;
pub use identity::IdentitySteps;
pub use network::RouterSteps;
pub use orchestration::{OrchestrationSteps, StackSpec};
pub use volume::{VolumeSpec, VolumeSteps};

use std::fmt::Display;

use uuid::Uuid;

use crate::client::ClientError;
use crate::exec::ExecError;
use crate::templates::TemplateError;
use crate::wait::WaitError;

/// Errors from steps
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{0}")]
    Timeout(#[from] WaitError),

    #[error("{subject}: expected {expected}, got {actual}")]
    AssertionMismatch {
        subject: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl StepError {
    pub fn mismatch(
        subject: impl Into<String>,
        expected: impl Display,
        actual: impl Display,
    ) -> Self {
        StepError::AssertionMismatch {
            subject: subject.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// The API error underneath, if any
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            StepError::Client(e) => Some(e),
            _ => None,
        }
    }
}

/// Fail with `AssertionMismatch` unless `expected == actual`
pub fn check_eq<T: PartialEq + Display>(
    subject: impl Into<String>,
    expected: T,
    actual: T,
) -> Result<(), StepError> {
    if expected == actual {
        Ok(())
    } else {
        Err(StepError::mismatch(subject, expected, actual))
    }
}

/// `<prefix>-<uuid>`; names created by the suite never collide across runs
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// Treat "already gone" as success; teardowns race with explicit deletes
pub(crate) fn ignore_not_found(result: Result<(), ClientError>) -> Result<(), ClientError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

#[cfg(test)]
pub(crate) fn fast_timeouts() -> crate::config::Timeouts {
    use crate::config::{Timeouts, WaitPolicy};
    use std::time::Duration;

    Timeouts::uniform(WaitPolicy::new(
        Duration::from_millis(300),
        Duration::from_millis(5),
    ))
}
