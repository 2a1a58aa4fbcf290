//! Sequential test runner
//!
//! Collects the suite, applies `-k`/`-m` filters, then drives one test at a
//! time through its own fixture scope:
//! - resolve autouse fixtures (a failure is a setup error)
//! - run the body, catching panics
//! - unwind the test's teardowns, whatever happened before
//!
//! Session fixtures are torn down after the last test.

use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{info, warn};

use crate::config::ConfigError;
use crate::fixture::{panic_message, FixtureError, Registry, Session};
use crate::plugins::{empty_results, CollectError, Filter, FilterError};
use crate::report::{Outcome, RunReport, TestReport};
use crate::suite::{CollectedTest, Suite};

/// Process exit status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Passed,
    /// A test failed or errored, or a teardown failed
    Failed,
    Internal,
    /// Bad filter expression or configuration
    Usage,
    NoTests,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Passed => 0,
            ExitStatus::Failed => 1,
            ExitStatus::Internal => 2,
            ExitStatus::Usage => 4,
            ExitStatus::NoTests => 5,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        // codes are all in 0..=5
        std::process::ExitCode::from(status.code() as u8)
    }
}

/// Errors that stop a run before or outside any test
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("collection failed: {0}")]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write run output: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            RunError::Filter(_) | RunError::Config(_) => ExitStatus::Usage,
            RunError::Collect(_) | RunError::Io(_) => ExitStatus::Internal,
        }
    }
}

/// Test selection
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// `-k` expression
    pub keyword: Option<String>,
    /// `-m` expression
    pub marks: Option<String>,
}

/// Runs a filtered suite
pub struct Runner {
    suite: Suite,
    filter: Filter,
}

impl Runner {
    /// Fails on a malformed filter expression
    pub fn new(suite: Suite, options: &RunOptions) -> Result<Self, RunError> {
        let filter = Filter::new(options.keyword.as_deref(), options.marks.as_deref())?;
        Ok(Self { suite, filter })
    }

    /// Collected tests the filters keep, plus how many they dropped
    pub fn select(&self) -> Result<(Vec<CollectedTest>, usize), RunError> {
        let collected = self.suite.collect()?;
        let total = collected.len();
        let selected: Vec<_> = collected
            .into_iter()
            .filter(|t| self.filter.selects(t))
            .collect();
        let deselected = total - selected.len();
        info!(selected = selected.len(), deselected, "Collected tests");
        Ok((selected, deselected))
    }

    /// Print selected node IDs with their idempotent IDs
    pub fn list(&self, out: &mut dyn Write) -> Result<ExitStatus, RunError> {
        let (selected, _) = self.select()?;
        if selected.is_empty() {
            empty_results::report(out, &self.filter)?;
            return Ok(ExitStatus::NoTests);
        }
        for test in &selected {
            match &test.idempotent_id {
                Some(id) => writeln!(out, "{} id={}", test.node_id, id)?,
                None => writeln!(out, "{}", test.node_id)?,
            }
        }
        Ok(ExitStatus::Passed)
    }

    /// Run every selected test in collection order
    ///
    /// `registry` is only built once something is selected, so an empty
    /// selection never needs cloud configuration.
    pub async fn run<F>(&self, out: &mut dyn Write, registry: F) -> Result<RunReport, RunError>
    where
        F: FnOnce() -> Result<Registry, RunError>,
    {
        let started = Instant::now();
        let (selected, deselected) = self.select()?;
        if selected.is_empty() {
            empty_results::report(out, &self.filter)?;
            return Ok(RunReport {
                deselected,
                ..Default::default()
            });
        }

        let mut session = Session::new(Arc::new(registry()?));
        let mut tests = Vec::with_capacity(selected.len());
        for test in &selected {
            let report = run_test(&mut session, test).await;
            writeln!(out, "{} {}", report.node_id, report.status())?;
            tests.push(report);
        }

        let session_teardown = session.finish().await;
        let report = RunReport {
            tests,
            session_teardown,
            deselected,
            duration: started.elapsed(),
        };
        write!(out, "{report}")?;
        Ok(report)
    }
}

async fn run_test(session: &mut Session, test: &CollectedTest) -> TestReport {
    let started = Instant::now();
    info!(test = %test.node_id, "Running");

    let mut scope = session.test_scope().with_params(test.params.clone());
    let body = test.body;
    let (outcome, message) = AssertUnwindSafe(async {
        if let Err(e) = scope.setup_autouse().await {
            return (Outcome::Error, Some(e.to_string()));
        }
        let mut req = scope.request();
        match body(&mut req).await {
            Ok(()) => (Outcome::Passed, None),
            Err(e) if e.is::<FixtureError>() => (Outcome::Error, Some(e.to_string())),
            Err(e) => (Outcome::Failed, Some(e.to_string())),
        }
    })
    .catch_unwind()
    .await
    .unwrap_or_else(|panic| {
        (
            Outcome::Failed,
            Some(format!("panicked: {}", panic_message(panic.as_ref()))),
        )
    });

    let teardown = scope.finish().await;
    match &message {
        Some(message) => warn!(test = %test.node_id, %outcome, %message, "Test did not pass"),
        None => info!(test = %test.node_id, "Passed"),
    }
    for failure in &teardown {
        warn!(test = %test.node_id, %failure, "Teardown failed");
    }

    TestReport {
        node_id: test.node_id.clone(),
        idempotent_id: test.idempotent_id.clone(),
        outcome,
        message,
        teardown,
        duration: started.elapsed(),
    }
}
