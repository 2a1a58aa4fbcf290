//! Run report printed after the last test
//!
//! Lists every failing test (including tests whose body passed but whose
//! teardown failed), session teardown failures and a one-line summary.

use std::fmt;
use std::time::Duration;

use crate::fixture::TeardownFailure;
use crate::runner::ExitStatus;

const LINE_WIDTH: usize = 80;
const HEAVY_LINE: &str = "━";
const LIGHT_LINE: &str = "─";

/// How a test body ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    /// The body returned an error or panicked
    Failed,
    /// A fixture could not be set up
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => write!(f, "PASSED"),
            Outcome::Failed => write!(f, "FAILED"),
            Outcome::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of one collected test
#[derive(Debug)]
pub struct TestReport {
    pub node_id: String,
    pub idempotent_id: Option<String>,
    pub outcome: Outcome,
    /// Error or panic text when the outcome is not `Passed`
    pub message: Option<String>,
    pub teardown: Vec<TeardownFailure>,
    pub duration: Duration,
}

impl TestReport {
    /// Failed body, setup error or failed teardown
    pub fn is_failure(&self) -> bool {
        self.outcome != Outcome::Passed || !self.teardown.is_empty()
    }

    /// Status word for the progress line
    pub fn status(&self) -> &'static str {
        match self.outcome {
            Outcome::Passed if !self.teardown.is_empty() => "TEARDOWN FAILED",
            Outcome::Passed => "PASSED",
            Outcome::Failed => "FAILED",
            Outcome::Error => "ERROR",
        }
    }
}

/// Everything that happened in one run
#[derive(Debug, Default)]
pub struct RunReport {
    pub tests: Vec<TestReport>,
    pub session_teardown: Vec<TeardownFailure>,
    /// Collected tests the filters left out
    pub deselected: usize,
    pub duration: Duration,
}

impl RunReport {
    fn count(&self, outcome: Outcome) -> usize {
        self.tests.iter().filter(|t| t.outcome == outcome).count()
    }

    pub fn passed(&self) -> usize {
        self.tests.iter().filter(|t| !t.is_failure()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestReport> {
        self.tests.iter().filter(|t| t.is_failure())
    }

    pub fn exit_status(&self) -> ExitStatus {
        if self.tests.is_empty() {
            ExitStatus::NoTests
        } else if self.failures().next().is_some() || !self.session_teardown.is_empty() {
            ExitStatus::Failed
        } else {
            ExitStatus::Passed
        }
    }

    fn heavy_line() -> String {
        HEAVY_LINE.repeat(LINE_WIDTH)
    }

    fn section_header(title: &str) -> String {
        let title_with_spaces = format!(" {title} ");
        let remaining = LINE_WIDTH.saturating_sub(title_with_spaces.chars().count() + 3);
        format!(
            "{}{}{}",
            LIGHT_LINE.repeat(3),
            title_with_spaces,
            LIGHT_LINE.repeat(remaining)
        )
    }

    fn summary(&self) -> String {
        let teardown_only = self
            .tests
            .iter()
            .filter(|t| t.outcome == Outcome::Passed && t.is_failure())
            .count();
        let mut parts = vec![format!("{} passed", self.passed())];
        for (n, label) in [
            (self.count(Outcome::Failed), "failed"),
            (self.count(Outcome::Error), "error"),
            (teardown_only, "teardown failed"),
            (self.deselected, "deselected"),
        ] {
            if n > 0 {
                parts.push(format!("{n} {label}"));
            }
        }
        format!("{} in {:.2}s", parts.join(", "), self.duration.as_secs_f64())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.exit_status() == ExitStatus::Failed;

        writeln!(f)?;
        writeln!(f, "{}", Self::heavy_line())?;
        if failed {
            writeln!(f, "  STEPLER RUN FAILED")?;
        } else {
            writeln!(f, "  STEPLER RUN PASSED")?;
        }
        writeln!(f, "{}", Self::heavy_line())?;

        let failures: Vec<_> = self.failures().collect();
        if !failures.is_empty() {
            writeln!(f)?;
            writeln!(
                f,
                "{}",
                Self::section_header(&format!("Failures ({})", failures.len()))
            )?;
            for test in failures {
                writeln!(f)?;
                match &test.idempotent_id {
                    Some(id) => writeln!(f, "[{}] id={}", test.node_id, id)?,
                    None => writeln!(f, "[{}]", test.node_id)?,
                }
                if let Some(message) = &test.message {
                    writeln!(f, "  {}: {}", test.outcome, message)?;
                }
                for teardown in &test.teardown {
                    writeln!(f, "  {teardown}")?;
                }
            }
        }

        if !self.session_teardown.is_empty() {
            writeln!(f)?;
            writeln!(f, "{}", Self::section_header("Session teardown"))?;
            writeln!(f)?;
            for teardown in &self.session_teardown {
                writeln!(f, "  {teardown}")?;
            }
        }

        writeln!(f)?;
        writeln!(f, "  {}", self.summary())?;
        writeln!(f, "{}", Self::heavy_line())?;
        Ok(())
    }
}
