//! Running in the configured project instead of a throwaway one
//!
//! By default every test gets a fresh project through the autouse
//! `isolated_project` fixture. With `--use-default-project` that fixture is
//! switched off and tests share the configured project; the autouse
//! `default_project_lock` then serializes them across runner processes.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::config::RunConfig;
use crate::fixture::{Fixture, FixtureError, FixtureRequest, FixtureValue, Registry};
use crate::lock::FileLock;

pub const ISOLATED_PROJECT: &str = "isolated_project";
pub const DEFAULT_PROJECT_LOCK: &str = "default_project_lock";

/// Switch the registry over to the shared project when asked to
///
/// Returns whether the isolated project was disabled.
pub fn apply(registry: &mut Registry, use_default_project: bool) -> bool {
    if !use_default_project {
        return false;
    }
    let disabled = registry.disable_autouse(ISOLATED_PROJECT);
    if registry.contains(DEFAULT_PROJECT_LOCK) {
        registry.autouse(DEFAULT_PROJECT_LOCK);
    }
    info!(disabled, "Using the default project");
    disabled
}

/// Lock file guarding the default project
pub fn lock_path(config: &RunConfig) -> PathBuf {
    config.lock_dir.join(format!(
        "default_project-{}.lock",
        config.credentials.project_name
    ))
}

/// Held lock, released when the test scope ends
#[derive(Debug)]
pub struct ProjectLock {
    path: Option<PathBuf>,
    held: Mutex<Option<FileLock>>,
}

impl ProjectLock {
    /// Lock file path, or `None` when tests run in isolated projects
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    fn release(&self) -> Result<(), crate::lock::LockError> {
        let held = self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match held {
            Some(lock) => lock.release(),
            None => Ok(()),
        }
    }
}

/// Test-scoped fixture taking the default project lock
pub struct DefaultProjectLock;

#[async_trait]
impl Fixture for DefaultProjectLock {
    async fn setup(&self, req: &mut FixtureRequest<'_>) -> Result<FixtureValue, FixtureError> {
        let config = req.get::<RunConfig>("config").await?;
        if !config.use_default_project {
            return Ok(Arc::new(ProjectLock {
                path: None,
                held: Mutex::new(None),
            }));
        }

        let path = lock_path(&config);
        let lock = FileLock::acquire(&path).await?;
        let guard = Arc::new(ProjectLock {
            path: Some(path.clone()),
            held: Mutex::new(Some(lock)),
        });

        let release = guard.clone();
        req.add_finalizer(format!("release {}", path.display()), move || async move {
            release.release()
        });
        Ok(guard)
    }
}
