use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, warn};

use super::{BoxError, FixtureError, FixtureRequest, FixtureValue, Params, Registry, Scope};

type FinalizerFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

struct Finalizer {
    label: String,
    run: FinalizerFn,
}

/// A teardown that failed while a scope was unwinding
#[derive(Debug)]
pub struct TeardownFailure {
    /// Label given when the teardown was registered
    pub label: String,
    pub error: String,
}

impl std::fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "teardown '{}' failed: {}", self.label, self.error)
    }
}

/// Teardown stack of one scope instance
///
/// Cheap to clone; clones push onto the same stack. Steps objects keep one so
/// every resource they create gets its delete registered immediately.
#[derive(Clone)]
pub struct Finalizers {
    scope: Scope,
    stack: Arc<Mutex<Vec<Finalizer>>>,
}

impl Finalizers {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            stack: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Register a teardown; the last one registered runs first
    pub fn push<F, Fut, E>(&self, label: impl Into<String>, teardown: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let label = label.into();
        debug!(scope = %self.scope, teardown = %label, "Registered teardown");
        let run: FinalizerFn = Box::new(move || {
            async move { teardown().await.map_err(Into::into) }.boxed()
        });
        self.lock().push(Finalizer { label, run });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered teardown, most recent first
    ///
    /// A failing or panicking teardown is logged and recorded; the remaining
    /// ones still run. Teardowns registered while unwinding run too.
    pub async fn unwind(&self) -> Vec<TeardownFailure> {
        let mut failures = Vec::new();

        loop {
            let next = self.lock().pop();
            let Some(finalizer) = next else {
                break;
            };

            debug!(scope = %self.scope, teardown = %finalizer.label, "Running teardown");
            let outcome = AssertUnwindSafe((finalizer.run)()).catch_unwind().await;

            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            warn!(
                scope = %self.scope,
                teardown = %finalizer.label,
                error = %error,
                "Teardown failed, continuing with remaining teardowns"
            );
            failures.push(TeardownFailure {
                label: finalizer.label,
                error,
            });
        }

        failures
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Finalizer>> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Finalizers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finalizers")
            .field("scope", &self.scope)
            .field("pending", &self.len())
            .finish()
    }
}

/// Extract a readable message from a panic payload
pub fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    }
}

/// Cache and teardown stack of one scope instance
pub(crate) struct ScopeState {
    pub(crate) cache: HashMap<String, FixtureValue>,
    pub(crate) finalizers: Finalizers,
}

impl ScopeState {
    pub(crate) fn new(scope: Scope) -> Self {
        Self {
            cache: HashMap::new(),
            finalizers: Finalizers::new(scope),
        }
    }
}

/// One run: the registry plus the session scope
pub struct Session {
    registry: Arc<Registry>,
    state: ScopeState,
    tests_started: usize,
}

impl Session {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            state: ScopeState::new(Scope::Session),
            tests_started: 0,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolve session fixtures outside any test
    pub fn request(&mut self) -> FixtureRequest<'_> {
        FixtureRequest::new(&self.registry, &mut self.state, None, None)
    }

    /// Open the scope of the next test
    pub fn test_scope(&mut self) -> TestScope<'_> {
        self.tests_started += 1;
        TestScope {
            session: self,
            state: ScopeState::new(Scope::Test),
            params: Params::new(),
        }
    }

    /// Tear down session fixtures; call once at the end of the run
    pub async fn finish(self) -> Vec<TeardownFailure> {
        info!(
            tests = self.tests_started,
            teardowns = self.state.finalizers.len(),
            "Tearing down session"
        );
        self.state.finalizers.unwind().await
    }
}

/// Scope of a single test
///
/// Always end it with [`TestScope::finish`], including after a failed setup
/// or a failed body, so the test's teardowns run.
pub struct TestScope<'s> {
    session: &'s mut Session,
    state: ScopeState,
    params: Params,
}

impl<'s> TestScope<'s> {
    /// Parameters visible through [`FixtureRequest::param`]
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn request(&mut self) -> FixtureRequest<'_> {
        FixtureRequest::new(
            &self.session.registry,
            &mut self.session.state,
            Some(&mut self.state),
            Some(&self.params),
        )
    }

    /// Resolve the registry's autouse fixtures, in order
    pub async fn setup_autouse(&mut self) -> Result<(), FixtureError> {
        let names = self.session.registry.autouse_names().to_vec();
        let mut req = self.request();
        for name in names {
            req.get_fixture_value(&name).await?;
        }
        Ok(())
    }

    /// Run the test's teardowns, most recent first
    pub async fn finish(self) -> Vec<TeardownFailure> {
        self.state.finalizers.unwind().await
    }
}
