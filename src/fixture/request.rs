use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::scope::ScopeState;
use super::{BoxError, Finalizers, FixtureError, FixtureValue, Params, Registry, Scope};

/// Resolution context handed to fixtures and test bodies
///
/// Holds the active scopes and the stack of fixtures currently being set up,
/// which is how cycles and scope violations are detected.
pub struct FixtureRequest<'a> {
    registry: &'a Registry,
    session: &'a mut ScopeState,
    test: Option<&'a mut ScopeState>,
    params: Option<&'a Params>,
    resolving: Vec<(String, Scope)>,
}

impl<'a> FixtureRequest<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        session: &'a mut ScopeState,
        test: Option<&'a mut ScopeState>,
        params: Option<&'a Params>,
    ) -> Self {
        Self {
            registry,
            session,
            test,
            params,
            resolving: Vec::new(),
        }
    }

    /// Resolve a fixture and downcast it
    ///
    /// Within one scope instance every call returns the same `Arc`.
    pub async fn get<T: Any + Send + Sync>(&mut self, name: &str) -> Result<Arc<T>, FixtureError> {
        self.get_fixture_value(name)
            .await?
            .downcast::<T>()
            .map_err(|_| FixtureError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Resolve a fixture chosen at runtime, without downcasting
    pub async fn get_fixture_value(&mut self, name: &str) -> Result<FixtureValue, FixtureError> {
        if self.resolving.iter().any(|(n, _)| n == name) {
            let mut chain: Vec<String> = self.resolving.iter().map(|(n, _)| n.clone()).collect();
            chain.push(name.to_string());
            return Err(FixtureError::CircularDependency { chain });
        }

        let fixture = self.registry.lookup(name)?;
        let scope = fixture.scope();

        // a wider-scoped fixture must not capture a narrower-scoped value
        if let Some((requester, requester_scope)) =
            self.resolving.iter().rev().find(|(_, s)| *s > scope)
        {
            return Err(FixtureError::ScopeMismatch {
                requested: name.to_string(),
                requested_scope: scope,
                requester: format!("{requester_scope}-scoped fixture '{requester}'"),
            });
        }

        if let Some(value) = self.state(name, scope)?.cache.get(name) {
            return Ok(value.clone());
        }

        debug!(fixture = %name, %scope, "Setting up fixture");
        self.resolving.push((name.to_string(), scope));
        let produced = fixture.setup(self).await;
        self.resolving.pop();

        let value = match produced {
            Ok(value) => value,
            Err(FixtureError::Failed(source)) => {
                return Err(FixtureError::SetupFailed {
                    fixture: name.to_string(),
                    source,
                })
            }
            Err(other) => return Err(other),
        };

        self.state(name, scope)?
            .cache
            .insert(name.to_string(), value.clone());
        debug!(fixture = %name, %scope, "Fixture ready");

        Ok(value)
    }

    /// Deserialize a parameter of the running test
    pub fn param<T: DeserializeOwned>(&self, key: &str) -> Result<T, FixtureError> {
        self.params
            .and_then(|p| p.get(key))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .ok_or_else(|| FixtureError::MissingParam(key.to_string()))
    }

    /// Parameters of the running test (empty outside a test)
    pub fn params(&self) -> Params {
        self.params.cloned().unwrap_or_default()
    }

    /// Scope new teardowns land in: the fixture being set up, else the test
    pub fn current_scope(&self) -> Scope {
        match self.resolving.last() {
            Some((_, scope)) => *scope,
            None if self.test.is_some() => Scope::Test,
            None => Scope::Session,
        }
    }

    /// Teardown stack of [`Self::current_scope`]
    pub fn finalizers(&self) -> Finalizers {
        match (self.current_scope(), &self.test) {
            (Scope::Test, Some(test)) => test.finalizers.clone(),
            _ => self.session.finalizers.clone(),
        }
    }

    /// Register a teardown in the current scope
    pub fn add_finalizer<F, Fut, E>(&self, label: impl Into<String>, teardown: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.finalizers().push(label, teardown);
    }

    fn state(&mut self, name: &str, scope: Scope) -> Result<&mut ScopeState, FixtureError> {
        match scope {
            Scope::Session => Ok(&mut *self.session),
            Scope::Test => self
                .test
                .as_deref_mut()
                .ok_or_else(|| FixtureError::ScopeMismatch {
                    requested: name.to_string(),
                    requested_scope: Scope::Test,
                    requester: "outside of a test".to_string(),
                }),
        }
    }
}
