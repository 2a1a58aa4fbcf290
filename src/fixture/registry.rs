use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::{FixtureError, FixtureRequest, FixtureValue, Scope};

/// Setup function of a [`FnFixture`]
pub type SetupFn =
    for<'a, 'b> fn(&'a mut FixtureRequest<'b>) -> BoxFuture<'a, Result<FixtureValue, FixtureError>>;

/// A named provider of a test dependency
///
/// `setup` runs at most once per scope instance. Anything it creates in the
/// cloud must be paired with a finalizer registered through the request
/// before `setup` returns.
#[async_trait]
pub trait Fixture: Send + Sync {
    /// Scope the produced value is cached in
    fn scope(&self) -> Scope {
        Scope::Test
    }

    /// Produce the value, resolving dependencies through `req`
    async fn setup(&self, req: &mut FixtureRequest<'_>) -> Result<FixtureValue, FixtureError>;
}

/// Fixture that hands out a prebuilt value
pub struct ValueFixture {
    value: FixtureValue,
    scope: Scope,
}

impl ValueFixture {
    pub fn new<T: Any + Send + Sync>(value: T, scope: Scope) -> Self {
        Self {
            value: Arc::new(value),
            scope,
        }
    }

    /// Share an existing `Arc` so callers keep pointer identity
    pub fn shared<T: Any + Send + Sync>(value: Arc<T>, scope: Scope) -> Self {
        Self { value, scope }
    }
}

#[async_trait]
impl Fixture for ValueFixture {
    fn scope(&self) -> Scope {
        self.scope
    }

    async fn setup(&self, _req: &mut FixtureRequest<'_>) -> Result<FixtureValue, FixtureError> {
        Ok(self.value.clone())
    }
}

/// Fixture backed by a plain function
pub struct FnFixture {
    scope: Scope,
    setup: SetupFn,
}

impl FnFixture {
    pub fn new(scope: Scope, setup: SetupFn) -> Self {
        Self { scope, setup }
    }
}

#[async_trait]
impl Fixture for FnFixture {
    fn scope(&self) -> Scope {
        self.scope
    }

    async fn setup(&self, req: &mut FixtureRequest<'_>) -> Result<FixtureValue, FixtureError> {
        (self.setup)(req).await
    }
}

/// Explicit name -> fixture mapping
///
/// Autouse fixtures are resolved for every test before its body runs, in
/// registration order.
#[derive(Clone, Default)]
pub struct Registry {
    fixtures: BTreeMap<String, Arc<dyn Fixture>>,
    autouse: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fixture, replacing any previous one with the same name
    pub fn register(&mut self, name: impl Into<String>, fixture: impl Fixture + 'static) -> &mut Self {
        self.fixtures.insert(name.into(), Arc::new(fixture));
        self
    }

    /// Register a constant value
    pub fn value<T: Any + Send + Sync>(
        &mut self,
        name: impl Into<String>,
        value: T,
        scope: Scope,
    ) -> &mut Self {
        self.register(name, ValueFixture::new(value, scope))
    }

    /// Register a function fixture
    pub fn setup_fn(&mut self, name: impl Into<String>, scope: Scope, setup: SetupFn) -> &mut Self {
        self.register(name, FnFixture::new(scope, setup))
    }

    /// Resolve `name` for every test
    pub fn autouse(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.autouse.contains(&name) {
            self.autouse.push(name);
        }
        self
    }

    /// Stop auto-applying `name`; returns whether it was auto-applied
    pub fn disable_autouse(&mut self, name: &str) -> bool {
        let before = self.autouse.len();
        self.autouse.retain(|n| n != name);
        before != self.autouse.len()
    }

    pub fn autouse_names(&self) -> &[String] {
        &self.autouse
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fixtures.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fixtures.keys().map(String::as_str)
    }

    /// Look up a fixture by name
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Fixture>, FixtureError> {
        self.fixtures
            .get(name)
            .cloned()
            .ok_or_else(|| FixtureError::UnknownFixture(name.to_string()))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("fixtures", &self.fixtures.keys().collect::<Vec<_>>())
            .field("autouse", &self.autouse)
            .finish()
    }
}
