//! Test case registry and collection
//!
//! A [`TestCase`] is a named async body plus marks, an optional idempotent ID
//! and optional parameter sets. Collection expands parameter sets (including
//! per-role sets) into one [`CollectedTest`] each, after validating IDs.

mod cases;
mod fixtures;
mod roles;

pub use fixtures::{registry_from_env, standard_registry, ProjectContext, RoleSession};
pub use roles::Role;

use futures::future::BoxFuture;
use serde_json::json;

use crate::fixture::{BoxError, FixtureRequest, Params};
use crate::plugins::{idempotent, CollectError};

/// Outcome of a test body
pub type TestResult = Result<(), BoxError>;

/// A test body: resolves what it needs through the request
pub type TestBody = for<'a, 'b> fn(&'a mut FixtureRequest<'b>) -> BoxFuture<'a, TestResult>;

/// One parameter set of a parametrized case
#[derive(Debug, Clone)]
pub struct ParamSet {
    /// Shown in brackets after the case name
    pub id: String,
    pub values: Params,
    pub idempotent_id: Option<&'static str>,
}

/// A registered test case
#[derive(Clone)]
pub struct TestCase {
    /// Group the case belongs to; usually the service under test
    pub module: &'static str,
    pub name: &'static str,
    pub marks: Vec<&'static str>,
    pub idempotent_id: Option<&'static str>,
    pub params: Vec<ParamSet>,
    pub body: TestBody,
}

impl TestCase {
    pub fn new(module: &'static str, name: &'static str, body: TestBody) -> Self {
        Self {
            module,
            name,
            marks: Vec::new(),
            idempotent_id: None,
            params: Vec::new(),
            body,
        }
    }

    #[must_use]
    pub fn mark(mut self, mark: &'static str) -> Self {
        self.marks.push(mark);
        self
    }

    #[must_use]
    pub fn idempotent_id(mut self, id: &'static str) -> Self {
        self.idempotent_id = Some(id);
        self
    }

    /// Add a parameter set; `values` must be a JSON object
    #[must_use]
    pub fn parametrize(
        mut self,
        id: impl Into<String>,
        values: serde_json::Value,
        idempotent_id: Option<&'static str>,
    ) -> Self {
        let values = match values {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => Params::new(),
            other => {
                let mut map = Params::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        self.params.push(ParamSet {
            id: id.into(),
            values,
            idempotent_id,
        });
        self
    }

    /// One parameter set per role, each with its own ID; the body reads `role`
    #[must_use]
    pub fn per_role(self, roles: &[(Role, &'static str)]) -> Self {
        roles.iter().fold(self, |case, (role, id)| {
            case.parametrize(role.as_str(), json!({ "role": role }), Some(*id))
        })
    }

    /// `module::name`
    pub fn base_id(&self) -> String {
        format!("{}::{}", self.module, self.name)
    }

    fn expand(&self) -> Vec<CollectedTest> {
        let collected = |param: Option<&ParamSet>| CollectedTest {
            node_id: match param {
                Some(p) => format!("{}[{}]", self.base_id(), p.id),
                None => self.base_id(),
            },
            module: self.module,
            name: self.name,
            param_id: param.map(|p| p.id.clone()),
            marks: self.marks.iter().map(|m| m.to_string()).collect(),
            idempotent_id: param
                .and_then(|p| p.idempotent_id)
                .or(self.idempotent_id)
                .map(str::to_string),
            params: param.map(|p| p.values.clone()).unwrap_or_default(),
            body: self.body,
        };

        if self.params.is_empty() {
            vec![collected(None)]
        } else {
            self.params.iter().map(|p| collected(Some(p))).collect()
        }
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("id", &self.base_id())
            .field("marks", &self.marks)
            .field("params", &self.params.len())
            .finish_non_exhaustive()
    }
}

/// A runnable test instance
#[derive(Clone)]
pub struct CollectedTest {
    /// `module::name` or `module::name[param]`
    pub node_id: String,
    pub module: &'static str,
    pub name: &'static str,
    pub param_id: Option<String>,
    pub marks: Vec<String>,
    pub idempotent_id: Option<String>,
    pub params: Params,
    pub body: TestBody,
}

impl CollectedTest {
    /// Everything a keyword expression can match
    pub fn keywords(&self) -> Vec<String> {
        let mut keywords = vec![
            self.node_id.clone(),
            self.module.to_string(),
            self.name.to_string(),
        ];
        keywords.extend(self.marks.iter().cloned());
        keywords.extend(self.param_id.iter().cloned());
        keywords.extend(self.idempotent_id.iter().cloned());
        keywords
    }
}

impl std::fmt::Debug for CollectedTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectedTest")
            .field("node_id", &self.node_id)
            .field("idempotent_id", &self.idempotent_id)
            .finish_non_exhaustive()
    }
}

/// Ordered set of test cases
#[derive(Debug, Clone, Default)]
pub struct Suite {
    cases: Vec<TestCase>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cloud validation cases shipped with stepler
    pub fn standard() -> Self {
        cases::all().into_iter().fold(Self::new(), Self::with_case)
    }

    #[must_use]
    pub fn with_case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Validate IDs and expand parameter sets, in registration order
    pub fn collect(&self) -> Result<Vec<CollectedTest>, CollectError> {
        idempotent::validate(&self.cases)?;

        let mut seen = std::collections::HashSet::new();
        let mut tests = Vec::new();
        for case in &self.cases {
            for test in case.expand() {
                if !seen.insert(test.node_id.clone()) {
                    return Err(CollectError::DuplicateTest(test.node_id));
                }
                tests.push(test);
            }
        }
        Ok(tests)
    }
}

#[cfg(test)]
pub(crate) fn noop_body<'a, 'b>(_req: &'a mut FixtureRequest<'b>) -> BoxFuture<'a, TestResult> {
    Box::pin(async { Ok(()) })
}
