//! Stable test identifiers
//!
//! A test case may carry an idempotent ID, a UUID that survives renames and
//! lets result databases track a test across releases. Parametrized cases
//! may carry one ID per parameter set instead. Every declared ID must be a
//! well-formed UUID and unique across the suite.

use std::collections::HashMap;

use uuid::Uuid;

use crate::suite::TestCase;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectError {
    #[error("{test}: idempotent id {id:?} is not a UUID")]
    InvalidId { test: String, id: String },

    #[error("idempotent id {id} is used by both {first} and {second}")]
    DuplicateId {
        id: String,
        first: String,
        second: String,
    },

    #[error("{0} is registered twice")]
    DuplicateTest(String),
}

/// Every declared ID with the node it belongs to
fn declared_ids(case: &TestCase) -> Vec<(String, &'static str)> {
    let base = case.base_id();
    let mut ids: Vec<(String, &'static str)> = case
        .idempotent_id
        .map(|id| (base.clone(), id))
        .into_iter()
        .collect();
    ids.extend(
        case.params
            .iter()
            .filter_map(|p| p.idempotent_id.map(|id| (format!("{base}[{}]", p.id), id))),
    );
    ids
}

/// Reject malformed and duplicated IDs
pub fn validate(cases: &[TestCase]) -> Result<(), CollectError> {
    let mut seen: HashMap<Uuid, String> = HashMap::new();

    for case in cases {
        for (node, id) in declared_ids(case) {
            let uuid = Uuid::parse_str(id).map_err(|_| CollectError::InvalidId {
                test: node.clone(),
                id: id.to_string(),
            })?;

            if let Some(first) = seen.insert(uuid, node.clone()) {
                return Err(CollectError::DuplicateId {
                    id: id.to_string(),
                    first,
                    second: node,
                });
            }
        }
    }
    Ok(())
}
