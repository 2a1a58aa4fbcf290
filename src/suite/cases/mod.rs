//! Cases shipped with stepler, grouped by the service they exercise

mod cinder;
mod heat;
mod ironic;
mod keystone;
mod networking;

use super::TestCase;

pub(super) fn all() -> Vec<TestCase> {
    [
        ironic::cases(),
        cinder::cases(),
        keystone::cases(),
        heat::cases(),
        networking::cases(),
    ]
    .into_iter()
    .flatten()
    .collect()
}
