use std::sync::Arc;

use tracing::{info, instrument};

use super::{ignore_not_found, StepError};
use crate::client::{NetworkApi, Router};
use crate::config::Timeouts;
use crate::fixture::Finalizers;
use crate::wait::{until, Probe};

/// Neutron router steps
#[derive(Clone)]
pub struct RouterSteps {
    api: Arc<dyn NetworkApi>,
    finalizers: Finalizers,
    timeouts: Timeouts,
}

impl RouterSteps {
    pub fn new(api: Arc<dyn NetworkApi>, finalizers: Finalizers, timeouts: Timeouts) -> Self {
        Self {
            api,
            finalizers,
            timeouts,
        }
    }

    /// Create a router and wait for it to become ACTIVE
    #[instrument(skip(self))]
    pub async fn create_router(&self, name: &str) -> Result<Router, StepError> {
        let router = self.api.create_router(name).await?;
        info!(id = %router.id, "Created router");

        let api = self.api.clone();
        let id = router.id.clone();
        self.finalizers
            .push(format!("delete router {id}"), move || async move {
                ignore_not_found(api.delete_router(&id).await)
            });

        let api = self.api.as_ref();
        let id = router.id.as_str();
        until(format!("router/{id}"), || async move {
            let router = api.get_router(id).await?;
            let state = format!("status={}", router.status);
            Ok::<_, StepError>(Probe::when(router.status == "ACTIVE", router, state))
        })
        .policy(self.timeouts.router_active)
        .ready()
        .await
    }

    pub async fn get_router(&self, id: &str) -> Result<Router, StepError> {
        Ok(self.api.get_router(id).await?)
    }

    pub async fn delete_router(&self, router: &Router) -> Result<(), StepError> {
        Ok(self.api.delete_router(&router.id).await?)
    }
}
