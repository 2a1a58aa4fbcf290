use std::sync::Arc;

use tracing::{info, instrument};

use super::{check_eq, ignore_not_found, StepError};
use crate::client::{ComputeApi, Keypair};
use crate::fixture::Finalizers;

/// Nova keypair steps
#[derive(Clone)]
pub struct KeypairSteps {
    api: Arc<dyn ComputeApi>,
    finalizers: Finalizers,
}

impl KeypairSteps {
    pub fn new(api: Arc<dyn ComputeApi>, finalizers: Finalizers) -> Self {
        Self { api, finalizers }
    }

    /// Let nova generate a keypair; the private key is only in this response
    #[instrument(skip(self))]
    pub async fn create_keypair(&self, name: &str) -> Result<Keypair, StepError> {
        let keypair = self.api.create_keypair(name).await?;
        info!(fingerprint = %keypair.fingerprint, "Created keypair");

        let api = self.api.clone();
        let name = keypair.name.clone();
        self.finalizers
            .push(format!("delete keypair {name}"), move || async move {
                ignore_not_found(api.delete_keypair(&name).await)
            });

        Ok(keypair)
    }

    pub async fn get_keypair(&self, name: &str) -> Result<Keypair, StepError> {
        Ok(self.api.get_keypair(name).await?)
    }

    pub async fn delete_keypair(&self, keypair: &Keypair) -> Result<(), StepError> {
        Ok(self.api.delete_keypair(&keypair.name).await?)
    }

    /// Fail unless nova returns the keypair with the same fingerprint
    pub async fn check_keypair_present(&self, keypair: &Keypair) -> Result<(), StepError> {
        let stored = self.api.get_keypair(&keypair.name).await?;
        check_eq(
            format!("keypair/{} fingerprint", keypair.name),
            &keypair.fingerprint,
            &stored.fingerprint,
        )
    }
}
