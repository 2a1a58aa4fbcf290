use std::sync::Arc;

use tracing::{info, instrument};

use super::{check_eq, ignore_not_found, unique_name, StepError};
use crate::client::{Volume, VolumeApi, VolumeCreate};
use crate::config::{Timeouts, WaitPolicy};
use crate::fixture::Finalizers;
use crate::wait::{until, Probe};

/// Parameters of a volume to create
#[derive(Debug, Clone)]
pub struct VolumeSpec {
    name: Option<String>,
    size: u64,
    description: Option<String>,
    volume_type: Option<String>,
    cleanup: bool,
}

impl Default for VolumeSpec {
    fn default() -> Self {
        Self {
            name: None,
            size: 1,
            description: None,
            volume_type: None,
            cleanup: true,
        }
    }
}

impl VolumeSpec {
    /// 1 GiB volume with a generated name
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Size in GiB
    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn volume_type(mut self, volume_type: impl Into<String>) -> Self {
        self.volume_type = Some(volume_type.into());
        self
    }

    /// Whether deletion is registered with the scope (default true)
    #[must_use]
    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }
}

/// Cinder volume steps
#[derive(Clone)]
pub struct VolumeSteps {
    api: Arc<dyn VolumeApi>,
    finalizers: Finalizers,
    timeouts: Timeouts,
}

impl VolumeSteps {
    pub fn new(api: Arc<dyn VolumeApi>, finalizers: Finalizers, timeouts: Timeouts) -> Self {
        Self {
            api,
            finalizers,
            timeouts,
        }
    }

    /// Create a volume and wait until it is `available`
    #[instrument(skip(self, spec), fields(size = spec.size))]
    pub async fn create_volume(&self, spec: VolumeSpec) -> Result<Volume, StepError> {
        let request = VolumeCreate {
            size: spec.size,
            name: Some(spec.name.unwrap_or_else(|| unique_name("stepler-volume"))),
            description: spec.description,
            volume_type: spec.volume_type,
        };
        let volume = self.api.create_volume(&request).await?;
        info!(id = %volume.id, name = ?volume.name, "Created volume");

        if spec.cleanup {
            let api = self.api.clone();
            let id = volume.id.clone();
            let policy = self.timeouts.volume_deleted;
            self.finalizers
                .push(format!("delete volume {id}"), move || async move {
                    delete_and_wait(api.as_ref(), &id, policy).await
                });
        }

        self.wait_volume_status(&volume.id, "available", self.timeouts.volume_available)
            .await
    }

    pub async fn get_volume(&self, id: &str) -> Result<Volume, StepError> {
        Ok(self.api.get_volume(id).await?)
    }

    pub async fn list_volumes(&self) -> Result<Vec<Volume>, StepError> {
        Ok(self.api.list_volumes().await?)
    }

    /// Volume with exactly this name, if any
    pub async fn find_volume(&self, name: &str) -> Result<Option<Volume>, StepError> {
        Ok(self
            .api
            .list_volumes()
            .await?
            .into_iter()
            .find(|v| v.name.as_deref() == Some(name)))
    }

    /// Delete and wait until the volume is gone
    #[instrument(skip(self, volume), fields(id = %volume.id))]
    pub async fn delete_volume(&self, volume: &Volume) -> Result<(), StepError> {
        delete_and_wait(self.api.as_ref(), &volume.id, self.timeouts.volume_deleted).await
    }

    /// Poll until the volume reports `status`; an `error` status fails fast
    pub async fn wait_volume_status(
        &self,
        id: &str,
        status: &str,
        policy: WaitPolicy,
    ) -> Result<Volume, StepError> {
        let api = self.api.as_ref();
        until(format!("volume/{id}"), || async move {
            let volume = api.get_volume(id).await?;
            if volume.status == "error" && status != "error" {
                return Err(StepError::mismatch(
                    format!("volume/{id} status"),
                    status,
                    &volume.status,
                ));
            }
            let state = format!("status={}", volume.status);
            Ok(Probe::when(volume.status == status, volume, state))
        })
        .policy(policy)
        .ready()
        .await
    }

    /// Request a new size
    ///
    /// With `check`, wait for the volume to settle and verify the size.
    #[instrument(skip(self, volume), fields(id = %volume.id, from = volume.size))]
    pub async fn extend_volume(
        &self,
        volume: &Volume,
        new_size: u64,
        check: bool,
    ) -> Result<(), StepError> {
        self.api.extend_volume(&volume.id, new_size).await?;
        info!(new_size, "Extend requested");

        if check {
            let settled = self
                .wait_volume_status(&volume.id, "available", self.timeouts.volume_extended)
                .await?;
            check_eq(format!("volume/{} size", volume.id), new_size, settled.size)?;
        }
        Ok(())
    }

    /// Fail unless the volume currently has `expected` GiB
    pub async fn check_volume_size(&self, id: &str, expected: u64) -> Result<Volume, StepError> {
        let volume = self.api.get_volume(id).await?;
        check_eq(format!("volume/{id} size"), expected, volume.size)?;
        Ok(volume)
    }
}

async fn delete_and_wait(api: &dyn VolumeApi, id: &str, policy: WaitPolicy) -> Result<(), StepError> {
    ignore_not_found(api.delete_volume(id).await)?;

    until(format!("volume/{id}"), || async move {
        match api.get_volume(id).await {
            Ok(volume) => Ok(Probe::Pending(format!("status={}", volume.status))),
            Err(e) if e.is_not_found() => Ok(Probe::Ready(())),
            Err(e) => Err(StepError::from(e)),
        }
    })
    .policy(policy)
    .ready()
    .await?;

    info!(id, "Volume deleted");
    Ok(())
}
