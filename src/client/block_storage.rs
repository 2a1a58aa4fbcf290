use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ClientError, ServiceClient};

/// Cinder volume as observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub size: u64,
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Volume creation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeCreate {
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
}

#[async_trait]
pub trait VolumeApi: Send + Sync {
    async fn create_volume(&self, request: &VolumeCreate) -> Result<Volume, ClientError>;
    async fn get_volume(&self, id: &str) -> Result<Volume, ClientError>;
    async fn list_volumes(&self) -> Result<Vec<Volume>, ClientError>;
    async fn delete_volume(&self, id: &str) -> Result<(), ClientError>;
    /// Accepted asynchronously; the size changes once the volume is back to `available`
    async fn extend_volume(&self, id: &str, new_size: u64) -> Result<(), ClientError>;
}

/// Cinder v3 client
#[derive(Debug, Clone)]
pub struct BlockStorageClient {
    inner: ServiceClient,
}

#[derive(Deserialize)]
struct VolumeBody {
    volume: Volume,
}

#[derive(Deserialize)]
struct VolumesBody {
    volumes: Vec<Volume>,
}

impl BlockStorageClient {
    pub fn new(inner: ServiceClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl VolumeApi for BlockStorageClient {
    async fn create_volume(&self, request: &VolumeCreate) -> Result<Volume, ClientError> {
        let body: VolumeBody = self
            .inner
            .post("volumes", &json!({ "volume": request }))
            .await?;
        Ok(body.volume)
    }

    async fn get_volume(&self, id: &str) -> Result<Volume, ClientError> {
        let body: VolumeBody = self.inner.get(&format!("volumes/{id}")).await?;
        Ok(body.volume)
    }

    async fn list_volumes(&self) -> Result<Vec<Volume>, ClientError> {
        let body: VolumesBody = self.inner.get("volumes/detail").await?;
        Ok(body.volumes)
    }

    async fn delete_volume(&self, id: &str) -> Result<(), ClientError> {
        self.inner.delete(&format!("volumes/{id}")).await
    }

    async fn extend_volume(&self, id: &str, new_size: u64) -> Result<(), ClientError> {
        self.inner
            .post_accepted(
                &format!("volumes/{id}/action"),
                &json!({ "os-extend": { "new_size": new_size } }),
            )
            .await
    }
}
