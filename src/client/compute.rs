use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ClientError, ServiceClient};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    pub name: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub public_key: String,
    /// Only returned when nova generated the key
    #[serde(default)]
    pub private_key: Option<String>,
}

#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn create_keypair(&self, name: &str) -> Result<Keypair, ClientError>;
    async fn get_keypair(&self, name: &str) -> Result<Keypair, ClientError>;
    async fn delete_keypair(&self, name: &str) -> Result<(), ClientError>;
}

/// Nova v2.1 client, keypairs only
#[derive(Debug, Clone)]
pub struct ComputeClient {
    inner: ServiceClient,
}

#[derive(Deserialize)]
struct KeypairBody {
    keypair: Keypair,
}

impl ComputeClient {
    pub fn new(inner: ServiceClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ComputeApi for ComputeClient {
    async fn create_keypair(&self, name: &str) -> Result<Keypair, ClientError> {
        let body: KeypairBody = self
            .inner
            .post("os-keypairs", &json!({ "keypair": { "name": name } }))
            .await?;
        Ok(body.keypair)
    }

    async fn get_keypair(&self, name: &str) -> Result<Keypair, ClientError> {
        let body: KeypairBody = self.inner.get(&format!("os-keypairs/{name}")).await?;
        Ok(body.keypair)
    }

    async fn delete_keypair(&self, name: &str) -> Result<(), ClientError> {
        self.inner.delete(&format!("os-keypairs/{name}")).await
    }
}
