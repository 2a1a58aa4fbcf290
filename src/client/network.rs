use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ClientError, ServiceClient};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default = "up")]
    pub admin_state_up: bool,
}

fn up() -> bool {
    true
}

#[async_trait]
pub trait NetworkApi: Send + Sync {
    async fn create_router(&self, name: &str) -> Result<Router, ClientError>;
    async fn get_router(&self, id: &str) -> Result<Router, ClientError>;
    async fn delete_router(&self, id: &str) -> Result<(), ClientError>;
}

/// Neutron v2.0 client, routers only
#[derive(Debug, Clone)]
pub struct NetworkClient {
    inner: ServiceClient,
}

#[derive(Deserialize)]
struct RouterBody {
    router: Router,
}

impl NetworkClient {
    pub fn new(inner: ServiceClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl NetworkApi for NetworkClient {
    async fn create_router(&self, name: &str) -> Result<Router, ClientError> {
        let body: RouterBody = self
            .inner
            .post(
                "v2.0/routers",
                &json!({ "router": { "name": name, "admin_state_up": true } }),
            )
            .await?;
        Ok(body.router)
    }

    async fn get_router(&self, id: &str) -> Result<Router, ClientError> {
        let body: RouterBody = self.inner.get(&format!("v2.0/routers/{id}")).await?;
        Ok(body.router)
    }

    async fn delete_router(&self, id: &str) -> Result<(), ClientError> {
        self.inner.delete(&format!("v2.0/routers/{id}")).await
    }
}
