use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ClientError, ServiceClient};

/// Microversion sent with every Ironic request; logical node names need >= 1.5
pub const IRONIC_API_VERSION: &str = "1.31";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chassis {
    pub uuid: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub chassis_uuid: Option<String>,
    #[serde(default)]
    pub provision_state: Option<String>,
    #[serde(default)]
    pub power_state: Option<String>,
}

/// Node enrollment request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeCreate {
    pub driver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chassis_uuid: Option<String>,
}

#[async_trait]
pub trait BaremetalApi: Send + Sync {
    async fn create_chassis(&self, description: Option<&str>) -> Result<Chassis, ClientError>;
    async fn get_chassis(&self, uuid: &str) -> Result<Chassis, ClientError>;
    async fn delete_chassis(&self, uuid: &str) -> Result<(), ClientError>;
    async fn create_node(&self, request: &NodeCreate) -> Result<Node, ClientError>;
    /// Look a node up by UUID or by name
    async fn get_node(&self, ident: &str) -> Result<Node, ClientError>;
    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError>;
    async fn delete_node(&self, ident: &str) -> Result<(), ClientError>;
}

/// Ironic v1 client
#[derive(Debug, Clone)]
pub struct BaremetalClient {
    inner: ServiceClient,
    prefix: &'static str,
}

#[derive(Deserialize)]
struct NodesBody {
    nodes: Vec<Node>,
}

impl BaremetalClient {
    pub fn new(inner: ServiceClient) -> Self {
        // catalogs list ironic both with and without the version suffix
        let prefix = if inner.endpoint().ends_with("/v1") {
            ""
        } else {
            "v1/"
        };
        Self {
            inner: inner.with_header("X-OpenStack-Ironic-API-Version", IRONIC_API_VERSION),
            prefix,
        }
    }

    fn path(&self, rest: &str) -> String {
        format!("{}{}", self.prefix, rest)
    }
}

#[async_trait]
impl BaremetalApi for BaremetalClient {
    async fn create_chassis(&self, description: Option<&str>) -> Result<Chassis, ClientError> {
        self.inner
            .post(&self.path("chassis"), &json!({ "description": description }))
            .await
    }

    async fn get_chassis(&self, uuid: &str) -> Result<Chassis, ClientError> {
        self.inner.get(&self.path(&format!("chassis/{uuid}"))).await
    }

    async fn delete_chassis(&self, uuid: &str) -> Result<(), ClientError> {
        self.inner.delete(&self.path(&format!("chassis/{uuid}"))).await
    }

    async fn create_node(&self, request: &NodeCreate) -> Result<Node, ClientError> {
        self.inner.post(&self.path("nodes"), request).await
    }

    async fn get_node(&self, ident: &str) -> Result<Node, ClientError> {
        self.inner.get(&self.path(&format!("nodes/{ident}"))).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError> {
        let body: NodesBody = self
            .inner
            .get_query(&self.path("nodes"), &[("detail", "true")])
            .await?;
        Ok(body.nodes)
    }

    async fn delete_node(&self, ident: &str) -> Result<(), ClientError> {
        self.inner.delete(&self.path(&format!("nodes/{ident}"))).await
    }
}
