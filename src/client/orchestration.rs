use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ClientError, ServiceClient};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub id: String,
    pub stack_name: String,
    #[serde(default)]
    pub stack_status: String,
    #[serde(default)]
    pub stack_status_reason: Option<String>,
}

impl Stack {
    pub fn is_failed(&self) -> bool {
        self.stack_status.ends_with("_FAILED")
    }
}

/// Stack creation request; the template is the raw HOT text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackCreate {
    pub stack_name: String,
    pub template: String,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    pub timeout_mins: u64,
}

#[async_trait]
pub trait OrchestrationApi: Send + Sync {
    /// Returns the new stack's id
    async fn create_stack(&self, request: &StackCreate) -> Result<String, ClientError>;
    /// Looks a stack up by name or id
    async fn get_stack(&self, ident: &str) -> Result<Stack, ClientError>;
    async fn delete_stack(&self, name: &str, id: &str) -> Result<(), ClientError>;
}

/// Heat v1 client
#[derive(Debug, Clone)]
pub struct OrchestrationClient {
    inner: ServiceClient,
}

#[derive(Deserialize)]
struct StackBody {
    stack: Stack,
}

#[derive(Deserialize)]
struct CreatedBody {
    stack: CreatedStack,
}

#[derive(Deserialize)]
struct CreatedStack {
    id: String,
}

impl OrchestrationClient {
    pub fn new(inner: ServiceClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl OrchestrationApi for OrchestrationClient {
    async fn create_stack(&self, request: &StackCreate) -> Result<String, ClientError> {
        let body: CreatedBody = self.inner.post("stacks", request).await?;
        Ok(body.stack.id)
    }

    async fn get_stack(&self, ident: &str) -> Result<Stack, ClientError> {
        // heat answers a bare name with a redirect to stacks/<name>/<id>
        let body: StackBody = self.inner.get(&format!("stacks/{ident}")).await?;
        Ok(body.stack)
    }

    async fn delete_stack(&self, name: &str, id: &str) -> Result<(), ClientError> {
        self.inner.delete(&format!("stacks/{name}/{id}")).await
    }
}
