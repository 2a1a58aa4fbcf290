use std::sync::Arc;

use tracing::{info, instrument};

use super::{check_eq, ignore_not_found, unique_name, StepError};
use crate::client::{BaremetalApi, Chassis, Node, NodeCreate};
use crate::config::{Timeouts, WaitPolicy};
use crate::fixture::Finalizers;
use crate::wait::{until, Probe};

/// Driver used for nodes that must never touch real hardware
pub const FAKE_DRIVER: &str = "fake-hardware";

/// Parameters of a node to enroll
#[derive(Debug, Clone)]
pub struct NodeSpec {
    name: Option<String>,
    driver: String,
    chassis_uuid: Option<String>,
    cleanup: bool,
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            name: None,
            driver: FAKE_DRIVER.to_string(),
            chassis_uuid: None,
            cleanup: true,
        }
    }
}

impl NodeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    #[must_use]
    pub fn chassis(mut self, chassis: &Chassis) -> Self {
        self.chassis_uuid = Some(chassis.uuid.clone());
        self
    }

    #[must_use]
    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }
}

/// Ironic chassis and node steps
#[derive(Clone)]
pub struct BaremetalSteps {
    api: Arc<dyn BaremetalApi>,
    finalizers: Finalizers,
    timeouts: Timeouts,
}

impl BaremetalSteps {
    pub fn new(api: Arc<dyn BaremetalApi>, finalizers: Finalizers, timeouts: Timeouts) -> Self {
        Self {
            api,
            finalizers,
            timeouts,
        }
    }

    #[instrument(skip(self))]
    pub async fn create_chassis(&self, description: Option<&str>) -> Result<Chassis, StepError> {
        let chassis = self.api.create_chassis(description).await?;
        info!(uuid = %chassis.uuid, "Created chassis");

        let api = self.api.clone();
        let uuid = chassis.uuid.clone();
        self.finalizers
            .push(format!("delete chassis {uuid}"), move || async move {
                ignore_not_found(api.delete_chassis(&uuid).await)
            });

        Ok(chassis)
    }

    pub async fn get_chassis(&self, uuid: &str) -> Result<Chassis, StepError> {
        Ok(self.api.get_chassis(uuid).await?)
    }

    pub async fn delete_chassis(&self, chassis: &Chassis) -> Result<(), StepError> {
        self.api.delete_chassis(&chassis.uuid).await?;
        info!(uuid = %chassis.uuid, "Deleted chassis");
        Ok(())
    }

    /// Fail unless the stored chassis carries `expected` as description
    pub async fn check_chassis_description(
        &self,
        chassis: &Chassis,
        expected: &str,
    ) -> Result<(), StepError> {
        let stored = self.api.get_chassis(&chassis.uuid).await?;
        check_eq(
            format!("chassis/{} description", chassis.uuid),
            expected,
            stored.description.as_deref().unwrap_or("<none>"),
        )
    }

    /// Enroll a node; the name is kept verbatim, dots included
    #[instrument(skip(self, spec), fields(name = ?spec.name))]
    pub async fn create_node(&self, spec: NodeSpec) -> Result<Node, StepError> {
        let request = NodeCreate {
            driver: spec.driver,
            name: Some(spec.name.unwrap_or_else(|| unique_name("stepler-node"))),
            chassis_uuid: spec.chassis_uuid,
        };
        let node = self.api.create_node(&request).await?;
        info!(uuid = %node.uuid, "Created node");

        if spec.cleanup {
            let api = self.api.clone();
            let uuid = node.uuid.clone();
            let policy = self.timeouts.node_deleted;
            self.finalizers
                .push(format!("delete node {uuid}"), move || async move {
                    delete_node_and_wait(api.as_ref(), &uuid, policy).await
                });
        }

        Ok(node)
    }

    /// Look a node up by UUID or name
    pub async fn get_node(&self, ident: &str) -> Result<Node, StepError> {
        Ok(self.api.get_node(ident).await?)
    }

    pub async fn list_nodes(&self) -> Result<Vec<Node>, StepError> {
        Ok(self.api.list_nodes().await?)
    }

    pub async fn delete_node(&self, node: &Node) -> Result<(), StepError> {
        delete_node_and_wait(self.api.as_ref(), &node.uuid, self.timeouts.node_deleted).await
    }

    /// Fail unless a node named `name` exists and is `node`
    pub async fn check_node_present(&self, node: &Node, name: &str) -> Result<(), StepError> {
        let nodes = self.api.list_nodes().await?;
        let found = nodes.iter().find(|n| n.name.as_deref() == Some(name));
        check_eq(
            format!("node named {name}"),
            node.uuid.as_str(),
            found.map_or("<missing>", |n| n.uuid.as_str()),
        )
    }
}

async fn delete_node_and_wait(
    api: &dyn BaremetalApi,
    uuid: &str,
    policy: WaitPolicy,
) -> Result<(), StepError> {
    ignore_not_found(api.delete_node(uuid).await)?;

    until(format!("node/{uuid}"), || async move {
        match api.get_node(uuid).await {
            Ok(node) => Ok(Probe::Pending(format!(
                "provision_state={}",
                node.provision_state.as_deref().unwrap_or("unknown")
            ))),
            Err(e) if e.is_not_found() => Ok(Probe::Ready(())),
            Err(e) => Err(StepError::from(e)),
        }
    })
    .policy(policy)
    .ready()
    .await?;

    info!(uuid, "Node deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeBaremetal;
    use crate::fixture::Scope;
    use crate::steps::fast_timeouts;

    fn steps() -> (BaremetalSteps, Arc<FakeBaremetal>, Finalizers) {
        let fake = Arc::new(FakeBaremetal::default());
        let finalizers = Finalizers::new(Scope::Test);
        let steps = BaremetalSteps::new(fake.clone(), finalizers.clone(), fast_timeouts());
        (steps, fake, finalizers)
    }

    #[tokio::test]
    async fn test_chassis_with_description() {
        let (steps, fake, finalizers) = steps();

        let chassis = steps.create_chassis(Some("rack 7")).await.unwrap();
        steps
            .check_chassis_description(&chassis, "rack 7")
            .await
            .unwrap();
        let err = steps
            .check_chassis_description(&chassis, "rack 8")
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::AssertionMismatch { .. }));

        assert!(finalizers.unwind().await.is_empty());
        assert_eq!(fake.chassis_count(), 0);
    }

    #[tokio::test]
    async fn test_node_with_dot_in_name() {
        let (steps, fake, finalizers) = steps();
        let name = format!("{}.example.com", unique_name("node"));

        let node = steps.create_node(NodeSpec::new().name(&name)).await.unwrap();
        let fetched = steps.get_node(&name).await.unwrap();

        assert_eq!(fetched.uuid, node.uuid);
        assert_eq!(fetched.driver, FAKE_DRIVER);
        steps.check_node_present(&node, &name).await.unwrap();

        finalizers.unwind().await;
        assert_eq!(fake.node_count(), 0);
    }

    #[tokio::test]
    async fn test_node_teardown_runs_before_chassis_teardown() {
        let (steps, fake, finalizers) = steps();

        let chassis = steps.create_chassis(None).await.unwrap();
        steps
            .create_node(NodeSpec::new().chassis(&chassis))
            .await
            .unwrap();

        // ironic refuses to delete a chassis that still has nodes
        assert!(finalizers.unwind().await.is_empty());
        assert_eq!((fake.node_count(), fake.chassis_count()), (0, 0));
    }

    #[tokio::test]
    async fn test_explicit_node_delete() {
        let (steps, _fake, finalizers) = steps();
        let node = steps.create_node(NodeSpec::new()).await.unwrap();

        steps.delete_node(&node).await.unwrap();
        let err = steps.get_node(&node.uuid).await.unwrap_err();
        assert!(err.client_error().unwrap().is_not_found());
        assert!(finalizers.unwind().await.is_empty());
    }
}
