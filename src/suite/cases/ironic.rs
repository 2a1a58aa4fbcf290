use futures::future::BoxFuture;

use crate::fixture::FixtureRequest;
use crate::steps::{check_eq, unique_name, BaremetalSteps, NodeSpec};
use crate::suite::{TestCase, TestResult};

pub(super) fn cases() -> Vec<TestCase> {
    vec![
        TestCase::new("ironic", "test_create_chassis", test_create_chassis)
            .mark("ironic")
            .idempotent_id("8354199a-10aa-404f-ac81-a5fdd7eaa66d"),
        TestCase::new(
            "ironic",
            "test_create_node_with_dot_in_name",
            test_create_node_with_dot_in_name,
        )
        .mark("ironic")
        .idempotent_id("c074b629-9136-4dc8-99b7-36c3ce137b83"),
    ]
}

fn test_create_chassis<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> BoxFuture<'a, TestResult> {
    Box::pin(async move {
        let steps = req.get::<BaremetalSteps>("baremetal_steps").await?;
        let description = unique_name("stepler-chassis");

        let chassis = steps.create_chassis(Some(&description)).await?;

        steps.check_chassis_description(&chassis, &description).await?;
        Ok(())
    })
}

fn test_create_node_with_dot_in_name<'a, 'b>(
    req: &'a mut FixtureRequest<'b>,
) -> BoxFuture<'a, TestResult> {
    Box::pin(async move {
        let steps = req.get::<BaremetalSteps>("baremetal_steps").await?;
        let name = format!("{}.dot", unique_name("stepler-node"));

        let node = steps.create_node(NodeSpec::new().name(&name)).await?;

        let fetched = steps.get_node(&name).await?;
        check_eq("node looked up by name", node.uuid.as_str(), fetched.uuid.as_str())?;
        steps.check_node_present(&node, &name).await?;
        Ok(())
    })
}
