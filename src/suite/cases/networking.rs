//! Nova keypairs and neutron routers

use futures::future::BoxFuture;

use crate::client::{Keypair, Router};
use crate::fixture::FixtureRequest;
use crate::steps::{check_eq, KeypairSteps, RouterSteps};
use crate::suite::{TestCase, TestResult};

pub(super) fn cases() -> Vec<TestCase> {
    vec![
        TestCase::new("nova", "test_create_keypair", test_create_keypair)
            .mark("nova")
            .idempotent_id("ff21ab97-a31b-4824-b6b4-f72d6320b781"),
        TestCase::new("neutron", "test_create_router", test_create_router)
            .mark("neutron")
            .idempotent_id("207a4e1f-2632-497d-93b3-a3177df86fe3"),
    ]
}

fn test_create_keypair<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> BoxFuture<'a, TestResult> {
    Box::pin(async move {
        let keypair = req.get::<Keypair>("keypair").await?;
        let steps = req.get::<KeypairSteps>("keypair_steps").await?;

        steps.check_keypair_present(&keypair).await?;
        Ok(())
    })
}

fn test_create_router<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> BoxFuture<'a, TestResult> {
    Box::pin(async move {
        let router = req.get::<Router>("router").await?;
        let steps = req.get::<RouterSteps>("router_steps").await?;

        let stored = steps.get_router(&router.id).await?;
        check_eq(
            format!("router/{} status", router.id),
            "ACTIVE",
            stored.status.as_str(),
        )?;
        Ok(())
    })
}
