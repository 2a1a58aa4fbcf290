use futures::future::BoxFuture;
use serde_json::json;

use crate::client::Volume;
use crate::fixture::FixtureRequest;
use crate::steps::{check_eq, unique_name, CliSteps, StepError, VolumeSpec, VolumeSteps};
use crate::suite::{TestCase, TestResult};

const EXTEND_REJECTED: &str = "New size for extend must be greater than current size";

pub(super) fn cases() -> Vec<TestCase> {
    vec![
        TestCase::new("cinder", "test_negative_volume_extend", test_negative_volume_extend)
            .mark("cinder")
            .parametrize(
                "smaller",
                json!({ "new_size": 1 }),
                Some("06aed8eb-c206-4ff8-bfa8-dbb355fcdd05"),
            )
            .parametrize(
                "equal",
                json!({ "new_size": 2 }),
                Some("83c93697-b879-47c9-ab2b-cd8a6b09bb05"),
            ),
        TestCase::new(
            "cinder",
            "test_create_volume_with_dot_in_name",
            test_create_volume_with_dot_in_name,
        )
        .mark("cinder")
        .idempotent_id("3285bdda-8b4d-4c4e-945a-14b71c560151"),
        TestCase::new(
            "cinder",
            "test_volume_list_contains_created",
            test_volume_list_contains_created,
        )
        .mark("cinder")
        .mark("cli")
        .idempotent_id("952f34c4-cd31-4c2c-9bb5-e7adf59b86c2"),
    ]
}

/// Extending a 2 GiB volume to `new_size` (not larger) is refused
fn test_negative_volume_extend<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> BoxFuture<'a, TestResult> {
    Box::pin(async move {
        let new_size: u64 = req.param("new_size")?;
        let steps = req.get::<VolumeSteps>("volume_steps").await?;
        let volume = steps.create_volume(VolumeSpec::new().size(2)).await?;

        let outcome = steps.extend_volume(&volume, new_size, false).await;

        check_extend_rejected(&volume, new_size, outcome)?;
        steps.check_volume_size(&volume.id, volume.size).await?;
        Ok(())
    })
}

fn check_extend_rejected(
    volume: &Volume,
    new_size: u64,
    outcome: Result<(), StepError>,
) -> Result<(), StepError> {
    let subject = format!("extend volume/{} to {new_size} GiB", volume.id);
    let err = match outcome {
        Ok(()) => return Err(StepError::mismatch(subject, "HTTP 400", "accepted")),
        Err(e) => e,
    };
    let Some(client_err) = err.client_error() else {
        return Err(err);
    };
    check_eq(subject.as_str(), 400, client_err.status().unwrap_or_default())?;
    if !client_err.to_string().contains(EXTEND_REJECTED) {
        return Err(StepError::mismatch(subject, EXTEND_REJECTED, client_err));
    }
    Ok(())
}

fn test_create_volume_with_dot_in_name<'a, 'b>(
    req: &'a mut FixtureRequest<'b>,
) -> BoxFuture<'a, TestResult> {
    Box::pin(async move {
        let steps = req.get::<VolumeSteps>("volume_steps").await?;
        let name = format!("{}.dot", unique_name("stepler-volume"));

        let volume = steps.create_volume(VolumeSpec::new().name(&name)).await?;

        let found = steps.find_volume(&name).await?;
        check_eq(
            format!("volume named {name}"),
            volume.id.as_str(),
            found.as_ref().map_or("<missing>", |v| v.id.as_str()),
        )?;
        Ok(())
    })
}

fn test_volume_list_contains_created<'a, 'b>(
    req: &'a mut FixtureRequest<'b>,
) -> BoxFuture<'a, TestResult> {
    Box::pin(async move {
        let volume = req.get::<Volume>("volume").await?;
        let cli = req.get::<CliSteps>("cli_steps").await?;

        cli.check_volume_listed(&volume.id).await?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::client::fake::FakeVolumes;
    use crate::fixture::{Fixture, FixtureError, FixtureValue, Registry, Session};
    use crate::steps::fast_timeouts;

    struct FakeVolumeSteps(Arc<FakeVolumes>);

    #[async_trait]
    impl Fixture for FakeVolumeSteps {
        async fn setup(&self, req: &mut FixtureRequest<'_>) -> Result<FixtureValue, FixtureError> {
            Ok(Arc::new(VolumeSteps::new(
                self.0.clone(),
                req.finalizers(),
                fast_timeouts(),
            )))
        }
    }

    async fn run_extend(new_size: u64) -> (TestResult, Arc<FakeVolumes>) {
        let fake = Arc::new(FakeVolumes::default());
        let mut registry = Registry::new();
        registry.register("volume_steps", FakeVolumeSteps(fake.clone()));
        let mut session = Session::new(Arc::new(registry));

        let mut params = crate::fixture::Params::new();
        params.insert("new_size".to_string(), json!(new_size));
        let mut scope = session.test_scope().with_params(params);
        let result = test_negative_volume_extend(&mut scope.request()).await;
        assert!(scope.finish().await.is_empty());
        (result, fake)
    }

    #[tokio::test]
    async fn test_extend_to_smaller_or_equal_is_rejected() {
        for new_size in [1, 2] {
            let (result, fake) = run_extend(new_size).await;

            assert!(result.is_ok(), "new_size={new_size}: {result:?}");
            assert_eq!(fake.count(), 0);
        }
    }

    #[tokio::test]
    async fn test_accepted_extend_fails_the_case() {
        let (result, _fake) = run_extend(3).await;

        let err = result.unwrap_err().to_string();
        assert!(err.contains("expected HTTP 400, got accepted"), "{err}");
    }
}
