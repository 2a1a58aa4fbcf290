use futures::future::BoxFuture;

use crate::fixture::FixtureRequest;
use crate::steps::{check_eq, OrchestrationSteps, StackSpec, StepError};
use crate::suite::{TestCase, TestResult};
use crate::templates::TemplateStore;

pub(super) fn cases() -> Vec<TestCase> {
    vec![TestCase::new(
        "heat",
        "test_create_stack_from_template",
        test_create_stack_from_template,
    )
    .mark("heat")
    .idempotent_id("728e7961-7e81-4d33-ab29-de45e1420ab9")]
}

fn test_create_stack_from_template<'a, 'b>(
    req: &'a mut FixtureRequest<'b>,
) -> BoxFuture<'a, TestResult> {
    Box::pin(async move {
        let templates = req.get::<TemplateStore>("templates").await?;
        let steps = req.get::<OrchestrationSteps>("orchestration_steps").await?;
        let template = templates
            .load("heat", "empty_stack")
            .await
            .map_err(StepError::from)?;

        let stack = steps.create_stack(StackSpec::new(template)).await?;

        let stored = steps.get_stack(&stack.id).await?;
        check_eq(
            format!("stack/{} status", stack.id),
            "CREATE_COMPLETE",
            stored.stack_status.as_str(),
        )?;
        Ok(())
    })
}
