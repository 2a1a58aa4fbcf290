use std::sync::Arc;

use tracing::{info, instrument};

use super::{ignore_not_found, unique_name, StepError};
use crate::client::{OrchestrationApi, Stack, StackCreate};
use crate::config::{Timeouts, WaitPolicy};
use crate::fixture::Finalizers;
use crate::wait::{until, Probe};

/// Parameters of a stack to create
#[derive(Debug, Clone)]
pub struct StackSpec {
    name: Option<String>,
    template: String,
    parameters: serde_json::Map<String, serde_json::Value>,
    timeout_mins: u64,
    cleanup: bool,
}

impl StackSpec {
    /// Stack from raw template text
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            name: None,
            template: template.into(),
            parameters: serde_json::Map::new(),
            timeout_mins: 10,
            cleanup: true,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }
}

/// Heat stack steps
#[derive(Clone)]
pub struct OrchestrationSteps {
    api: Arc<dyn OrchestrationApi>,
    finalizers: Finalizers,
    timeouts: Timeouts,
}

impl OrchestrationSteps {
    pub fn new(api: Arc<dyn OrchestrationApi>, finalizers: Finalizers, timeouts: Timeouts) -> Self {
        Self {
            api,
            finalizers,
            timeouts,
        }
    }

    /// Create a stack and wait for `CREATE_COMPLETE`
    #[instrument(skip(self, spec), fields(name = ?spec.name))]
    pub async fn create_stack(&self, spec: StackSpec) -> Result<Stack, StepError> {
        let request = StackCreate {
            stack_name: spec.name.unwrap_or_else(|| unique_name("stepler-stack")),
            template: spec.template,
            parameters: spec.parameters,
            timeout_mins: spec.timeout_mins,
        };
        let id = self.api.create_stack(&request).await?;
        info!(id = %id, name = %request.stack_name, "Created stack");

        if spec.cleanup {
            let api = self.api.clone();
            let name = request.stack_name.clone();
            let stack_id = id.clone();
            let policy = self.timeouts.stack_deleted;
            self.finalizers
                .push(format!("delete stack {name}"), move || async move {
                    delete_and_wait(api.as_ref(), &name, &stack_id, policy).await
                });
        }

        self.wait_stack_status(&id, "CREATE_COMPLETE", self.timeouts.stack_complete)
            .await
    }

    pub async fn get_stack(&self, ident: &str) -> Result<Stack, StepError> {
        Ok(self.api.get_stack(ident).await?)
    }

    pub async fn delete_stack(&self, stack: &Stack) -> Result<(), StepError> {
        delete_and_wait(
            self.api.as_ref(),
            &stack.stack_name,
            &stack.id,
            self.timeouts.stack_deleted,
        )
        .await
    }

    /// Poll until the stack reaches `status`; any `*_FAILED` status fails fast
    pub async fn wait_stack_status(
        &self,
        ident: &str,
        status: &str,
        policy: WaitPolicy,
    ) -> Result<Stack, StepError> {
        let api = self.api.as_ref();
        until(format!("stack/{ident}"), || async move {
            let stack = api.get_stack(ident).await?;
            if stack.is_failed() && stack.stack_status != status {
                return Err(StepError::mismatch(
                    format!("stack/{ident} status"),
                    status,
                    format!(
                        "{} ({})",
                        stack.stack_status,
                        stack.stack_status_reason.as_deref().unwrap_or("no reason given")
                    ),
                ));
            }
            let state = format!("stack_status={}", stack.stack_status);
            Ok(Probe::when(stack.stack_status == status, stack, state))
        })
        .policy(policy)
        .ready()
        .await
    }
}

async fn delete_and_wait(
    api: &dyn OrchestrationApi,
    name: &str,
    id: &str,
    policy: WaitPolicy,
) -> Result<(), StepError> {
    ignore_not_found(api.delete_stack(name, id).await)?;

    until(format!("stack/{name}"), || async move {
        match api.get_stack(id).await {
            Ok(stack) if stack.stack_status == "DELETE_COMPLETE" => Ok(Probe::Ready(())),
            Ok(stack) if stack.stack_status == "DELETE_FAILED" => Err(StepError::mismatch(
                format!("stack/{name} status"),
                "DELETE_COMPLETE",
                stack.stack_status,
            )),
            Ok(stack) => Ok(Probe::Pending(format!("stack_status={}", stack.stack_status))),
            Err(e) if e.is_not_found() => Ok(Probe::Ready(())),
            Err(e) => Err(StepError::from(e)),
        }
    })
    .policy(policy)
    .ready()
    .await?;

    info!(name, "Stack deleted");
    Ok(())
}
