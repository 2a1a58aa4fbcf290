use std::sync::Arc;

use tracing::info;

use super::StepError;
use crate::exec::{CommandExecutor, CommandResult};

/// Steps driving the `openstack` command-line client
#[derive(Clone)]
pub struct CliSteps {
    executor: Arc<dyn CommandExecutor>,
}

impl CliSteps {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// Run a command; a non-zero exit fails the step
    pub async fn run(&self, command: &str) -> Result<CommandResult, StepError> {
        let result = self.executor.execute(command).await?;
        Ok(result.check(command)?)
    }

    /// IDs printed by `openstack volume list`
    pub async fn list_volume_ids(&self) -> Result<Vec<String>, StepError> {
        let result = self.run("openstack volume list -f value -c ID").await?;
        let ids: Vec<String> = result.lines().map(str::to_string).collect();
        info!(count = ids.len(), "Listed volumes via CLI");
        Ok(ids)
    }

    /// Fail unless the CLI volume list contains `id`
    pub async fn check_volume_listed(&self, id: &str) -> Result<(), StepError> {
        let ids = self.list_volume_ids().await?;
        if ids.iter().any(|listed| listed == id) {
            Ok(())
        } else {
            Err(StepError::mismatch(
                "openstack volume list",
                format!("contains {id}"),
                format!("{} other IDs", ids.len()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        stdout: &'static str,
        return_code: i32,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandExecutor for Scripted {
        async fn execute(&self, command: &str) -> Result<CommandResult, ExecError> {
            self.seen.lock().unwrap().push(command.to_string());
            Ok(CommandResult {
                return_code: self.return_code,
                stdout: self.stdout.to_string(),
                stderr: "Missing value auth-url".to_string(),
            })
        }
    }

    fn cli(stdout: &'static str, return_code: i32) -> (CliSteps, Arc<Scripted>) {
        let executor = Arc::new(Scripted {
            stdout,
            return_code,
            seen: Mutex::new(Vec::new()),
        });
        (CliSteps::new(executor.clone()), executor)
    }

    #[tokio::test]
    async fn test_volume_listed() {
        let (steps, executor) = cli("vol-1\nvol-2\n\n", 0);

        steps.check_volume_listed("vol-2").await.unwrap();
        let err = steps.check_volume_listed("vol-3").await.unwrap_err();

        assert!(err.to_string().contains("contains vol-3"));
        assert_eq!(
            executor.seen.lock().unwrap()[0],
            "openstack volume list -f value -c ID"
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails() {
        let (steps, _executor) = cli("", 1);

        let err = steps.list_volume_ids().await.unwrap_err();
        assert!(matches!(err, StepError::Exec(ExecError::Failed { return_code: 1, .. })));
    }
}
