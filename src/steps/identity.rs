use std::sync::Arc;

use tracing::{info, instrument};

use super::{ignore_not_found, StepError};
use crate::client::{IdentityApi, Project, Role, User, UserCreate};
use crate::fixture::Finalizers;

/// Keystone project, user and role steps
#[derive(Clone)]
pub struct IdentitySteps {
    api: Arc<dyn IdentityApi>,
    finalizers: Finalizers,
}

impl IdentitySteps {
    pub fn new(api: Arc<dyn IdentityApi>, finalizers: Finalizers) -> Self {
        Self { api, finalizers }
    }

    #[instrument(skip(self))]
    pub async fn create_project(&self, name: &str) -> Result<Project, StepError> {
        let project = self
            .api
            .create_project(name, "created by stepler")
            .await?;
        info!(id = %project.id, "Created project");

        let api = self.api.clone();
        let id = project.id.clone();
        self.finalizers
            .push(format!("delete project {id}"), move || async move {
                ignore_not_found(api.delete_project(&id).await)
            });

        Ok(project)
    }

    pub async fn delete_project(&self, project: &Project) -> Result<(), StepError> {
        Ok(self.api.delete_project(&project.id).await?)
    }

    #[instrument(skip(self, password, project), fields(project = ?project.map(|p| &p.id)))]
    pub async fn create_user(
        &self,
        name: &str,
        password: &str,
        project: Option<&Project>,
    ) -> Result<User, StepError> {
        let user = self
            .api
            .create_user(&UserCreate {
                name: name.to_string(),
                password: password.to_string(),
                default_project_id: project.map(|p| p.id.clone()),
            })
            .await?;
        info!(id = %user.id, "Created user");

        let api = self.api.clone();
        let id = user.id.clone();
        self.finalizers
            .push(format!("delete user {id}"), move || async move {
                ignore_not_found(api.delete_user(&id).await)
            });

        Ok(user)
    }

    pub async fn delete_user(&self, user: &User) -> Result<(), StepError> {
        Ok(self.api.delete_user(&user.id).await?)
    }

    /// Role by exact name; a missing role fails the step
    pub async fn find_role(&self, name: &str) -> Result<Role, StepError> {
        self.api
            .find_role(name)
            .await?
            .ok_or_else(|| StepError::mismatch(format!("role {name}"), "present", "missing"))
    }

    pub async fn grant_role(
        &self,
        project: &Project,
        user_id: &str,
        role: &Role,
    ) -> Result<(), StepError> {
        self.api
            .grant_project_role(&project.id, user_id, &role.id)
            .await?;
        info!(project = %project.id, user = %user_id, role = %role.name, "Granted role");
        Ok(())
    }

    /// Projects visible to the session; a policy denial comes back as a 403 client error
    pub async fn list_projects(&self) -> Result<Vec<Project>, StepError> {
        Ok(self.api.list_projects().await?)
    }
}
