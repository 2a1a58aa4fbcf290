use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ClientError, ServiceClient};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub domain_id: Option<String>,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default_project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserCreate {
    pub name: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_project_id: Option<String>,
}

fn enabled() -> bool {
    true
}

#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn create_project(&self, name: &str, description: &str) -> Result<Project, ClientError>;
    async fn delete_project(&self, id: &str) -> Result<(), ClientError>;
    async fn list_projects(&self) -> Result<Vec<Project>, ClientError>;
    async fn create_user(&self, request: &UserCreate) -> Result<User, ClientError>;
    async fn delete_user(&self, id: &str) -> Result<(), ClientError>;
    async fn find_role(&self, name: &str) -> Result<Option<Role>, ClientError>;
    async fn grant_project_role(
        &self,
        project_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), ClientError>;
}

/// Keystone v3 client
#[derive(Debug, Clone)]
pub struct IdentityClient {
    inner: ServiceClient,
}

#[derive(Deserialize)]
struct ProjectBody {
    project: Project,
}

#[derive(Deserialize)]
struct ProjectsBody {
    projects: Vec<Project>,
}

#[derive(Deserialize)]
struct UserBody {
    user: User,
}

#[derive(Deserialize)]
struct RolesBody {
    roles: Vec<Role>,
}

impl IdentityClient {
    pub fn new(inner: ServiceClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl IdentityApi for IdentityClient {
    async fn create_project(&self, name: &str, description: &str) -> Result<Project, ClientError> {
        let body: ProjectBody = self
            .inner
            .post(
                "projects",
                &json!({ "project": { "name": name, "description": description, "enabled": true } }),
            )
            .await?;
        Ok(body.project)
    }

    async fn delete_project(&self, id: &str) -> Result<(), ClientError> {
        self.inner.delete(&format!("projects/{id}")).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, ClientError> {
        let body: ProjectsBody = self.inner.get("projects").await?;
        Ok(body.projects)
    }

    async fn create_user(&self, request: &UserCreate) -> Result<User, ClientError> {
        let body: UserBody = self
            .inner
            .post("users", &json!({ "user": request }))
            .await?;
        Ok(body.user)
    }

    async fn delete_user(&self, id: &str) -> Result<(), ClientError> {
        self.inner.delete(&format!("users/{id}")).await
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, ClientError> {
        let body: RolesBody = self.inner.get_query("roles", &[("name", name)]).await?;
        Ok(body.roles.into_iter().find(|r| r.name == name))
    }

    async fn grant_project_role(
        &self,
        project_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), ClientError> {
        self.inner
            .put_empty(&format!(
                "projects/{project_id}/users/{user_id}/roles/{role_id}"
            ))
            .await
    }
}
