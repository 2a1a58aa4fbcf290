use std::sync::Arc;

use futures::future::BoxFuture;

use crate::client::Project;
use crate::fixture::FixtureRequest;
use crate::steps::{IdentitySteps, StepError};
use crate::suite::{Role, RoleSession, TestCase, TestResult};

pub(super) fn cases() -> Vec<TestCase> {
    vec![TestCase::new(
        "keystone",
        "test_list_projects_permissions",
        test_list_projects_permissions,
    )
    .mark("keystone")
    .per_role(&[
        (Role::Admin, "6fdc2b70-1c92-48be-a008-114a6e90589c"),
        (Role::Member, "e1fc44fb-7979-4185-b871-73b938368372"),
        (Role::Reader, "3b7fb89c-00ce-4101-af46-4a5497cf3d94"),
    ])]
}

/// Only admin may list every project
fn test_list_projects_permissions<'a, 'b>(
    req: &'a mut FixtureRequest<'b>,
) -> BoxFuture<'a, TestResult> {
    Box::pin(async move {
        let acting = req.get::<RoleSession>("role_session").await?;
        let steps = IdentitySteps::new(Arc::new(acting.clients.identity()), req.finalizers());

        let listed = steps.list_projects().await;

        check_listing(acting.role, listed)?;
        Ok(())
    })
}

fn check_listing(role: Role, listed: Result<Vec<Project>, StepError>) -> Result<(), StepError> {
    let subject = format!("project listing as {role}");
    match listed {
        Ok(projects) if role.can_list_projects() => {
            if projects.is_empty() {
                return Err(StepError::mismatch(subject, "at least one project", "none"));
            }
            Ok(())
        }
        Ok(projects) => Err(StepError::mismatch(
            subject,
            "HTTP 403",
            format!("{} projects", projects.len()),
        )),
        Err(e) if !role.can_list_projects() && e.client_error().is_some_and(|c| c.is_forbidden()) => {
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeIdentity;
    use crate::client::IdentityApi;

    async fn listing(fake: &FakeIdentity) -> Result<Vec<Project>, StepError> {
        Ok(fake.list_projects().await?)
    }

    #[tokio::test]
    async fn test_admin_lists_projects() {
        let fake = FakeIdentity::default();
        fake.create_project("p", "").await.unwrap();

        check_listing(Role::Admin, listing(&fake).await).unwrap();
    }

    #[tokio::test]
    async fn test_forbidden_listing_passes_for_reader_and_member() {
        let fake = FakeIdentity::forbidding_listing();

        check_listing(Role::Reader, listing(&fake).await).unwrap();
        check_listing(Role::Member, listing(&fake).await).unwrap();
        assert!(check_listing(Role::Admin, listing(&fake).await).is_err());
    }

    #[tokio::test]
    async fn test_reader_allowed_to_list_is_a_failure() {
        let fake = FakeIdentity::default();

        let err = check_listing(Role::Reader, listing(&fake).await).unwrap_err();

        assert_eq!(
            err.to_string(),
            "project listing as reader: expected HTTP 403, got 0 projects"
        );
    }
}
