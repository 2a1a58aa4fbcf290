//! Fixtures the shipped cases run on
//!
//! Session scope holds the config, the admin session and its clients. Test
//! scope holds the project a test runs in, one steps object per service and
//! the ready-made resources built from them.

use std::any::Any;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use super::Role;
use crate::auth::{AuthSession, Authenticator};
use crate::client::{ClientFactory, Project, User};
use crate::config::{ConfigError, Credentials, RunConfig};
use crate::exec::{CommandExecutor, LocalExecutor, SshExecutor};
use crate::fixture::{FixtureError, FixtureRequest, FixtureValue, Registry, Scope, ValueFixture};
use crate::plugins::default_project::{self, DefaultProjectLock, DEFAULT_PROJECT_LOCK, ISOLATED_PROJECT};
use crate::steps::{
    unique_name, BaremetalSteps, CliSteps, IdentitySteps, KeypairSteps, NodeSpec,
    OrchestrationSteps, RouterSteps, StackSpec, StepError, VolumeSpec, VolumeSteps,
};
use crate::templates::TemplateStore;

type Setup<'a> = BoxFuture<'a, Result<FixtureValue, FixtureError>>;

/// The project a test runs in, with a session scoped to it
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub project: Project,
    /// Credentials scoped to `project`, exported to CLI commands
    pub credentials: Credentials,
    pub session: Arc<AuthSession>,
    pub clients: Arc<ClientFactory>,
}

/// Session acting under one role inside the test's project
#[derive(Debug, Clone)]
pub struct RoleSession {
    pub role: Role,
    /// Created for the test; `None` when the run's own user is used
    pub user: Option<User>,
    pub session: Arc<AuthSession>,
    pub clients: Arc<ClientFactory>,
}

/// Registry with every fixture the shipped cases use
///
/// `isolated_project` is autouse unless the config asks for the default
/// project, in which case `default_project_lock` takes its place.
pub fn standard_registry(config: RunConfig) -> Registry {
    let shared_project = config.use_default_project;
    let mut registry = Registry::new();
    registry
        .register("config", ValueFixture::new(config, Scope::Session))
        .setup_fn("authenticator", Scope::Session, authenticator)
        .setup_fn("admin_session", Scope::Session, admin_session)
        .setup_fn("admin_clients", Scope::Session, admin_clients)
        .setup_fn("templates", Scope::Session, templates)
        .setup_fn(ISOLATED_PROJECT, Scope::Test, isolated_project)
        .setup_fn("project_context", Scope::Test, project_context)
        .setup_fn("role_session", Scope::Test, role_session)
        .register(DEFAULT_PROJECT_LOCK, DefaultProjectLock)
        .setup_fn("identity_steps", Scope::Test, identity_steps)
        .setup_fn("volume_steps", Scope::Test, volume_steps)
        .setup_fn("baremetal_steps", Scope::Test, baremetal_steps)
        .setup_fn("orchestration_steps", Scope::Test, orchestration_steps)
        .setup_fn("keypair_steps", Scope::Test, keypair_steps)
        .setup_fn("router_steps", Scope::Test, router_steps)
        .setup_fn("cli_steps", Scope::Test, cli_steps)
        .setup_fn("volume", Scope::Test, volume)
        .setup_fn("chassis", Scope::Test, chassis)
        .setup_fn("node", Scope::Test, node)
        .setup_fn("keypair", Scope::Test, keypair)
        .setup_fn("router", Scope::Test, router)
        .setup_fn("stack", Scope::Test, stack)
        .autouse(ISOLATED_PROJECT);
    default_project::apply(&mut registry, shared_project);
    registry
}

/// [`standard_registry`] over the config read from the environment
pub fn registry_from_env() -> Result<Registry, ConfigError> {
    RunConfig::from_env().map(standard_registry)
}

fn value<T: Any + Send + Sync>(value: T) -> Result<FixtureValue, FixtureError> {
    Ok(Arc::new(value))
}

fn authenticator<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let config = req.get::<RunConfig>("config").await?;
        value(Authenticator::new(&config.transport)?)
    })
}

fn admin_session<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let config = req.get::<RunConfig>("config").await?;
        let auth = req.get::<Authenticator>("authenticator").await?;
        let session = auth.authenticate(&config.credentials).await?;
        info!(user = %session.user_id, project = %session.project_name, "Authenticated");
        value(session)
    })
}

fn admin_clients<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let config = req.get::<RunConfig>("config").await?;
        let session = req.get::<AuthSession>("admin_session").await?;
        value(ClientFactory::new(&config, session)?)
    })
}

fn templates<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let config = req.get::<RunConfig>("config").await?;
        value(TemplateStore::new(config.templates_dir.clone()))
    })
}

/// Fresh project with the run user granted admin in it
fn isolated_project<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let config = req.get::<RunConfig>("config").await?;
        let auth = req.get::<Authenticator>("authenticator").await?;
        let admin = req.get::<AuthSession>("admin_session").await?;
        let clients = req.get::<ClientFactory>("admin_clients").await?;

        let identity = IdentitySteps::new(Arc::new(clients.identity()), req.finalizers());
        let project = identity
            .create_project(&unique_name("stepler-project"))
            .await?;
        let admin_role = identity.find_role(Role::Admin.as_str()).await?;
        identity
            .grant_role(&project, &admin.user_id, &admin_role)
            .await?;

        let credentials = config.credentials.for_project(&project.name);
        let session = Arc::new(auth.authenticate(&credentials).await?);
        info!(project = %project.name, "Running in isolated project");
        value(ProjectContext {
            project,
            credentials,
            clients: Arc::new(clients.for_session(session.clone())),
            session,
        })
    })
}

/// Isolated project, or the configured one when it is shared
fn project_context<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let config = req.get::<RunConfig>("config").await?;
        if !config.use_default_project {
            return req.get_fixture_value(ISOLATED_PROJECT).await;
        }

        let session = req.get::<AuthSession>("admin_session").await?;
        let clients = req.get::<ClientFactory>("admin_clients").await?;
        value(ProjectContext {
            project: Project {
                id: session.project_id.clone(),
                name: session.project_name.clone(),
                domain_id: None,
                enabled: true,
            },
            credentials: config.credentials.clone(),
            session,
            clients,
        })
    })
}

/// Session for the `role` test parameter
fn role_session<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let role: Role = req.param("role")?;
        let ctx = req.get::<ProjectContext>("project_context").await?;
        if role.uses_run_user() {
            return value(RoleSession {
                role,
                user: None,
                session: ctx.session.clone(),
                clients: ctx.clients.clone(),
            });
        }

        let identity = req.get::<IdentitySteps>("identity_steps").await?;
        let auth = req.get::<Authenticator>("authenticator").await?;
        let name = unique_name(&format!("stepler-{role}"));
        let password = uuid::Uuid::new_v4().simple().to_string();
        let user = identity
            .create_user(&name, &password, Some(&ctx.project))
            .await?;
        let keystone_role = identity.find_role(role.as_str()).await?;
        identity
            .grant_role(&ctx.project, &user.id, &keystone_role)
            .await?;

        let session = Arc::new(
            auth.authenticate(&ctx.credentials.for_user(&name, &password))
                .await?,
        );
        value(RoleSession {
            role,
            user: Some(user),
            clients: Arc::new(ctx.clients.for_session(session.clone())),
            session,
        })
    })
}

fn identity_steps<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let clients = req.get::<ClientFactory>("admin_clients").await?;
        value(IdentitySteps::new(
            Arc::new(clients.identity()),
            req.finalizers(),
        ))
    })
}

fn volume_steps<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let config = req.get::<RunConfig>("config").await?;
        let ctx = req.get::<ProjectContext>("project_context").await?;
        value(VolumeSteps::new(
            Arc::new(ctx.clients.block_storage()?),
            req.finalizers(),
            config.timeouts,
        ))
    })
}

fn baremetal_steps<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let config = req.get::<RunConfig>("config").await?;
        let ctx = req.get::<ProjectContext>("project_context").await?;
        value(BaremetalSteps::new(
            Arc::new(ctx.clients.baremetal()?),
            req.finalizers(),
            config.timeouts,
        ))
    })
}

fn orchestration_steps<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let config = req.get::<RunConfig>("config").await?;
        let ctx = req.get::<ProjectContext>("project_context").await?;
        value(OrchestrationSteps::new(
            Arc::new(ctx.clients.orchestration()?),
            req.finalizers(),
            config.timeouts,
        ))
    })
}

fn keypair_steps<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let ctx = req.get::<ProjectContext>("project_context").await?;
        value(KeypairSteps::new(
            Arc::new(ctx.clients.compute()?),
            req.finalizers(),
        ))
    })
}

fn router_steps<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let config = req.get::<RunConfig>("config").await?;
        let ctx = req.get::<ProjectContext>("project_context").await?;
        value(RouterSteps::new(
            Arc::new(ctx.clients.network()?),
            req.finalizers(),
            config.timeouts,
        ))
    })
}

/// CLI runs remotely when a host is configured, else here as the project
fn cli_steps<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let config = req.get::<RunConfig>("config").await?;
        let executor: Arc<dyn CommandExecutor> = match &config.remote {
            Some(remote) => Arc::new(SshExecutor::new(remote.clone())),
            None => {
                let ctx = req.get::<ProjectContext>("project_context").await?;
                Arc::new(LocalExecutor::new(&ctx.credentials))
            }
        };
        value(CliSteps::new(executor))
    })
}

fn volume<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let steps = req.get::<VolumeSteps>("volume_steps").await?;
        value(steps.create_volume(VolumeSpec::new()).await?)
    })
}

fn chassis<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let steps = req.get::<BaremetalSteps>("baremetal_steps").await?;
        value(steps.create_chassis(None).await?)
    })
}

fn node<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let steps = req.get::<BaremetalSteps>("baremetal_steps").await?;
        value(steps.create_node(NodeSpec::new()).await?)
    })
}

fn keypair<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let steps = req.get::<KeypairSteps>("keypair_steps").await?;
        value(steps.create_keypair(&unique_name("stepler-keypair")).await?)
    })
}

fn router<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let steps = req.get::<RouterSteps>("router_steps").await?;
        value(steps.create_router(&unique_name("stepler-router")).await?)
    })
}

/// Stack built from the shipped `heat/empty_stack` template
fn stack<'a, 'b>(req: &'a mut FixtureRequest<'b>) -> Setup<'a> {
    Box::pin(async move {
        let templates = req.get::<TemplateStore>("templates").await?;
        let steps = req.get::<OrchestrationSteps>("orchestration_steps").await?;
        let template = templates
            .load("heat", "empty_stack")
            .await
            .map_err(StepError::from)?;
        value(steps.create_stack(StackSpec::new(template)).await?)
    })
}
