//! Configuration types for stepler
//!
//! `RunConfig` is built once at the start of a run and shared read-only with
//! every fixture through the `config` session fixture. Build it
//! programmatically or from the usual `OS_*` environment variables.
//!
//! # Example
//!
//! ```
//! use stepler::config::{Credentials, RunConfig};
//! use std::time::Duration;
//!
//! let config = RunConfig::new(
//!     Credentials::new("http://keystone:5000/v3", "admin", "secret", "admin"),
//! )
//! .region("RegionOne")
//! .use_default_project(true);
//!
//! assert_eq!(config.transport.request_timeout, Duration::from_secs(60));
//! ```

use std::path::PathBuf;
use std::time::Duration;

/// Errors building a `RunConfig`
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Keystone password credentials scoped to a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Keystone v3 endpoint (e.g. `http://keystone:5000/v3`)
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_name: String,
    pub user_domain_name: String,
    pub project_domain_name: String,
}

impl Credentials {
    /// Credentials in the `Default` user and project domains
    pub fn new(
        auth_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        project_name: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            username: username.into(),
            password: password.into(),
            project_name: project_name.into(),
            user_domain_name: "Default".to_string(),
            project_domain_name: "Default".to_string(),
        }
    }

    /// Same user and domains, scoped to another project
    #[must_use]
    pub fn for_project(&self, project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            ..self.clone()
        }
    }

    /// Same auth endpoint and domains, different user
    #[must_use]
    pub fn for_user(&self, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..self.clone()
        }
    }

    /// Environment variables an `openstack` CLI needs to act as this user
    pub fn to_env(&self) -> Vec<(String, String)> {
        vec![
            ("OS_AUTH_URL".to_string(), self.auth_url.clone()),
            ("OS_USERNAME".to_string(), self.username.clone()),
            ("OS_PASSWORD".to_string(), self.password.clone()),
            ("OS_PROJECT_NAME".to_string(), self.project_name.clone()),
            ("OS_USER_DOMAIN_NAME".to_string(), self.user_domain_name.clone()),
            (
                "OS_PROJECT_DOMAIN_NAME".to_string(),
                self.project_domain_name.clone(),
            ),
            ("OS_IDENTITY_API_VERSION".to_string(), "3".to_string()),
        ]
    }
}

/// Endpoint interface selected from the service catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interface {
    #[default]
    Public,
    Internal,
    Admin,
}

impl Interface {
    pub fn as_str(self) -> &'static str {
        match self {
            Interface::Public => "public",
            Interface::Internal => "internal",
            Interface::Admin => "admin",
        }
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().trim_end_matches("URL").to_ascii_lowercase().as_str() {
            "public" => Ok(Interface::Public),
            "internal" => Ok(Interface::Internal),
            "admin" => Ok(Interface::Admin),
            _ => Err(ConfigError::Invalid {
                key: "OS_INTERFACE",
                value: value.to_string(),
            }),
        }
    }
}

/// HTTP transport settings handed to every client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Accept invalid TLS certificates (lab clouds with self-signed certs)
    pub insecure: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            insecure: false,
        }
    }
}

/// Timeout and polling interval for one kind of wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitPolicy {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub const fn secs(timeout: u64, interval: u64) -> Self {
        Self::new(Duration::from_secs(timeout), Duration::from_secs(interval))
    }
}

/// Per-resource wait policies used by the steps layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub volume_available: WaitPolicy,
    pub volume_deleted: WaitPolicy,
    pub volume_extended: WaitPolicy,
    pub stack_complete: WaitPolicy,
    pub stack_deleted: WaitPolicy,
    pub node_deleted: WaitPolicy,
    pub router_active: WaitPolicy,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            volume_available: WaitPolicy::secs(300, 3),
            volume_deleted: WaitPolicy::secs(180, 3),
            volume_extended: WaitPolicy::secs(120, 3),
            stack_complete: WaitPolicy::secs(600, 5),
            stack_deleted: WaitPolicy::secs(300, 5),
            node_deleted: WaitPolicy::secs(120, 2),
            router_active: WaitPolicy::secs(60, 2),
        }
    }
}

impl Timeouts {
    /// Same policy everywhere; handy for fakes in unit tests
    pub fn uniform(policy: WaitPolicy) -> Self {
        Self {
            volume_available: policy,
            volume_deleted: policy,
            volume_extended: policy,
            stack_complete: policy,
            stack_deleted: policy,
            node_deleted: policy,
            router_active: policy,
        }
    }
}

/// Remote host running the `openstack` CLI over ssh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub host: String,
    pub user: String,
    /// openrc file sourced before every command
    pub openrc_path: String,
}

/// Everything a run needs to know, built once
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub credentials: Credentials,
    pub region: Option<String>,
    pub interface: Interface,
    pub transport: TransportConfig,
    pub timeouts: Timeouts,
    /// Root of `<service>/<name>.yaml` templates
    pub templates_dir: PathBuf,
    /// Directory holding interprocess lock files
    pub lock_dir: PathBuf,
    /// Reuse the configured project instead of a throwaway one per test
    pub use_default_project: bool,
    pub remote: Option<RemoteConfig>,
}

impl RunConfig {
    /// Config with defaults for everything but credentials
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            region: None,
            interface: Interface::default(),
            transport: TransportConfig::default(),
            timeouts: Timeouts::default(),
            templates_dir: PathBuf::from("templates"),
            lock_dir: std::env::temp_dir().join("stepler-locks"),
            use_default_project: false,
            remote: None,
        }
    }

    /// Read the config from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the config through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let mut credentials = Credentials::new(
            required("OS_AUTH_URL")?,
            required("OS_USERNAME")?,
            required("OS_PASSWORD")?,
            required("OS_PROJECT_NAME")?,
        );
        if let Some(domain) = lookup("OS_USER_DOMAIN_NAME") {
            credentials.user_domain_name = domain;
        }
        if let Some(domain) = lookup("OS_PROJECT_DOMAIN_NAME") {
            credentials.project_domain_name = domain;
        }

        let mut config = Self::new(credentials);
        config.region = lookup("OS_REGION_NAME").filter(|v| !v.is_empty());

        if let Some(interface) = lookup("OS_INTERFACE") {
            config.interface = Interface::parse(&interface)?;
        }
        if let Some(insecure) = lookup("STEPLER_INSECURE") {
            config.transport.insecure = parse_bool("STEPLER_INSECURE", &insecure)?;
        }
        if let Some(dir) = lookup("STEPLER_TEMPLATES_DIR") {
            config.templates_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("STEPLER_LOCK_DIR") {
            config.lock_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("STEPLER_USE_DEFAULT_PROJECT") {
            config.use_default_project = parse_bool("STEPLER_USE_DEFAULT_PROJECT", &flag)?;
        }
        if let Some(host) = lookup("STEPLER_REMOTE_HOST") {
            config.remote = Some(RemoteConfig {
                host,
                user: lookup("STEPLER_REMOTE_USER").unwrap_or_else(|| "root".to_string()),
                openrc_path: lookup("STEPLER_REMOTE_OPENRC")
                    .unwrap_or_else(|| "/root/openrc".to_string()),
            });
        }

        Ok(config)
    }

    /// Set region used for endpoint selection
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set catalog interface
    #[must_use]
    pub fn interface(mut self, interface: Interface) -> Self {
        self.interface = interface;
        self
    }

    /// Set transport settings
    #[must_use]
    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Set wait policies
    #[must_use]
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set templates root
    #[must_use]
    pub fn templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = dir.into();
        self
    }

    /// Set lock file directory
    #[must_use]
    pub fn lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = dir.into();
        self
    }

    /// Reuse the configured project
    #[must_use]
    pub fn use_default_project(mut self, enabled: bool) -> Self {
        self.use_default_project = enabled;
        self
    }

    /// Run CLI commands on a remote host
    #[must_use]
    pub fn remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}
