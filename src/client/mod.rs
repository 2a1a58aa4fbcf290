//! Authenticated REST clients for OpenStack services
//!
//! One client per service per session, built by [`ClientFactory`] from an
//! [`AuthSession`](crate::auth::AuthSession). No retries live here: API and
//! transport errors go back to the steps layer unchanged.
//!
//! Each service is exposed through an async trait (`VolumeApi`,
//! `BaremetalApi`, ...) so the steps layer can run against fakes.

mod baremetal;
mod block_storage;
mod compute;
mod identity;
mod network;
mod orchestration;

#[cfg(test)]
pub(crate) mod fake;

pub use baremetal::{BaremetalApi, BaremetalClient, Chassis, Node, NodeCreate};
pub use block_storage::{BlockStorageClient, Volume, VolumeApi, VolumeCreate};
pub use compute::{ComputeApi, ComputeClient, Keypair};
pub use identity::{IdentityApi, IdentityClient, Project, Role, User, UserCreate};
pub use network::{NetworkApi, NetworkClient, Router};
pub use orchestration::{OrchestrationApi, OrchestrationClient, Stack, StackCreate};

use std::sync::Arc;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::auth::AuthSession;
use crate::config::{Interface, RunConfig, TransportConfig};

/// Errors from service clients
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{service} API returned {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("no {interface} endpoint for service type {service_type} in the catalog")]
    EndpointNotFound {
        service_type: String,
        interface: &'static str,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unexpected response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

impl ClientError {
    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }
}

/// Build the shared HTTP client from explicit transport settings
pub fn build_http(transport: &TransportConfig) -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(transport.connect_timeout)
        .timeout(transport.request_timeout)
        .danger_accept_invalid_certs(transport.insecure)
        .user_agent(concat!("stepler/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Pull the human message out of an OpenStack error body
///
/// Handles the nova/cinder `{"badRequest": {"message": ..}}` shape, keystone
/// and heat `{"error": {"message": ..}}`, neutron `{"NeutronError": ..}` and
/// ironic's JSON-in-a-string `error_message`. Anything else comes back as the
/// raw body.
pub fn api_error_message(body: &str) -> String {
    let raw = body.trim().to_string();
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return raw;
    };

    if let Some(inner) = value.get("error_message").and_then(|v| v.as_str()) {
        return serde_json::from_str::<serde_json::Value>(inner)
            .ok()
            .and_then(|v| v.get("faultstring").and_then(|f| f.as_str()).map(str::to_string))
            .unwrap_or_else(|| inner.to_string());
    }

    if let Some(message) = value.get("message").and_then(|v| v.as_str()) {
        return message.to_string();
    }

    value
        .as_object()
        .and_then(|obj| {
            obj.values()
                .find_map(|v| v.get("message").and_then(|m| m.as_str()))
        })
        .map(str::to_string)
        .unwrap_or(raw)
}

/// Token-authenticated JSON client for one service endpoint
#[derive(Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    service: &'static str,
    endpoint: String,
    token: String,
    headers: Vec<(&'static str, String)>,
}

impl ServiceClient {
    pub fn new(
        http: reqwest::Client,
        service: &'static str,
        endpoint: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            service,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
            headers: Vec::new(),
        }
    }

    /// Send an extra header on every request (API microversions)
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.json(self.request(reqwest::Method::GET, path)).await
    }

    pub async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        self.json(self.request(reqwest::Method::GET, path).query(query))
            .await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.json(self.request(reqwest::Method::POST, path).json(body))
            .await
    }

    /// POST whose response body is ignored (actions answering 202)
    pub async fn post_accepted<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ClientError> {
        self.send(self.request(reqwest::Method::POST, path).json(body))
            .await
            .map(drop)
    }

    pub async fn put_empty(&self, path: &str) -> Result<(), ClientError> {
        self.send(self.request(reqwest::Method::PUT, path))
            .await
            .map(drop)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(self.request(reqwest::Method::DELETE, path))
            .await
            .map(drop)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, self.url(path))
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json");
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }
        builder
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse {
            service: self.service,
            message: e.to_string(),
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        debug!(
            service = self.service,
            url = %response.url(),
            status = status.as_u16(),
            "API call"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            service: self.service,
            status: status.as_u16(),
            message: if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                api_error_message(&body)
            },
        })
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("service", &self.service)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Produces one authenticated client per service from a session
#[derive(Clone)]
pub struct ClientFactory {
    http: reqwest::Client,
    session: Arc<AuthSession>,
    interface: Interface,
    region: Option<String>,
}

impl std::fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientFactory")
            .field("project", &self.session.project_name)
            .field("interface", &self.interface)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl ClientFactory {
    pub fn new(config: &RunConfig, session: Arc<AuthSession>) -> Result<Self, ClientError> {
        Ok(Self::with_http(
            build_http(&config.transport)?,
            session,
            config.interface,
            config.region.clone(),
        ))
    }

    pub fn with_http(
        http: reqwest::Client,
        session: Arc<AuthSession>,
        interface: Interface,
        region: Option<String>,
    ) -> Self {
        Self {
            http,
            session,
            interface,
            region,
        }
    }

    /// Same transport and endpoint selection, acting as another session
    pub fn for_session(&self, session: Arc<AuthSession>) -> Self {
        Self {
            session,
            ..self.clone()
        }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    fn service(
        &self,
        service: &'static str,
        service_types: &[&str],
    ) -> Result<ServiceClient, ClientError> {
        let endpoint =
            self.session
                .endpoint_for(service_types, self.interface, self.region.as_deref())?;
        debug!(service, endpoint = %endpoint, "Resolved service endpoint");
        Ok(ServiceClient::new(
            self.http.clone(),
            service,
            endpoint,
            &self.session.token,
        ))
    }

    /// Cinder v3
    pub fn block_storage(&self) -> Result<BlockStorageClient, ClientError> {
        Ok(BlockStorageClient::new(
            self.service("cinder", &["volumev3", "block-storage"])?,
        ))
    }

    /// Ironic, pinned to the microversion the steps rely on
    pub fn baremetal(&self) -> Result<BaremetalClient, ClientError> {
        Ok(BaremetalClient::new(self.service("ironic", &["baremetal"])?))
    }

    /// Keystone v3, talking to the auth URL the session came from
    pub fn identity(&self) -> IdentityClient {
        IdentityClient::new(ServiceClient::new(
            self.http.clone(),
            "keystone",
            &self.session.credentials.auth_url,
            &self.session.token,
        ))
    }

    /// Heat
    pub fn orchestration(&self) -> Result<OrchestrationClient, ClientError> {
        Ok(OrchestrationClient::new(
            self.service("heat", &["orchestration"])?,
        ))
    }

    /// Nova
    pub fn compute(&self) -> Result<ComputeClient, ClientError> {
        Ok(ComputeClient::new(self.service("nova", &["compute"])?))
    }

    /// Neutron
    pub fn network(&self) -> Result<NetworkClient, ClientError> {
        Ok(NetworkClient::new(self.service("neutron", &["network"])?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_nova_cinder_shape() {
        let body = r#"{"badRequest": {"code": 400, "message": "Invalid input received: New size for extend must be greater than current size. (current: 2, extended: 1)."}}"#;
        assert!(api_error_message(body).starts_with("Invalid input received: New size"));
    }

    #[test]
    fn test_error_message_keystone_shape() {
        let body = r#"{"error": {"code": 403, "title": "Forbidden", "message": "You are not authorized to perform the requested action: identity:list_projects."}}"#;
        assert!(api_error_message(body).contains("identity:list_projects"));
    }

    #[test]
    fn test_error_message_ironic_shape() {
        let body = r#"{"error_message": "{\"faultcode\": \"Client\", \"faultstring\": \"Node abc could not be found.\", \"debuginfo\": null}"}"#;
        assert_eq!(api_error_message(body), "Node abc could not be found.");
    }

    #[test]
    fn test_error_message_neutron_shape() {
        let body = r#"{"NeutronError": {"type": "RouterNotFound", "message": "Router 1 could not be found", "detail": ""}}"#;
        assert_eq!(api_error_message(body), "Router 1 could not be found");
    }

    #[test]
    fn test_error_message_plain_text() {
        assert_eq!(api_error_message("  Service Unavailable \n"), "Service Unavailable");
    }

    #[test]
    fn test_client_error_status() {
        let err = ClientError::Api {
            service: "cinder",
            status: 404,
            message: "Volume could not be found.".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_forbidden());
        assert!(err.to_string().contains("cinder API returned 404"));
    }

    #[test]
    fn test_service_client_url_join() {
        let client = ServiceClient::new(
            reqwest::Client::new(),
            "cinder",
            "http://cinder:8776/v3/abc/",
            "token",
        );
        assert_eq!(client.url("/volumes/1"), "http://cinder:8776/v3/abc/volumes/1");
        assert_eq!(client.url("volumes"), "http://cinder:8776/v3/abc/volumes");
    }
}
