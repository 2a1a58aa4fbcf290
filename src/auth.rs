//! Keystone v3 password authentication
//!
//! An [`AuthSession`] is the token plus the service catalog it was issued
//! with. Sessions are read-only and shared by `Arc`; running as a different
//! user or project means authenticating again, never mutating a session.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::client::{api_error_message, build_http, ClientError};
use crate::config::{Credentials, Interface, TransportConfig};

/// One endpoint of a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
}

/// One service in the token's catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// A project-scoped token and what came with it
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: String,
    pub project_id: String,
    pub project_name: String,
    /// Role names granted on the project
    pub roles: Vec<String>,
    pub catalog: Vec<CatalogEntry>,
    /// Credentials the token was issued for
    pub credentials: Credentials,
}

impl AuthSession {
    /// URL of the first service type in `service_types` with a matching endpoint
    pub fn endpoint_for(
        &self,
        service_types: &[&str],
        interface: Interface,
        region: Option<&str>,
    ) -> Result<String, ClientError> {
        select_endpoint(&self.catalog, service_types, interface, region).ok_or_else(|| {
            ClientError::EndpointNotFound {
                service_type: service_types.join("|"),
                interface: interface.as_str(),
            }
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

fn select_endpoint(
    catalog: &[CatalogEntry],
    service_types: &[&str],
    interface: Interface,
    region: Option<&str>,
) -> Option<String> {
    service_types.iter().find_map(|wanted| {
        catalog
            .iter()
            .filter(|entry| entry.service_type == *wanted)
            .flat_map(|entry| entry.endpoints.iter())
            .find(|endpoint| {
                endpoint.interface == interface.as_str()
                    && region.map_or(true, |r| {
                        endpoint.region_id.as_deref() == Some(r)
                            || endpoint.region.as_deref() == Some(r)
                    })
            })
            .map(|endpoint| endpoint.url.clone())
    })
}

#[derive(Deserialize)]
struct TokenBody {
    token: Token,
}

#[derive(Deserialize)]
struct Token {
    user: NamedRef,
    #[serde(default)]
    project: Option<NamedRef>,
    #[serde(default)]
    roles: Vec<NamedRef>,
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
struct NamedRef {
    id: String,
    #[serde(default)]
    name: String,
}

fn password_request(creds: &Credentials) -> serde_json::Value {
    json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": creds.username,
                        "domain": { "name": creds.user_domain_name },
                        "password": creds.password,
                    }
                }
            },
            "scope": {
                "project": {
                    "name": creds.project_name,
                    "domain": { "name": creds.project_domain_name },
                }
            }
        }
    })
}

/// Issues project-scoped tokens
#[derive(Debug, Clone)]
pub struct Authenticator {
    http: reqwest::Client,
}

impl Authenticator {
    pub fn new(transport: &TransportConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_http(transport)?,
        })
    }

    pub fn with_http(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Authenticate and return the scoped session
    #[instrument(skip(self, creds), fields(user = %creds.username, project = %creds.project_name))]
    pub async fn authenticate(&self, creds: &Credentials) -> Result<AuthSession, ClientError> {
        let url = format!("{}/auth/tokens", creds.auth_url.trim_end_matches('/'));
        debug!(url = %url, "Requesting token");

        let response = self
            .http
            .post(&url)
            .json(&password_request(creds))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                service: "keystone",
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let token = response
            .headers()
            .get("X-Subject-Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ClientError::Auth("response has no X-Subject-Token header".into()))?;

        let body: TokenBody = response
            .json()
            .await
            .map_err(|e| ClientError::Auth(format!("malformed token body: {e}")))?;

        let session = session_from_token(token, body.token, creds)?;
        info!(
            user_id = %session.user_id,
            project_id = %session.project_id,
            services = session.catalog.len(),
            "Authenticated"
        );
        Ok(session)
    }
}

fn session_from_token(
    token: String,
    body: Token,
    creds: &Credentials,
) -> Result<AuthSession, ClientError> {
    let project = body
        .project
        .ok_or_else(|| ClientError::Auth("token is not project-scoped".into()))?;

    Ok(AuthSession {
        token,
        user_id: body.user.id,
        project_id: project.id,
        project_name: project.name,
        roles: body.roles.into_iter().map(|r| r.name).collect(),
        catalog: body.catalog,
        credentials: creds.clone(),
    })
}

#[cfg(test)]
pub(crate) fn test_session(catalog: Vec<CatalogEntry>) -> AuthSession {
    AuthSession {
        token: "token".to_string(),
        user_id: "u1".to_string(),
        project_id: "p1".to_string(),
        project_name: "admin".to_string(),
        roles: vec!["admin".to_string()],
        catalog,
        credentials: Credentials::new("http://keystone:5000/v3", "admin", "pw", "admin"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(service_type: &str, endpoints: &[(&str, &str, &str)]) -> CatalogEntry {
        CatalogEntry {
            service_type: service_type.to_string(),
            name: service_type.to_string(),
            endpoints: endpoints
                .iter()
                .map(|(interface, region, url)| Endpoint {
                    interface: (*interface).to_string(),
                    region: Some((*region).to_string()),
                    region_id: Some((*region).to_string()),
                    url: (*url).to_string(),
                })
                .collect(),
        }
    }

    fn catalog() -> Vec<CatalogEntry> {
        vec![
            entry(
                "volumev3",
                &[
                    ("public", "RegionOne", "http://one/v3/p1"),
                    ("internal", "RegionOne", "http://one-int/v3/p1"),
                    ("public", "RegionTwo", "http://two/v3/p1"),
                ],
            ),
            entry("baremetal", &[("public", "RegionOne", "http://ironic:6385")]),
        ]
    }

    #[test]
    fn test_endpoint_by_interface_and_region() {
        let session = test_session(catalog());

        assert_eq!(
            session
                .endpoint_for(&["volumev3"], Interface::Internal, None)
                .unwrap(),
            "http://one-int/v3/p1"
        );
        assert_eq!(
            session
                .endpoint_for(&["volumev3"], Interface::Public, Some("RegionTwo"))
                .unwrap(),
            "http://two/v3/p1"
        );
    }

    #[test]
    fn test_endpoint_falls_back_to_next_service_type() {
        let session = test_session(catalog());
        let url = session
            .endpoint_for(&["block-storage", "volumev3"], Interface::Public, None)
            .unwrap();
        assert_eq!(url, "http://one/v3/p1");
    }

    #[test]
    fn test_endpoint_missing() {
        let session = test_session(catalog());
        let err = session
            .endpoint_for(&["orchestration"], Interface::Public, None)
            .unwrap_err();
        assert!(matches!(err, ClientError::EndpointNotFound { .. }));
        assert!(err.to_string().contains("orchestration"));
    }

    #[test]
    fn test_password_request_shape() {
        let creds = Credentials::new("http://k/v3", "admin", "pw", "demo");
        let body = password_request(&creds);

        assert_eq!(body["auth"]["identity"]["methods"][0], "password");
        assert_eq!(body["auth"]["identity"]["password"]["user"]["name"], "admin");
        assert_eq!(body["auth"]["scope"]["project"]["name"], "demo");
        assert_eq!(body["auth"]["scope"]["project"]["domain"]["name"], "Default");
    }

    #[test]
    fn test_session_from_token_body() {
        let body: TokenBody = serde_json::from_value(serde_json::json!({
            "token": {
                "user": {"id": "u9", "name": "admin"},
                "project": {"id": "p9", "name": "demo"},
                "roles": [{"id": "r1", "name": "member"}],
                "catalog": [{"type": "compute", "name": "nova", "endpoints": [
                    {"interface": "public", "region_id": "RegionOne", "url": "http://nova/v2.1"}
                ]}]
            }
        }))
        .unwrap();
        let creds = Credentials::new("http://k/v3", "admin", "pw", "demo");

        let session = session_from_token("tok".into(), body.token, &creds).unwrap();

        assert_eq!(session.project_id, "p9");
        assert!(session.has_role("Member"));
        assert_eq!(
            session
                .endpoint_for(&["compute"], Interface::Public, Some("RegionOne"))
                .unwrap(),
            "http://nova/v2.1"
        );
    }

    #[test]
    fn test_unscoped_token_rejected() {
        let body: TokenBody = serde_json::from_value(serde_json::json!({
            "token": {"user": {"id": "u9"}}
        }))
        .unwrap();
        let creds = Credentials::new("http://k/v3", "admin", "pw", "demo");

        assert!(matches!(
            session_from_token("tok".into(), body.token, &creds),
            Err(ClientError::Auth(_))
        ));
    }
}
