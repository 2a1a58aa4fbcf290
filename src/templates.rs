//! Template files shipped with the suite
//!
//! Templates live at `<root>/<service>/<name>.yaml` and are handed out as raw
//! text; parsing is left to the service receiving them.

use std::path::{Path, PathBuf};

use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template {service}/{name} not found at {}", path.display())]
    NotFound {
        service: String,
        name: String,
        path: PathBuf,
    },

    #[error("invalid template name {0:?}")]
    InvalidName(String),

    #[error("failed to read template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Loader rooted at a templates directory
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a template would be loaded from
    pub fn path(&self, service: &str, name: &str) -> Result<PathBuf, TemplateError> {
        validate(service)?;
        validate(name)?;
        Ok(self.root.join(service).join(format!("{name}.yaml")))
    }

    /// Read a template's text
    pub async fn load(&self, service: &str, name: &str) -> Result<String, TemplateError> {
        let path = self.path(service, name)?;
        debug!(path = %path.display(), "Loading template");

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => TemplateError::NotFound {
                    service: service.to_string(),
                    name: name.to_string(),
                    path: path.clone(),
                },
                _ => TemplateError::Io {
                    path: path.clone(),
                    source,
                },
            })
    }
}

fn validate(part: &str) -> Result<(), TemplateError> {
    if part.is_empty() || part.contains(['/', '\\']) || part.contains("..") {
        return Err(TemplateError::InvalidName(part.to_string()));
    }
    Ok(())
}
