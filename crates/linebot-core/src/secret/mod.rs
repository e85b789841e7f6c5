pub mod env;
pub mod gcp;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::{Config, SecretBackend};
use crate::error::SecretError;
use crate::gcp::AccessTokenSource;

/// Trait for secret stores.
///
/// Returns the current (latest) value of a named secret.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;

    /// Short label for logs.
    fn backend_name(&self) -> &str;
}

/// Create the secret provider selected by the config.
pub fn create_secret_provider(config: &Config) -> Box<dyn SecretProvider> {
    match config.secrets.backend {
        SecretBackend::Gcp => Box::new(gcp::GcpSecretManager::new(
            config.project_id.clone(),
            None,
            AccessTokenSource::from_env(),
        )),
        SecretBackend::Env => Box::new(env::EnvSecretProvider::new()),
    }
}

/// In-memory secret store, for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, String>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }

    fn backend_name(&self) -> &str {
        "static"
    }
}
