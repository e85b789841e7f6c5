use async_trait::async_trait;

use super::SecretProvider;
use crate::error::SecretError;

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads secrets from the process environment.
///
/// `line-channel-secret` is looked up as `LINE_CHANNEL_SECRET`.
pub struct EnvSecretProvider {
    lookup: Lookup,
}

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self::with_lookup(|var| std::env::var(var).ok())
    }

    /// Resolve variables through `lookup` instead of the process environment.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }
}

impl Default for EnvSecretProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a secret name to its environment variable name.
pub fn env_var_name(secret_name: &str) -> String {
    secret_name
        .chars()
        .map(|c| match c {
            '-' | '.' | '/' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let var = env_var_name(name);
        (self.lookup)(&var).ok_or(SecretError::NotFound(var))
    }

    fn backend_name(&self) -> &str {
        "env"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("line-channel-secret"), "LINE_CHANNEL_SECRET");
        assert_eq!(env_var_name("openai-api-key"), "OPENAI_API_KEY");
        assert_eq!(env_var_name("a.b/c"), "A_B_C");
    }

    fn provider() -> EnvSecretProvider {
        EnvSecretProvider::with_lookup(|var| match var {
            "LINE_CHANNEL_SECRET" => Some("from-env".to_string()),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_env_provider_reads_var() {
        let value = provider().get_secret("line-channel-secret").await.unwrap();
        assert_eq!(value, "from-env");
    }

    #[tokio::test]
    async fn test_env_provider_missing() {
        let err = provider().get_secret("openai-api-key").await.unwrap_err();
        assert!(matches!(err, SecretError::NotFound(var) if var == "OPENAI_API_KEY"));
    }
}
