use tracing::{error, info};

use crate::config::SecretsConfig;
use crate::secret::SecretProvider;

/// Credentials resolved once at cold start.
///
/// `None` means the secret could not be fetched or was empty. Nothing here is
/// re-fetched for the lifetime of the process.
#[derive(Clone, Default)]
pub struct Credentials {
    pub channel_access_token: Option<String>,
    pub channel_secret: Option<String>,
    pub completion_api_key: Option<String>,
}

/// The two LINE credentials the webhook cannot run without.
#[derive(Clone)]
pub struct LineCredentials {
    pub channel_access_token: String,
    pub channel_secret: String,
}

impl Credentials {
    /// Fetch the three named secrets. Failures are logged, never retried.
    pub async fn bootstrap(provider: &dyn SecretProvider, names: &SecretsConfig) -> Self {
        info!("Loading credentials from {}", provider.backend_name());

        let creds = Self {
            channel_access_token: fetch(provider, &names.channel_access_token).await,
            channel_secret: fetch(provider, &names.channel_secret).await,
            completion_api_key: fetch(provider, &names.completion_api_key).await,
        };

        if creds.line().is_none() {
            error!("LINE credentials not found; webhook will reject all requests");
        }
        if creds.completion_api_key.is_none() {
            error!("Completion API key not found; replies will use the fallback message");
        }
        creds
    }

    /// LINE credentials, if both are present.
    pub fn line(&self) -> Option<LineCredentials> {
        match (&self.channel_access_token, &self.channel_secret) {
            (Some(token), Some(secret)) => Some(LineCredentials {
                channel_access_token: token.clone(),
                channel_secret: secret.clone(),
            }),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<missing>" };
        f.debug_struct("Credentials")
            .field("channel_access_token", &mask(&self.channel_access_token))
            .field("channel_secret", &mask(&self.channel_secret))
            .field("completion_api_key", &mask(&self.completion_api_key))
            .finish()
    }
}

async fn fetch(provider: &dyn SecretProvider, name: &str) -> Option<String> {
    match provider.get_secret(name).await {
        Ok(value) => {
            let value = value.trim();
            if value.is_empty() {
                error!("Secret {} is empty", name);
                None
            } else {
                Some(value.to_string())
            }
        }
        Err(e) => {
            error!("Failed to get secret {}: {}", name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::StaticSecretProvider;

    fn names() -> SecretsConfig {
        SecretsConfig::default()
    }

    #[tokio::test]
    async fn test_bootstrap_all_present() {
        let provider = StaticSecretProvider::new()
            .with("line-channel-access-token", "token")
            .with("line-channel-secret", "secret\n")
            .with("openai-api-key", "sk-test");

        let creds = Credentials::bootstrap(&provider, &names()).await;
        let line = creds.line().unwrap();
        assert_eq!(line.channel_access_token, "token");
        assert_eq!(line.channel_secret, "secret");
        assert_eq!(creds.completion_api_key.as_deref(), Some("sk-test"));
    }

    #[tokio::test]
    async fn test_bootstrap_missing_line_secret() {
        let provider = StaticSecretProvider::new()
            .with("line-channel-access-token", "token")
            .with("openai-api-key", "sk-test");

        let creds = Credentials::bootstrap(&provider, &names()).await;
        assert!(creds.line().is_none());
        assert!(creds.completion_api_key.is_some());
    }

    #[tokio::test]
    async fn test_bootstrap_empty_value_is_missing() {
        let provider = StaticSecretProvider::new()
            .with("line-channel-access-token", "  ")
            .with("line-channel-secret", "secret");

        let creds = Credentials::bootstrap(&provider, &names()).await;
        assert!(creds.channel_access_token.is_none());
        assert!(creds.line().is_none());
        assert!(creds.completion_api_key.is_none());
    }

    #[test]
    fn test_debug_masks_values() {
        let creds = Credentials {
            channel_access_token: Some("very-secret".into()),
            channel_secret: None,
            completion_api_key: None,
        };
        let out = format!("{creds:?}");
        assert!(!out.contains("very-secret"));
        assert!(out.contains("<set>"));
        assert!(out.contains("<missing>"));
    }
}
