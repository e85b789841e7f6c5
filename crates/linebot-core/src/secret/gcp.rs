use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use super::SecretProvider;
use crate::error::SecretError;
use crate::gcp::AccessTokenSource;
use crate::util::http;

const SECRET_MANAGER_API: &str = "https://secretmanager.googleapis.com/v1";

/// GCP Secret Manager client (REST, `versions/latest:access`).
pub struct GcpSecretManager {
    project_id: String,
    api_base: String,
    tokens: AccessTokenSource,
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    #[serde(default)]
    data: String,
}

impl GcpSecretManager {
    pub fn new(project_id: String, api_base: Option<String>, tokens: AccessTokenSource) -> Self {
        let base = api_base.unwrap_or_else(|| SECRET_MANAGER_API.to_string());
        Self {
            project_id,
            api_base: base.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Resource name of the latest version of a secret.
    pub fn latest_version_name(&self, secret_name: &str) -> String {
        format!(
            "projects/{}/secrets/{}/versions/latest",
            self.project_id, secret_name
        )
    }
}

/// Decode the base64 payload of an `AccessSecretVersion` response.
fn decode_payload(body: &str) -> Result<String, SecretError> {
    let resp: AccessSecretVersionResponse =
        serde_json::from_str(body).map_err(|e| SecretError::Decode(e.to_string()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(resp.payload.data.as_bytes())
        .map_err(|e| SecretError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SecretError::Decode(e.to_string()))
}

#[async_trait]
impl SecretProvider for GcpSecretManager {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let url = format!("{}/{}:access", self.api_base, self.latest_version_name(name));
        let token = self.tokens.token().await?;

        debug!("Accessing secret {}", name);

        let resp = http::client()
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound(name.to_string()));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SecretError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        decode_payload(&body)
    }

    fn backend_name(&self) -> &str {
        "gcp-secret-manager"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_version_name() {
        let sm = GcpSecretManager::new(
            "my-project".to_string(),
            None,
            AccessTokenSource::fixed("t"),
        );
        assert_eq!(
            sm.latest_version_name("line-channel-secret"),
            "projects/my-project/secrets/line-channel-secret/versions/latest"
        );
    }

    #[test]
    fn test_decode_payload() {
        // "hello-secret" base64-encoded
        let body = r#"{
            "name": "projects/1/secrets/x/versions/3",
            "payload": { "data": "aGVsbG8tc2VjcmV0", "dataCrc32c": "123" }
        }"#;
        assert_eq!(decode_payload(body).unwrap(), "hello-secret");
    }

    #[test]
    fn test_decode_payload_bad_base64() {
        let body = r#"{ "payload": { "data": "!!!" } }"#;
        assert!(matches!(decode_payload(body), Err(SecretError::Decode(_))));
    }

    #[test]
    fn test_decode_payload_missing_payload() {
        assert!(matches!(decode_payload("{}"), Err(SecretError::Decode(_))));
    }
}
