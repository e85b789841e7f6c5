use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::AuthError;
use crate::util::http;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the metadata server says they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Source of OAuth2 bearer tokens for Google APIs.
///
/// On Cloud Run / Cloud Functions the token comes from the instance metadata
/// server. `GCP_ACCESS_TOKEN` overrides it for local runs
/// (`GCP_ACCESS_TOKEN=$(gcloud auth print-access-token)`).
pub struct AccessTokenSource {
    kind: TokenKind,
    cached: Mutex<Option<CachedToken>>,
}

enum TokenKind {
    Fixed(String),
    Metadata { url: String },
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

impl AccessTokenSource {
    /// A token that never changes.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Fixed(token.into()),
            cached: Mutex::new(None),
        }
    }

    /// Fetch tokens from the metadata server at `url`.
    pub fn metadata(url: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Metadata { url: url.into() },
            cached: Mutex::new(None),
        }
    }

    /// `GCP_ACCESS_TOKEN` if set, otherwise the default metadata endpoint.
    pub fn from_env() -> Self {
        match std::env::var("GCP_ACCESS_TOKEN") {
            Ok(token) if !token.is_empty() => Self::fixed(token),
            _ => Self::metadata(METADATA_TOKEN_URL),
        }
    }

    /// Get a bearer token, fetching a fresh one when the cached one is stale.
    pub async fn token(&self) -> Result<String, AuthError> {
        let url = match &self.kind {
            TokenKind::Fixed(token) => return Ok(token.clone()),
            TokenKind::Metadata { url } => url,
        };

        let mut cached = self.cached.lock().await;
        if let Some(ref c) = *cached {
            if Instant::now() < c.refresh_at {
                return Ok(c.token.clone());
            }
        }

        let resp = http::client()
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AuthError::Metadata {
                status: status.as_u16(),
                message,
            });
        }

        let fresh: MetadataToken = resp.json().await?;
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(REFRESH_MARGIN);
        debug!("Fetched GCP access token (valid for {:?})", lifetime);

        *cached = Some(CachedToken {
            token: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(fresh.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_token() {
        let source = AccessTokenSource::fixed("ya29.test");
        assert_eq!(source.token().await.unwrap(), "ya29.test");
    }

    #[test]
    fn test_metadata_token_parse() {
        let json = r#"{"access_token":"ya29.abc","expires_in":3599,"token_type":"Bearer"}"#;
        let token: MetadataToken = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "ya29.abc");
        assert_eq!(token.expires_in, 3599);
    }

    #[tokio::test]
    async fn test_metadata_unreachable_is_error() {
        // Port 9 (discard) on localhost is not an HTTP server.
        let source = AccessTokenSource::metadata("http://127.0.0.1:9/token");
        assert!(source.token().await.is_err());
    }
}
