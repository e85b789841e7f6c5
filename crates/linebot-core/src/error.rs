#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Secret store error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode secret payload: {0}")]
    Decode(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No API key configured for provider")]
    NoApiKey,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LINE API error ({status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Warehouse API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Row insert errors: {0}")]
    InsertErrors(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
}

/// Failure to obtain a GCP access token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Metadata server error ({status}): {message}")]
    Metadata { status: u16, message: String },
}

/// Failures of the webhook dispatch path.
///
/// `InvalidSignature` is kept apart from everything else: the entrypoint
/// answers it with 400, every other variant with 500.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Failed to read webhook body: {0}")]
    Body(String),

    #[error("Failed to parse webhook body: {0}")]
    Parse(#[from] serde_json::Error),
}
