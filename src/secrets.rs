use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tokio::time::Duration;

use crate::errors::{AppError, AppResult};

pub const ACCESS_KEY_ID_FIELD: &str = "ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_FIELD: &str = "SECRET_ACCESS_KEY";

const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com";
const METADATA_URL: &str = "http://metadata.google.internal";
const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Source of the raw secret payload holding the storage credentials.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Raw payload of `resource` (`projects/<p>/secrets/<s>/versions/<v>`).
    async fn access_secret(&self, resource: &str) -> AppResult<Vec<u8>>;
}

#[derive(Clone, PartialEq)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

impl StorageCredentials {
    /// Decode the secret payload: a JSON object with both key fields as strings.
    pub fn from_secret_payload(payload: &[u8]) -> AppResult<Self> {
        let fields: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(payload)?;

        let field = |key: &str| -> AppResult<String> {
            fields
                .get(key)
                .and_then(|v| v.as_str())
                .map(|v| v.to_string())
                .ok_or_else(|| AppError::missing_secret_key(key))
        };

        Ok(Self {
            access_key_id: field(ACCESS_KEY_ID_FIELD)?,
            secret_access_key: field(SECRET_ACCESS_KEY_FIELD)?,
        })
    }
}

/// Fetch and decode the storage credentials in one step.
pub async fn resolve_credentials(
    store: &dyn SecretStore,
    resource: &str,
) -> AppResult<StorageCredentials> {
    let payload = store.access_secret(resource).await?;
    StorageCredentials::from_secret_payload(&payload)
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Secret Manager REST client.
///
/// Uses `GOOGLE_OAUTH_ACCESS_TOKEN` when present, otherwise asks the compute
/// metadata server for the default service account's token.
pub struct SecretManagerClient {
    client: Client,
    base_url: String,
    metadata_url: String,
    static_token: Option<String>,
}

impl SecretManagerClient {
    pub fn new() -> AppResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: SECRET_MANAGER_URL.to_string(),
            metadata_url: METADATA_URL.to_string(),
            static_token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_metadata_url(mut self, metadata_url: &str) -> Self {
        self.metadata_url = metadata_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.static_token = Some(token.to_string());
        self
    }

    async fn access_token(&self) -> AppResult<String> {
        if let Some(token) = &self.static_token {
            return Ok(token.clone());
        }

        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.metadata_url
        );
        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AppError::secret_access(format!("metadata server unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::secret_access(format!(
                "metadata server returned {}",
                status
            )));
        }

        let token: MetadataToken = response.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl SecretStore for SecretManagerClient {
    async fn access_secret(&self, resource: &str) -> AppResult<Vec<u8>> {
        let token = self.access_token().await?;
        let url = format!("{}/v1/{}:access", self.base_url, resource);

        log::debug!("Accessing secret {}", resource);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::secret_access(format!("{}: {}", resource, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::secret_access(format!(
                "{} returned {}: {}",
                resource, status, body
            )));
        }

        let body: AccessSecretVersionResponse = response.json().await?;
        let payload = base64::engine::general_purpose::STANDARD.decode(body.payload.data)?;
        Ok(payload)
    }
}
