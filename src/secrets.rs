// src/secrets.rs
//! Google Secret Manager access over the v1 REST API.
//!
//! `access_secret_version` returns the decoded payload of
//! `projects/{project}/secrets/{secret}/versions/{version}`. Every failure is
//! logged and propagated; nothing is swallowed here.

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

pub const DEFAULT_BASE_URL: &str = "https://secretmanager.googleapis.com";
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
pub const LATEST_VERSION: &str = "latest";

/// Refresh metadata-server tokens this long before they expire.
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("invalid secret name: {0}")]
    InvalidName(String),

    #[error("cannot obtain access token: {0}")]
    Auth(String),

    #[error("request for {name} failed: {source}")]
    Transport {
        name: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("secret manager returned {status} for {name}: {message}")]
    Status { name: String, status: u16, message: String },

    #[error("cannot decode payload of {name}: {reason}")]
    Decode { name: String, reason: String },
}

/// Where bearer tokens come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// A pre-issued token, e.g. from `gcloud auth print-access-token`.
    Static(String),
    /// The GCE / Cloud Run metadata server.
    MetadataServer { url: String },
}

impl TokenSource {
    pub fn metadata_server() -> Self {
        TokenSource::MetadataServer { url: DEFAULT_METADATA_TOKEN_URL.to_string() }
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    name: Option<String>,
    payload: Option<SecretPayload>,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

#[derive(Clone)]
pub struct SecretManagerClient {
    client: Client,
    base_url: String,
    token_source: TokenSource,
    cached_token: Arc<RwLock<Option<(String, Instant)>>>,
}

impl SecretManagerClient {
    pub fn new(client: Client, base_url: impl Into<String>, token_source: TokenSource) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_source,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Build the fully-qualified resource name of a secret version.
    /// `version_id` defaults to `latest`.
    pub fn version_name(
        project_id: &str,
        secret_id: &str,
        version_id: Option<&str>,
    ) -> Result<String, SecretError> {
        let version = version_id.unwrap_or(LATEST_VERSION);
        for (label, value) in [("project", project_id), ("secret", secret_id), ("version", version)] {
            if value.is_empty() || value.contains('/') {
                return Err(SecretError::InvalidName(format!("{} id '{}'", label, value)));
            }
        }
        Ok(format!("projects/{}/secrets/{}/versions/{}", project_id, secret_id, version))
    }

    /// Fetch and decode the payload of a secret version as UTF-8 text.
    pub async fn access_secret_version(
        &self,
        project_id: &str,
        secret_id: &str,
        version_id: Option<&str>,
    ) -> Result<String, SecretError> {
        let name = Self::version_name(project_id, secret_id, version_id)?;
        tracing::debug!(name = %name, "accessing secret version");

        let result = self.access_by_name(&name).await;
        if let Err(e) = &result {
            tracing::error!(name = %name, "secret access failed: {}", e);
        }
        result
    }

    async fn access_by_name(&self, name: &str) -> Result<String, SecretError> {
        let token = self.access_token().await?;
        let url = format!("{}/v1/{}:access", self.base_url, name);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|source| SecretError::Transport { name: name.to_string(), source })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GoogleErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| body.chars().take(200).collect());
            return Err(SecretError::Status {
                name: name.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let parsed: AccessSecretVersionResponse = resp
            .json()
            .await
            .map_err(|e| SecretError::Decode { name: name.to_string(), reason: e.to_string() })?;

        decode_payload(name, parsed)
    }

    async fn access_token(&self) -> Result<String, SecretError> {
        let url = match &self.token_source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::MetadataServer { url } => url,
        };

        if let Some((token, valid_until)) = self.cached_token.read().await.as_ref() {
            if Instant::now() < *valid_until {
                return Ok(token.clone());
            }
        }

        let resp = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| SecretError::Auth(format!("metadata server unreachable: {}", e)))?;
        if !resp.status().is_success() {
            return Err(SecretError::Auth(format!("metadata server returned {}", resp.status())));
        }
        let token: MetadataToken = resp
            .json()
            .await
            .map_err(|e| SecretError::Auth(format!("malformed metadata token: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_BUFFER);
        *self.cached_token.write().await =
            Some((token.access_token.clone(), Instant::now() + lifetime));
        tracing::debug!(expires_in = token.expires_in, "refreshed metadata access token");

        Ok(token.access_token)
    }
}

fn decode_payload(name: &str, resp: AccessSecretVersionResponse) -> Result<String, SecretError> {
    let decode_err = |reason: String| SecretError::Decode { name: name.to_string(), reason };

    let data = resp
        .payload
        .and_then(|p| p.data)
        .ok_or_else(|| decode_err("response has no payload".to_string()))?;
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| decode_err(format!("invalid base64: {}", e)))?;
    let text = String::from_utf8(bytes).map_err(|e| decode_err(format!("not UTF-8: {}", e)))?;

    if let Some(resolved) = resp.name.as_deref().filter(|n| *n != name) {
        tracing::debug!(requested = %name, resolved = %resolved, "secret version resolved");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_name_defaults_to_latest() {
        assert_eq!(
            SecretManagerClient::version_name("proj", "api-key", None).unwrap(),
            "projects/proj/secrets/api-key/versions/latest"
        );
        assert_eq!(
            SecretManagerClient::version_name("proj", "api-key", Some("5")).unwrap(),
            "projects/proj/secrets/api-key/versions/5"
        );
    }

    #[test]
    fn test_version_name_rejects_bad_ids() {
        assert!(matches!(
            SecretManagerClient::version_name("", "s", None),
            Err(SecretError::InvalidName(_))
        ));
        assert!(matches!(
            SecretManagerClient::version_name("p", "a/b", None),
            Err(SecretError::InvalidName(_))
        ));
        assert!(matches!(
            SecretManagerClient::version_name("p", "s", Some("")),
            Err(SecretError::InvalidName(_))
        ));
    }

    fn response(data: Option<&str>) -> AccessSecretVersionResponse {
        AccessSecretVersionResponse {
            name: Some("projects/p/secrets/s/versions/3".into()),
            payload: Some(SecretPayload { data: data.map(String::from) }),
        }
    }

    #[test]
    fn test_decode_payload() {
        let encoded = STANDARD.encode("s3cr3t-value");
        let text = decode_payload("projects/p/secrets/s/versions/latest", response(Some(&encoded)));
        assert_eq!(text.unwrap(), "s3cr3t-value");
    }

    #[test]
    fn test_decode_payload_errors() {
        let name = "projects/p/secrets/s/versions/latest";
        assert!(matches!(decode_payload(name, response(None)), Err(SecretError::Decode { .. })));
        assert!(matches!(
            decode_payload(name, response(Some("***not base64***"))),
            Err(SecretError::Decode { .. })
        ));
        let invalid_utf8 = STANDARD.encode([0xff, 0xfe, 0xfd]);
        assert!(matches!(
            decode_payload(name, response(Some(&invalid_utf8))),
            Err(SecretError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn test_static_token_is_used_as_is() {
        let sm = SecretManagerClient::new(
            Client::new(),
            DEFAULT_BASE_URL,
            TokenSource::Static("tok".into()),
        );
        assert_eq!(sm.access_token().await.unwrap(), "tok");
    }
}
