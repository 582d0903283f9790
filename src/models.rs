use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub app: String,
    pub uptime_seconds: u64,
    pub formatter: String,
    pub secrets_endpoint: bool,
}

// ---------------------------------------------------------------------------
// Extract
// ---------------------------------------------------------------------------

/// `text` is any JSON value; only strings are searched for a payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub text: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub found: bool,
    /// The extracted payload; `null` both for "not found" and for a parsed
    /// JSON `null`, so check `found`.
    pub value: Value,
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FetchRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub bytes: usize,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FormatRequest {
    pub source: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatResponse {
    pub path: String,
    pub bytes: u64,
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretQuery {
    pub project: Option<String>,
    pub version: Option<String>,
}

/// Confirms a secret is readable without revealing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretCheckResponse {
    pub name: String,
    pub length: usize,
}
