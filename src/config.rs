// src/config.rs
//! Environment-driven configuration.
//!
//! `main` calls `dotenvy::dotenv()` first, so a local `.env` file works the
//! same as variables injected by the container platform.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FETCH_MAX_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_FORMATTER_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Default project for secret lookups (`GOOGLE_CLOUD_PROJECT`).
    pub gcp_project: Option<String>,
    /// Pre-issued OAuth access token. When absent the metadata server is used.
    pub gcp_access_token: Option<String>,
    pub secret_manager_url: String,
    pub fetch_timeout: Duration,
    pub fetch_max_bytes: usize,
    /// Allow `/api/fetch` to reach loopback / private / metadata hosts.
    pub fetch_allow_private: bool,
    pub formatter_program: String,
    pub formatter_args: Vec<String>,
    pub formatter_timeout: Duration,
    pub format_output_dir: PathBuf,
    pub expose_secrets_endpoint: bool,
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            gcp_project: None,
            gcp_access_token: None,
            secret_manager_url: crate::secrets::DEFAULT_BASE_URL.to_string(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            fetch_max_bytes: DEFAULT_FETCH_MAX_BYTES,
            fetch_allow_private: false,
            formatter_program: "black".to_string(),
            formatter_args: vec!["-q".to_string(), "-".to_string()],
            formatter_timeout: Duration::from_secs(DEFAULT_FORMATTER_TIMEOUT_SECS),
            format_output_dir: PathBuf::from("./formatted"),
            expose_secrets_endpoint: false,
            cors_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unset or empty keys
    /// fall back to defaults; malformed numbers are an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(v) => v.parse().map_err(|e| anyhow::anyhow!("invalid PORT '{}': {}", v, e))?,
            None => defaults.port,
        };
        let fetch_timeout = match get("FETCH_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse().map_err(|e| anyhow::anyhow!("invalid FETCH_TIMEOUT_SECS '{}': {}", v, e))?,
            ),
            None => defaults.fetch_timeout,
        };
        let fetch_max_bytes = match get("FETCH_MAX_BYTES") {
            Some(v) => v.parse().map_err(|e| anyhow::anyhow!("invalid FETCH_MAX_BYTES '{}': {}", v, e))?,
            None => defaults.fetch_max_bytes,
        };
        let formatter_timeout = match get("FORMATTER_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .map_err(|e| anyhow::anyhow!("invalid FORMATTER_TIMEOUT_SECS '{}': {}", v, e))?,
            ),
            None => defaults.formatter_timeout,
        };

        Ok(Self {
            port,
            gcp_project: get("GOOGLE_CLOUD_PROJECT"),
            gcp_access_token: get("GOOGLE_OAUTH_ACCESS_TOKEN"),
            secret_manager_url: get("SECRET_MANAGER_URL").unwrap_or(defaults.secret_manager_url),
            fetch_timeout,
            fetch_max_bytes,
            fetch_allow_private: get("FETCH_ALLOW_PRIVATE").is_some_and(|v| parse_bool(&v)),
            formatter_program: get("FORMATTER_PROGRAM").unwrap_or(defaults.formatter_program),
            formatter_args: get("FORMATTER_ARGS")
                .map(|v| v.split_whitespace().map(String::from).collect())
                .unwrap_or(defaults.formatter_args),
            formatter_timeout,
            format_output_dir: get("FORMAT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.format_output_dir),
            expose_secrets_endpoint: get("EXPOSE_SECRETS_ENDPOINT").is_some_and(|v| parse_bool(&v)),
            cors_origins: get("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
        })
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = from_pairs(&[]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.formatter_program, "black");
        assert_eq!(cfg.formatter_args, vec!["-q", "-"]);
        assert!(!cfg.fetch_allow_private);
        assert!(!cfg.expose_secrets_endpoint);
        assert_eq!(cfg.secret_manager_url, "https://secretmanager.googleapis.com");
    }

    #[test]
    fn test_overrides() {
        let cfg = from_pairs(&[
            ("PORT", "8000"),
            ("GOOGLE_CLOUD_PROJECT", "demo-project"),
            ("FETCH_ALLOW_PRIVATE", "TRUE"),
            ("FORMATTER_PROGRAM", "ruff"),
            ("FORMATTER_ARGS", "format  -"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.gcp_project.as_deref(), Some("demo-project"));
        assert!(cfg.fetch_allow_private);
        assert_eq!(cfg.formatter_program, "ruff");
        assert_eq!(cfg.formatter_args, vec!["format", "-"]);
        assert_eq!(cfg.cors_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let cfg = from_pairs(&[("PORT", "  "), ("GOOGLE_CLOUD_PROJECT", "")]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(cfg.gcp_project.is_none());
    }

    #[test]
    fn test_invalid_number_is_error() {
        assert!(from_pairs(&[("PORT", "eighty")]).is_err());
        assert!(from_pairs(&[("FETCH_TIMEOUT_SECS", "-1")]).is_err());
    }
}
