// src/fetch.rs
//! HTTP content fetching.
//!
//! A single GET per call, no retries. Non-2xx responses and transport
//! failures are logged with the URL and returned as [`FetchError`].
//!
//! Under a restricted policy every redirect hop is validated like the
//! original URL, and the body is read chunk by chunk so the size limit holds
//! for streamed responses without a `Content-Length`.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use reqwest::redirect::{Attempt, Policy};
use reqwest::{Client, ClientBuilder};
use url::Url;

const FETCH_USER_AGENT: &str = concat!("agentdemo-backend/", env!("CARGO_PKG_VERSION"));

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("blocked host '{host}' in {url}")]
    BlockedHost { url: String, host: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error("cannot read body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        match self {
            FetchError::Transport { source, .. } | FetchError::Body { source, .. } => {
                source.is_timeout()
            }
            _ => false,
        }
    }
}

/// Limits applied to a fetch.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Permit loopback, private, link-local and cloud metadata hosts.
    pub allow_private: bool,
    pub max_body_bytes: usize,
    pub timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            allow_private: true,
            max_body_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

impl FetchPolicy {
    /// Policy for requests that originate from untrusted callers.
    pub fn restricted(max_body_bytes: usize, timeout: Duration) -> Self {
        Self { allow_private: false, max_body_bytes, timeout }
    }
}

/// Parse `raw` and check it against `policy`.
pub fn validate_url(raw: &str, policy: &FetchPolicy) -> Result<Url, FetchError> {
    let parsed = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(FetchError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}', only http/https", other),
            });
        }
    }
    if !policy.allow_private {
        if let Some(host) = parsed.host_str() {
            if is_private_host(host) {
                return Err(FetchError::BlockedHost {
                    url: raw.to_string(),
                    host: host.to_string(),
                });
            }
        }
    }
    Ok(parsed)
}

/// Client builder for fetches under `policy`. Restricted policies re-run
/// [`validate_url`] on each redirect target and stop at the first blocked hop.
pub fn client_builder(policy: &FetchPolicy) -> ClientBuilder {
    let redirect = if policy.allow_private {
        Policy::limited(MAX_REDIRECTS)
    } else {
        Policy::custom(guard_redirect)
    };
    Client::builder()
        .redirect(redirect)
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(10)
}

pub fn build_client(policy: &FetchPolicy) -> reqwest::Result<Client> {
    client_builder(policy).build()
}

fn guard_redirect(attempt: Attempt) -> reqwest::redirect::Action {
    if attempt.previous().len() >= MAX_REDIRECTS {
        return attempt.error("too many redirects");
    }
    let policy = FetchPolicy { allow_private: false, ..FetchPolicy::default() };
    match validate_url(attempt.url().as_str(), &policy) {
        Ok(_) => attempt.follow(),
        Err(e) => {
            tracing::warn!(target_url = %attempt.url(), "redirect rejected: {}", e);
            attempt.error(e)
        }
    }
}

/// Recover a [`FetchError::BlockedHost`] raised inside the redirect policy.
fn blocked_redirect(err: &reqwest::Error) -> Option<FetchError> {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if let Some(FetchError::BlockedHost { url, host }) = e.downcast_ref::<FetchError>() {
            return Some(FetchError::BlockedHost { url: url.clone(), host: host.clone() });
        }
        source = e.source();
    }
    None
}

fn is_private_v4(v4: Ipv4Addr) -> bool {
    v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
}

fn is_private_host(host: &str) -> bool {
    let lower = host.trim_start_matches('[').trim_end_matches(']').to_lowercase();
    if lower == "localhost"
        || lower.ends_with(".localhost")
        || lower == "metadata.google.internal"
        || lower.ends_with(".internal")
    {
        return true;
    }
    match lower.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => is_private_v4(v4),
        Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private_v4(v4),
            None => {
                let first = v6.segments()[0];
                v6.is_loopback()
                    || v6.is_unspecified()
                    // fc00::/7 unique local, fe80::/10 link local
                    || (first & 0xfe00) == 0xfc00
                    || (first & 0xffc0) == 0xfe80
            }
        },
        Err(_) => false,
    }
}

/// GET `url` with the default policy and return the decoded body text.
pub async fn fetch_url_content(client: &Client, url: &str) -> Result<String, FetchError> {
    fetch_with_policy(client, url, &FetchPolicy::default()).await
}

/// GET `url` under `policy` and return the decoded body text.
///
/// Pass a client from [`build_client`] so restricted policies also cover
/// intermediate redirect hops; the final URL is re-checked regardless.
pub async fn fetch_with_policy(
    client: &Client,
    url: &str,
    policy: &FetchPolicy,
) -> Result<String, FetchError> {
    let result = fetch_inner(client, url, policy).await;
    match &result {
        Ok(body) => tracing::info!(url = %url, bytes = body.len(), "fetched content"),
        Err(FetchError::Status { status, .. }) => {
            tracing::error!(url = %url, status = *status, "HTTP error while fetching URL")
        }
        Err(e) => tracing::error!(url = %url, "error fetching URL: {}", e),
    }
    result
}

async fn fetch_inner(client: &Client, url: &str, policy: &FetchPolicy) -> Result<String, FetchError> {
    let parsed = validate_url(url, policy)?;

    let mut resp = client
        .get(parsed.as_str())
        .header("User-Agent", FETCH_USER_AGENT)
        .timeout(policy.timeout)
        .send()
        .await
        .map_err(|source| match blocked_redirect(&source) {
            Some(blocked) => blocked,
            None => FetchError::Transport { url: url.to_string(), source },
        })?;

    if resp.url() != &parsed {
        validate_url(resp.url().as_str(), policy)?;
    }

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
    }

    let too_large = || FetchError::TooLarge { url: url.to_string(), limit: policy.max_body_bytes };
    if resp.content_length().is_some_and(|len| len > policy.max_body_bytes as u64) {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|source| FetchError::Body { url: url.to_string(), source })?
    {
        if body.len() + chunk.len() > policy.max_body_bytes {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}
