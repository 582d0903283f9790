// src/state.rs
//! Application state shared by all handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;

use crate::config::AppConfig;
use crate::fetch::{self, FetchPolicy};
use crate::formatter::SourceFormatter;
use crate::secrets::{SecretManagerClient, TokenSource};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub client: Client,
    /// Client for `/api/fetch`; redirects are validated against `fetch_policy`.
    pub fetch_client: Client,
    pub secrets: SecretManagerClient,
    pub formatter: SourceFormatter,
    pub fetch_policy: FetchPolicy,
    pub start_time: Instant,
    /// `true` once startup checks have completed.
    pub ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()?;

        let token_source = match &config.gcp_access_token {
            Some(token) => TokenSource::Static(token.clone()),
            None => TokenSource::metadata_server(),
        };
        let secrets =
            SecretManagerClient::new(client.clone(), config.secret_manager_url.clone(), token_source);

        let formatter = SourceFormatter::new(
            config.formatter_program.clone(),
            config.formatter_args.clone(),
            config.formatter_timeout,
        );

        let fetch_policy = FetchPolicy {
            allow_private: config.fetch_allow_private,
            max_body_bytes: config.fetch_max_bytes,
            timeout: config.fetch_timeout,
        };
        let fetch_client = fetch::build_client(&fetch_policy)?;

        Ok(Self {
            config: Arc::new(config),
            client,
            fetch_client,
            secrets,
            formatter,
            fetch_policy,
            start_time: Instant::now(),
            ready: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
        tracing::info!("Backend marked as READY");
    }
}
