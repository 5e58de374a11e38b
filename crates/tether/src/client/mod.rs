//! Client for a running intake server, located through its discovery file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use tether_server::{HOOK_TOKEN_HEADER, read_discovery};
use tether_types::DiscoveryInfo;

/// Posts to `http://127.0.0.1:<port>` with the published token.
pub struct IntakeClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl IntakeClient {
    pub fn new(info: &DiscoveryInfo, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: format!("http://127.0.0.1:{}", info.port),
            token: info.token.clone(),
        })
    }

    /// Read the discovery file and connect to the server it names.
    pub fn discover(path: &Path, timeout: Duration) -> Result<Self> {
        let info = read_discovery(path)
            .with_context(|| format!("no running server found ({})", path.display()))?;
        Self::new(&info, timeout)
    }

    /// POST a raw body; non-2xx statuses are errors.
    pub async fn post(&self, path: &str, body: String) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header(HOOK_TOKEN_HEADER, &self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", path))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} returned {}", path, status);
        }
        Ok(response)
    }

    pub async fn post_json<T: DeserializeOwned>(&self, path: &str, body: String) -> Result<T> {
        let response = self.post(path, body).await?;
        response
            .json()
            .await
            .with_context(|| format!("invalid response from {}", path))
    }
}
