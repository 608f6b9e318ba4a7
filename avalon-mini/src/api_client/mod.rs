//! HTTP client for the daemon's API, used by the CLI.

pub mod types;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

use types::{DevicePatchRequest, DeviceState, EntityState};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7785";

/// Bounds the whole request, including a PATCH that waits on the device.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let url = Url::parse(&base_url).with_context(|| format!("invalid API URL {base_url:?}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("invalid API URL {base_url:?}: expected http or https");
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http, base_url })
    }

    pub async fn refresh_device(&self) -> Result<DeviceState> {
        let url = self.url("/device/refresh");
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        Ok(check(response)?.json().await?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v0{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<String> {
        let url = self.url("/health");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let response = check(response)?;
        Ok(response.text().await?)
    }

    pub async fn get_device(&self) -> Result<DeviceState> {
        self.get("/device").await
    }

    pub async fn get_entities(&self) -> Result<Vec<EntityState>> {
        self.get("/entities").await
    }

    pub async fn get_entity(&self, id: &str) -> Result<EntityState> {
        self.get(&format!("/entities/{id}")).await
    }

    pub async fn patch_device(&self, request: &DevicePatchRequest) -> Result<DeviceState> {
        let url = self.url("/device");
        let response = self
            .http
            .patch(&url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("PATCH {url}"))?;
        Ok(check(response)?.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        Ok(check(response)?.json().await?)
    }
}

/// Turn error statuses into errors that say what went wrong.
fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let reason = match status {
        StatusCode::NOT_FOUND => "not found",
        StatusCode::UNPROCESSABLE_ENTITY => "invalid request",
        StatusCode::BAD_GATEWAY => "device failed or refused the request",
        StatusCode::INTERNAL_SERVER_ERROR => "daemon error",
        _ => "request failed",
    };
    anyhow::bail!("{reason} ({status}) for {url}")
}
