//! Device directory client
//!
//! Read-only paged fetch of the registered devices from the hub's REST API
//! (`GET {base_url}/devices?page=N&page_size=M`). Only the CLI `devices`
//! command uses it; the connection core never does.

use crate::config::DirectorySection;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// A registered sensor device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One page of the device list; pagination metadata is ignored
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DevicesPage {
    #[serde(default)]
    pub data: Vec<Device>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Invalid directory URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Directory request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Directory returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode device list: {0}")]
    Decode(String),
}

#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Fetch one page (1-based)
    async fn fetch_page(&self, page: u32) -> Result<DevicesPage, DirectoryError>;
}

/// [`DeviceDirectory`] backed by the hub's HTTP API
#[derive(Debug, Clone)]
pub struct HttpDeviceDirectory {
    client: Client,
    devices_url: Url,
    page_size: u32,
}

impl HttpDeviceDirectory {
    pub fn new(config: &DirectorySection) -> Result<Self, DirectoryError> {
        let devices_url = devices_url(&config.base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            devices_url,
            page_size: config.page_size,
        })
    }

    pub fn devices_url(&self) -> &Url {
        &self.devices_url
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

/// Join `devices` onto the base URL, treating the base as a directory
fn devices_url(base_url: &str) -> Result<Url, DirectoryError> {
    let invalid = |reason: String| DirectoryError::InvalidUrl {
        url: base_url.to_string(),
        reason,
    };

    let mut base = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join("devices").map_err(|e| invalid(e.to_string()))
}

#[async_trait]
impl DeviceDirectory for HttpDeviceDirectory {
    async fn fetch_page(&self, page: u32) -> Result<DevicesPage, DirectoryError> {
        let page = page.max(1);
        debug!(url = %self.devices_url, page, page_size = self.page_size, "Fetching devices");

        let response = self
            .client
            .get(self.devices_url.clone())
            .query(&[("page", page), ("page_size", self.page_size)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Device directory request rejected");
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| DirectoryError::Decode(e.to_string()))
    }
}
