//! HTTP client for the device REST API.
//!
//! # Example
//!
//! ```no_run
//! use smartmon_core::client::HttpDeviceClient;
//! use smartmon_core::DeviceApi;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpDeviceClient::new("http://192.168.1.20:5001/api")?;
//!
//! let settings = client.fetch_settings().await?;
//! println!("Mode: {}", settings.operation_mode);
//!
//! let readings = client.fetch_history(20).await?;
//! println!("{} readings", readings.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use smartmon_types::{OperationMode, SensorReading, SettingsRecord};

use crate::api::DeviceApi;
use crate::error::{Error, Result};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the device API.
#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct ModeRequest {
    mode: OperationMode,
}

impl HttpDeviceClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The API root, e.g. `"http://192.168.1.20:5001/api"`
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a new client with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Self::with_client(base_url, client)
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        // Normalize URL (remove trailing slash)
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {}",
                base_url
            )));
        }

        Ok(Self { client, base_url })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ======================================================================
    // Internal HTTP helpers
    // ======================================================================

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transport {
                url: url.to_string(),
                source: e,
            })?;

        let body = Self::success_body(url, response).await?;
        serde_json::from_slice(&body).map_err(|e| Error::Decode {
            url: url.to_string(),
            source: e,
        })
    }

    async fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport {
                url: url.to_string(),
                source: e,
            })?;

        // Response body is not interpreted beyond success/failure.
        Self::success_body(url, response).await.map(drop)
    }

    async fn success_body(url: &str, response: reqwest::Response) -> Result<bytes::Bytes> {
        let status = response.status();
        let body = response.bytes().await.map_err(|e| Error::Transport {
            url: url.to_string(),
            source: e,
        })?;

        if status.is_success() {
            debug!("{} -> {} ({} bytes)", url, status, body.len());
            return Ok(body);
        }

        let message = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| status.to_string());

        Err(Error::Status {
            url: url.to_string(),
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl DeviceApi for HttpDeviceClient {
    async fn fetch_history(&self, limit: usize) -> Result<Vec<SensorReading>> {
        let url = self.url(&format!("/sensor-data?limit={limit}"));
        self.get_json(&url).await
    }

    async fn fetch_settings(&self) -> Result<SettingsRecord> {
        let url = self.url("/settings");
        self.get_json(&url).await
    }

    async fn set_mode(&self, mode: OperationMode) -> Result<()> {
        let url = self.url("/mode");
        self.post_json(&url, &ModeRequest { mode }).await
    }

    async fn update_settings(&self, settings: &SettingsRecord) -> Result<()> {
        let url = self.url("/settings");
        self.post_json(&url, settings).await
    }
}
