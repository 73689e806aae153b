//! Trait abstraction over the device HTTP API.
//!
//! [`DeviceApi`] is implemented by the real [`HttpDeviceClient`](crate::client::HttpDeviceClient)
//! and by [`MockDeviceApi`](crate::mock::MockDeviceApi), so the sync engine can be
//! exercised without a network.

use async_trait::async_trait;

use smartmon_types::{OperationMode, SensorReading, SettingsRecord};

use crate::error::Result;

/// Operations the device API offers.
///
/// # Example
///
/// ```ignore
/// use smartmon_core::{DeviceApi, Result};
///
/// async fn print_mode<A: DeviceApi>(api: &A) -> Result<()> {
///     let settings = api.fetch_settings().await?;
///     println!("mode: {}", settings.operation_mode);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// `GET /sensor-data?limit=N`: the most recent readings, in any order.
    async fn fetch_history(&self, limit: usize) -> Result<Vec<SensorReading>>;

    /// `GET /settings`: the device configuration.
    async fn fetch_settings(&self) -> Result<SettingsRecord>;

    /// `POST /mode`: switch the operation mode.
    async fn set_mode(&self, mode: OperationMode) -> Result<()>;

    /// `POST /settings`: replace the whole configuration document.
    async fn update_settings(&self, settings: &SettingsRecord) -> Result<()>;
}

#[async_trait]
impl<T: DeviceApi + ?Sized> DeviceApi for std::sync::Arc<T> {
    async fn fetch_history(&self, limit: usize) -> Result<Vec<SensorReading>> {
        (**self).fetch_history(limit).await
    }

    async fn fetch_settings(&self) -> Result<SettingsRecord> {
        (**self).fetch_settings().await
    }

    async fn set_mode(&self, mode: OperationMode) -> Result<()> {
        (**self).set_mode(mode).await
    }

    async fn update_settings(&self, settings: &SettingsRecord) -> Result<()> {
        (**self).update_settings(settings).await
    }
}
