//! Mock device API for testing.
//!
//! [`MockDeviceApi`] implements [`DeviceApi`] against in-memory state that
//! behaves like the real backend: history is returned newest first, posted
//! settings replace the stored document and mode changes update it in place.
//!
//! # Features
//!
//! - **Failure injection**: fail reads or writes with a transport or decode error
//! - **Transient failures**: fail the next N requests, then recover
//! - **Latency simulation**: separate delays for reads, writes and history
//! - **Request log**: counters and the documents received by `POST /settings`

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use smartmon_types::{OperationMode, SensorReading, SettingsRecord};

use crate::api::DeviceApi;
use crate::error::{Error, ErrorKind, Result};

const MOCK_URL: &str = "mock://device";

/// A mock device API for testing.
///
/// # Example
///
/// ```
/// use smartmon_core::{DeviceApi, MockDeviceApi};
/// use smartmon_types::{OperationMode, SensorReading};
///
/// #[tokio::main]
/// async fn main() {
///     let api = MockDeviceApi::builder()
///         .reading(SensorReading::new(1, 20.0, 40.0, 900))
///         .mode(OperationMode::Manual)
///         .build();
///
///     let settings = api.fetch_settings().await.unwrap();
///     assert_eq!(settings.operation_mode, OperationMode::Manual);
/// }
/// ```
#[derive(Debug)]
pub struct MockDeviceApi {
    history: RwLock<Vec<SensorReading>>,
    settings: RwLock<SettingsRecord>,
    posted: RwLock<Vec<SettingsRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_kind: RwLock<ErrorKind>,
    /// Number of requests to fail before behaving normally again.
    remaining_failures: AtomicU32,
    read_latency_ms: AtomicU64,
    write_latency_ms: AtomicU64,
    /// Extra delay for `fetch_history` only.
    history_latency_ms: AtomicU64,
    history_requests: AtomicU32,
    settings_requests: AtomicU32,
    mode_requests: AtomicU32,
    update_requests: AtomicU32,
}

impl Default for MockDeviceApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDeviceApi {
    /// Create a mock with no readings and default settings.
    pub fn new() -> Self {
        Self {
            history: RwLock::new(Vec::new()),
            settings: RwLock::new(SettingsRecord::default()),
            posted: RwLock::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_kind: RwLock::new(ErrorKind::Transport),
            remaining_failures: AtomicU32::new(0),
            read_latency_ms: AtomicU64::new(0),
            write_latency_ms: AtomicU64::new(0),
            history_latency_ms: AtomicU64::new(0),
            history_requests: AtomicU32::new(0),
            settings_requests: AtomicU32::new(0),
            mode_requests: AtomicU32::new(0),
            update_requests: AtomicU32::new(0),
        }
    }

    /// Create a builder.
    pub fn builder() -> MockDeviceApiBuilder {
        MockDeviceApiBuilder::default()
    }

    /// Replace the stored readings (kept in insertion order).
    pub async fn set_history(&self, readings: Vec<SensorReading>) {
        *self.history.write().await = readings;
    }

    /// Append one reading, as the device would after a measurement.
    pub async fn push_reading(&self, reading: SensorReading) {
        self.history.write().await.push(reading);
    }

    /// Replace the stored settings document.
    pub async fn set_settings(&self, settings: SettingsRecord) {
        *self.settings.write().await = settings;
    }

    /// The settings document as the device currently holds it.
    pub async fn settings(&self) -> SettingsRecord {
        *self.settings.read().await
    }

    /// Every document received by `update_settings`, oldest first.
    pub async fn posted_settings(&self) -> Vec<SettingsRecord> {
        self.posted.read().await.clone()
    }

    /// Make reads (`fetch_*`) fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Make writes (`set_mode`, `update_settings`) fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Kind of error produced by injected failures.
    pub async fn set_fail_kind(&self, kind: ErrorKind) {
        *self.fail_kind.write().await = kind;
    }

    /// Fail the next `count` requests of any kind, then recover.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    pub fn set_read_latency(&self, latency: Duration) {
        self.read_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn set_write_latency(&self, latency: Duration) {
        self.write_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Delay `fetch_history` on top of the read latency, so a tick can read
    /// settings early and finish late.
    pub fn set_history_latency(&self, latency: Duration) {
        self.history_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn history_requests(&self) -> u32 {
        self.history_requests.load(Ordering::Relaxed)
    }

    pub fn settings_requests(&self) -> u32 {
        self.settings_requests.load(Ordering::Relaxed)
    }

    pub fn mode_requests(&self) -> u32 {
        self.mode_requests.load(Ordering::Relaxed)
    }

    pub fn update_requests(&self) -> u32 {
        self.update_requests.load(Ordering::Relaxed)
    }

    async fn delay(latency: &AtomicU64) {
        let ms = latency.load(Ordering::Relaxed);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    async fn check_failure(&self, path: &str, flag: &AtomicBool) -> Result<()> {
        let transient = self
            .remaining_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();

        if transient || flag.load(Ordering::Relaxed) {
            let url = format!("{MOCK_URL}{path}");
            return Err(match *self.fail_kind.read().await {
                ErrorKind::Decode => Error::invalid_response(url, "mock malformed payload"),
                _ => Error::unavailable(url, "mock failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceApi for MockDeviceApi {
    async fn fetch_history(&self, limit: usize) -> Result<Vec<SensorReading>> {
        self.history_requests.fetch_add(1, Ordering::Relaxed);
        Self::delay(&self.read_latency_ms).await;
        Self::delay(&self.history_latency_ms).await;
        self.check_failure("/sensor-data", &self.fail_reads).await?;

        // Newest first, like `ORDER BY timestamp DESC LIMIT ?`.
        let history = self.history.read().await;
        Ok(history.iter().rev().take(limit).copied().collect())
    }

    async fn fetch_settings(&self) -> Result<SettingsRecord> {
        self.settings_requests.fetch_add(1, Ordering::Relaxed);
        Self::delay(&self.read_latency_ms).await;
        self.check_failure("/settings", &self.fail_reads).await?;
        Ok(*self.settings.read().await)
    }

    async fn set_mode(&self, mode: OperationMode) -> Result<()> {
        self.mode_requests.fetch_add(1, Ordering::Relaxed);
        Self::delay(&self.write_latency_ms).await;
        self.check_failure("/mode", &self.fail_writes).await?;
        self.settings.write().await.operation_mode = mode;
        Ok(())
    }

    async fn update_settings(&self, settings: &SettingsRecord) -> Result<()> {
        self.update_requests.fetch_add(1, Ordering::Relaxed);
        Self::delay(&self.write_latency_ms).await;
        self.check_failure("/settings", &self.fail_writes).await?;
        self.posted.write().await.push(*settings);
        *self.settings.write().await = *settings;
        Ok(())
    }
}

/// Builder for [`MockDeviceApi`].
#[derive(Debug, Default)]
pub struct MockDeviceApiBuilder {
    history: Vec<SensorReading>,
    settings: SettingsRecord,
    read_latency: Duration,
    write_latency: Duration,
    fail_reads: bool,
    fail_writes: bool,
}

impl MockDeviceApiBuilder {
    /// Add a reading.
    #[must_use]
    pub fn reading(mut self, reading: SensorReading) -> Self {
        self.history.push(reading);
        self
    }

    /// Add several readings.
    #[must_use]
    pub fn readings(mut self, readings: impl IntoIterator<Item = SensorReading>) -> Self {
        self.history.extend(readings);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: SettingsRecord) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: OperationMode) -> Self {
        self.settings.operation_mode = mode;
        self
    }

    #[must_use]
    pub fn temp_threshold(mut self, value: f64) -> Self {
        self.settings.temp_threshold = value;
        self
    }

    #[must_use]
    pub fn read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = latency;
        self
    }

    #[must_use]
    pub fn write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = latency;
        self
    }

    #[must_use]
    pub fn fail_reads(mut self, fail: bool) -> Self {
        self.fail_reads = fail;
        self
    }

    #[must_use]
    pub fn fail_writes(mut self, fail: bool) -> Self {
        self.fail_writes = fail;
        self
    }

    /// Build the mock.
    #[must_use]
    pub fn build(self) -> MockDeviceApi {
        let mut api = MockDeviceApi::new();
        *api.history.get_mut() = self.history;
        *api.settings.get_mut() = self.settings;
        api.fail_reads.store(self.fail_reads, Ordering::Relaxed);
        api.fail_writes.store(self.fail_writes, Ordering::Relaxed);
        api.set_read_latency(self.read_latency);
        api.set_write_latency(self.write_latency);
        api
    }
}
