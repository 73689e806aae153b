//! Client-side state synchronization for smartmon sensor panels.
//!
//! This crate keeps a local, display-ready mirror of a smart environmental
//! monitor: a bounded window of recent sensor readings plus the device's
//! control settings, kept in sync with the device's HTTP API.
//!
//! # Features
//!
//! - **Polling**: history and settings fetched together on a fixed interval
//! - **Optimistic edits**: mode and threshold changes are visible immediately
//! - **Reconciliation**: stale polls never overwrite newer local edits
//! - **Projection**: latest reading, per-metric chart series, actuator state
//! - **Events**: broadcast notifications for view changes and failures
//! - **Testing**: an in-memory [`MockDeviceApi`] with failure and latency injection
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use smartmon_core::{SyncConfig, SyncEngine, SyncEvent, TimeFormatter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = SyncEngine::from_config(SyncConfig::new("http://192.168.1.20:5001/api"))?;
//!     let mut events = engine.subscribe();
//!     engine.start(Duration::from_secs(5))?;
//!
//!     let formatter = TimeFormatter::local();
//!     while let Ok(event) = events.recv().await {
//!         if let SyncEvent::ViewChanged(view) = event {
//!             if let Some(reading) = view.latest_reading() {
//!                 println!(
//!                     "{:.1}°C at {}",
//!                     reading.temperature,
//!                     view.last_updated_label(&formatter)
//!                 );
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod history;
pub mod mock;
pub mod projection;
pub mod sync;
pub mod thresholds;

pub use api::DeviceApi;
pub use client::HttpDeviceClient;
pub use config::{ConfigError, FailurePolicy, SyncConfig, ValidationError};
pub use error::{Error, ErrorKind, Result};
pub use events::{EventReceiver, Operation, SyncEvent, SyncFailure};
pub use format::{TimeFormatter, format_time_label, format_value};
pub use history::{DuplicatePolicy, HistoryBuffer};
pub use mock::{MockDeviceApi, MockDeviceApiBuilder};
pub use projection::{Series, ViewState};
pub use sync::{RequestHandle, SyncEngine, SyncStats};
pub use thresholds::ActuatorState;

// Re-export the data model
pub use smartmon_types::{
    Metric, OperationMode, SensorReading, SettingsField, SettingsRecord, ThresholdField,
};
