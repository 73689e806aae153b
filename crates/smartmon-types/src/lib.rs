//! Shared data model for the smartmon sensor panel.
//!
//! This crate holds the wire types exchanged with the device API: sensor
//! samples, the settings document and its operation mode, plus the small
//! enums used to address individual metrics and settings fields.
//!
//! # Example
//!
//! ```
//! use smartmon_types::{OperationMode, SettingsRecord, ThresholdField};
//!
//! let settings = SettingsRecord::default()
//!     .with_threshold(ThresholdField::Temperature, 25.5)
//!     .with_mode(OperationMode::Manual);
//! assert_eq!(settings.operation_mode.as_str(), "MANUAL");
//! ```

pub mod error;
pub mod timestamp;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    Metric, OperationMode, SensorReading, SettingsField, SettingsRecord, ThresholdField,
};
