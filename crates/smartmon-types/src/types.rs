//! Core types for smart-home sensor data and device settings.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Control mode of the device.
///
/// Serializes as the upper-case strings used on the wire (`"AUTO"`, `"MANUAL"`, `"OFF"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum OperationMode {
    /// The device drives its actuators from the configured thresholds.
    #[default]
    Auto,
    /// The operator drives the actuators directly.
    Manual,
    /// All actuators are held off.
    Off,
}

impl OperationMode {
    /// All modes, in the order a mode selector presents them.
    pub const ALL: [OperationMode; 3] = [Self::Auto, Self::Manual, Self::Off];

    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Auto => "AUTO",
            OperationMode::Manual => "MANUAL",
            OperationMode::Off => "OFF",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationMode {
    type Err = ParseError;

    /// Parse a mode name, case-insensitively.
    ///
    /// ```
    /// use smartmon_types::OperationMode;
    ///
    /// assert_eq!("manual".parse::<OperationMode>(), Ok(OperationMode::Manual));
    /// assert!("turbo".parse::<OperationMode>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(OperationMode::Auto),
            "MANUAL" => Ok(OperationMode::Manual),
            "OFF" => Ok(OperationMode::Off),
            _ => Err(ParseError::InvalidMode(s.to_string())),
        }
    }
}

/// A measured quantity that can be charted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Metric {
    /// Air temperature in degrees Celsius.
    Temperature,
    /// Soil moisture percentage (the `humidity` column on the wire).
    Moisture,
    /// Raw light sensor level.
    Light,
}

impl Metric {
    /// All metrics.
    pub const ALL: [Metric; 3] = [Self::Temperature, Self::Moisture, Self::Light];

    /// Display unit suffix.
    #[must_use]
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Moisture => "%",
            Metric::Light => "",
        }
    }

    /// The threshold that governs this metric.
    #[must_use]
    pub fn threshold_field(&self) -> ThresholdField {
        match self {
            Metric::Temperature => ThresholdField::Temperature,
            Metric::Moisture => ThresholdField::Moisture,
            Metric::Light => ThresholdField::Light,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Temperature => write!(f, "Temperature"),
            Metric::Moisture => write!(f, "Soil Moisture"),
            Metric::Light => write!(f, "Light Level"),
        }
    }
}

impl FromStr for Metric {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temperature" | "temp" => Ok(Metric::Temperature),
            "moisture" | "humidity" => Ok(Metric::Moisture),
            "light" | "light_level" => Ok(Metric::Light),
            _ => Err(ParseError::UnknownField(s.to_string())),
        }
    }
}

/// One sample reported by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorReading {
    /// Capture time in epoch milliseconds.
    #[cfg_attr(feature = "serde", serde(with = "crate::timestamp::epoch_millis"))]
    pub timestamp: i64,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Soil moisture percentage.
    pub humidity: f64,
    /// Raw light sensor level.
    pub light_level: i32,
}

impl SensorReading {
    /// Create a reading.
    #[must_use]
    pub fn new(timestamp: i64, temperature: f64, humidity: f64, light_level: i32) -> Self {
        Self {
            timestamp,
            temperature,
            humidity,
            light_level,
        }
    }

    /// Value of a single metric.
    #[must_use]
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Moisture => self.humidity,
            Metric::Light => f64::from(self.light_level),
        }
    }
}

/// One of the per-metric thresholds an operator can edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThresholdField {
    /// `temp_threshold`
    #[cfg_attr(feature = "serde", serde(rename = "temp_threshold"))]
    Temperature,
    /// `moisture_threshold`
    #[cfg_attr(feature = "serde", serde(rename = "moisture_threshold"))]
    Moisture,
    /// `light_threshold`
    #[cfg_attr(feature = "serde", serde(rename = "light_threshold"))]
    Light,
}

impl ThresholdField {
    /// All threshold fields.
    pub const ALL: [ThresholdField; 3] = [Self::Temperature, Self::Moisture, Self::Light];

    /// Key used in the settings document.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            ThresholdField::Temperature => "temp_threshold",
            ThresholdField::Moisture => "moisture_threshold",
            ThresholdField::Light => "light_threshold",
        }
    }

    /// Whether the field holds an integer on the wire.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        !matches!(self, ThresholdField::Temperature)
    }
}

impl From<ThresholdField> for SettingsField {
    fn from(field: ThresholdField) -> Self {
        match field {
            ThresholdField::Temperature => SettingsField::TempThreshold,
            ThresholdField::Moisture => SettingsField::MoistureThreshold,
            ThresholdField::Light => SettingsField::LightThreshold,
        }
    }
}

impl fmt::Display for ThresholdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ThresholdField {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "temp_threshold" => Ok(ThresholdField::Temperature),
            "moisture_threshold" => Ok(ThresholdField::Moisture),
            "light_threshold" => Ok(ThresholdField::Light),
            _ => Err(ParseError::UnknownField(s.to_string())),
        }
    }
}

/// Any individually editable field of [`SettingsRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingsField {
    TempThreshold,
    MoistureThreshold,
    LightThreshold,
    OperationMode,
}

impl SettingsField {
    pub const ALL: [SettingsField; 4] = [
        Self::TempThreshold,
        Self::MoistureThreshold,
        Self::LightThreshold,
        Self::OperationMode,
    ];

    /// Dense index, for per-field tables.
    #[must_use]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Key used in the settings document.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            SettingsField::TempThreshold => "temp_threshold",
            SettingsField::MoistureThreshold => "moisture_threshold",
            SettingsField::LightThreshold => "light_threshold",
            SettingsField::OperationMode => "operation_mode",
        }
    }
}

impl fmt::Display for SettingsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The device's configuration document.
///
/// The device API only accepts whole documents, so edits are expressed as
/// "copy of the current record with one field changed".
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SettingsRecord {
    /// Fan threshold in degrees Celsius.
    pub temp_threshold: f64,
    /// Watering threshold (moisture percentage).
    pub moisture_threshold: i32,
    /// Lamp threshold (raw light level).
    pub light_threshold: i32,
    /// Active control mode.
    pub operation_mode: OperationMode,
}

impl Default for SettingsRecord {
    /// The values the device backend seeds on first run.
    fn default() -> Self {
        Self {
            temp_threshold: 23.0,
            moisture_threshold: 50,
            light_threshold: 1200,
            operation_mode: OperationMode::Auto,
        }
    }
}

impl SettingsRecord {
    /// Threshold value as a float, regardless of wire type.
    #[must_use]
    pub fn threshold(&self, field: ThresholdField) -> f64 {
        match field {
            ThresholdField::Temperature => self.temp_threshold,
            ThresholdField::Moisture => f64::from(self.moisture_threshold),
            ThresholdField::Light => f64::from(self.light_threshold),
        }
    }

    /// Copy of this record with one threshold replaced.
    ///
    /// Integer fields are rounded to the nearest whole number and saturate
    /// at the `i32` bounds.
    ///
    /// ```
    /// use smartmon_types::{SettingsRecord, ThresholdField};
    ///
    /// let base = SettingsRecord::default();
    /// let edited = base.with_threshold(ThresholdField::Moisture, 41.6);
    /// assert_eq!(edited.moisture_threshold, 42);
    /// assert_eq!(edited.temp_threshold, base.temp_threshold);
    /// ```
    #[must_use]
    pub fn with_threshold(mut self, field: ThresholdField, value: f64) -> Self {
        match field {
            ThresholdField::Temperature => self.temp_threshold = value,
            ThresholdField::Moisture => self.moisture_threshold = value.round() as i32,
            ThresholdField::Light => self.light_threshold = value.round() as i32,
        }
        self
    }

    /// Copy of this record with a different mode.
    #[must_use]
    pub fn with_mode(mut self, mode: OperationMode) -> Self {
        self.operation_mode = mode;
        self
    }

    /// Overwrite one field with the value held by `other`.
    pub fn copy_field(&mut self, other: &SettingsRecord, field: SettingsField) {
        match field {
            SettingsField::TempThreshold => self.temp_threshold = other.temp_threshold,
            SettingsField::MoistureThreshold => self.moisture_threshold = other.moisture_threshold,
            SettingsField::LightThreshold => self.light_threshold = other.light_threshold,
            SettingsField::OperationMode => self.operation_mode = other.operation_mode,
        }
    }
}
