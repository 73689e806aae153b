//! Expected actuator state derived from a reading and the device settings.
//!
//! In `AUTO` mode the device firmware drives a fan from the temperature
//! threshold and a grow lamp from the light threshold. Evaluating the same
//! rules client-side lets the panel show what the device should currently be
//! doing without an extra endpoint.
//!
//! The firmware only displays the moisture threshold. `watering` is a
//! panel-side hint computed from it, not a mirrored actuator.
//!
//! # Example
//!
//! ```
//! use smartmon_core::thresholds::{ActuatorState, evaluate};
//! use smartmon_types::{SensorReading, SettingsRecord};
//!
//! let settings = SettingsRecord::default(); // 23.0 °C / 50 % / 1200, AUTO
//! let reading = SensorReading::new(1, 25.0, 60.0, 900);
//!
//! let state = evaluate(&reading, &settings);
//! assert_eq!(state.fan, Some(true));
//! assert_eq!(state.lamp, Some(true));
//! assert_eq!(state.watering, Some(false));
//! ```

use serde::{Deserialize, Serialize};

use smartmon_types::{OperationMode, SensorReading, SettingsRecord};

/// What each actuator is expected to be doing.
///
/// `None` means the state is not determined by the thresholds (manual mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActuatorState {
    /// Cooling fan, on above the temperature threshold.
    pub fan: Option<bool>,
    /// Grow lamp, on below the light threshold.
    pub lamp: Option<bool>,
    /// Panel-side hint: soil is drier than the moisture threshold.
    /// No firmware actuator follows this.
    pub watering: Option<bool>,
}

impl ActuatorState {
    /// Every actuator held off.
    pub const OFF: ActuatorState = ActuatorState {
        fan: Some(false),
        lamp: Some(false),
        watering: Some(false),
    };

    /// Nothing determined.
    pub const UNKNOWN: ActuatorState = ActuatorState {
        fan: None,
        lamp: None,
        watering: None,
    };

    /// Whether any actuator is expected to be running.
    pub fn any_active(&self) -> bool {
        [self.fan, self.lamp, self.watering].contains(&Some(true))
    }
}

/// Evaluate the firmware fan and lamp rules, plus the watering hint, for one reading.
pub fn evaluate(reading: &SensorReading, settings: &SettingsRecord) -> ActuatorState {
    match settings.operation_mode {
        OperationMode::Auto => ActuatorState {
            fan: Some(reading.temperature > settings.temp_threshold),
            lamp: Some(reading.light_level < settings.light_threshold),
            watering: Some(reading.humidity < f64::from(settings.moisture_threshold)),
        },
        OperationMode::Manual => ActuatorState::UNKNOWN,
        OperationMode::Off => ActuatorState::OFF,
    }
}
