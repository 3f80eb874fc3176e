//! Vocabulary of the gateway object model: device generations, point-log
//! types, rule template tags and the value types handed back to callers.

use serde::Serialize;
use std::collections::BTreeMap;

/// Device generation. Fixed for the lifetime of a device; selects which
/// lookup patterns apply.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Generation {
    /// Flat rule-based model: presets are rule directives with an icon and a
    /// temperature, there are no locations.
    Legacy,
    /// Location/rule hybrid: presets live on locations, setpoints are written
    /// through the location's thermostat functionality.
    Current,
}

impl Generation {
    pub fn from_legacy_flag(legacy: bool) -> Self {
        if legacy { Generation::Legacy } else { Generation::Current }
    }

    pub fn is_legacy(self) -> bool {
        matches!(self, Generation::Legacy)
    }
}

// Point-log `type` / service `log_type` values.
pub mod log_types {
    pub const TEMPERATURE: &str = "temperature";
    pub const TARGET_TEMPERATURE: &str = "target_temperature";
    pub const THERMOSTAT: &str = "thermostat";
    pub const SCHEDULE_TEMPERATURE: &str = "schedule_temperature";
    pub const OUTDOOR_TEMPERATURE: &str = "outdoor_temperature";
    pub const ILLUMINANCE: &str = "illuminance";
    pub const BOILER_TEMPERATURE: &str = "boiler_temperature";
    pub const WATER_PRESSURE: &str = "central_heater_water_pressure";

    pub const PRESET_STATE: &str = "preset_state";
    pub const SCHEDULE_STATE: &str = "schedule_state";
    pub const BOILER_STATE: &str = "boiler_state";
    pub const CENTRAL_HEATING_STATE: &str = "central_heating_state";
    pub const COOLING_STATE: &str = "cooling_state";
    pub const DOMESTIC_HOT_WATER_STATE: &str = "domestic_hot_water_state";
}

// Appliance `type` values.
pub mod appliance_types {
    pub const THERMOSTAT: &str = "thermostat";
    pub const HEATER_CENTRAL: &str = "heater_central";
}

// Rule `template/@tag` values.
pub mod template_tags {
    pub const PRESETS: &str = "zone_setpoint_and_state_based_on_preset";
    pub const SCHEDULE: &str = "zone_preset_based_on_time_and_presence_with_override";
}

/// Name of the preset rule on gateways that predate template tags.
pub const PRESET_RULE_NAME: &str = "Thermostat presets";

/// Reported when no preset is active.
pub const NO_PRESET: &str = "none";

/// Preset name -> setpoint in degrees Celsius.
pub type PresetCatalog = BTreeMap<String, f64>;

/// Everything readable from one domain-objects snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThermostatStatus {
    pub generation: Generation,
    pub current_preset: String,
    pub presets: Option<PresetCatalog>,
    pub schema_names: Option<Vec<String>>,
    pub active_schema: Option<String>,
    pub schema_state: Option<bool>,
    pub schedule_active: bool,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub thermostat_temperature: Option<f64>,
    pub schedule_temperature: Option<f64>,
    pub outdoor_temperature: Option<f64>,
    pub illuminance: Option<f64>,
    pub boiler_temperature: Option<f64>,
    pub water_pressure: Option<f64>,
    pub boiler_active: Option<bool>,
    pub heating_active: Option<bool>,
    pub cooling_active: Option<bool>,
    pub domestic_hot_water_active: Option<bool>,
}
