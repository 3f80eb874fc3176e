//! Lookups over a domain-objects document.
//!
//! Free functions are generation-agnostic path queries, each documenting its
//! exact selection rule (first match vs. all matches, optional vs. required).
//! [`Navigator`] layers the generation-specific reads on top of them.
//!
//! Nothing here performs I/O; write operations in [`crate::client`] use these
//! lookups to resolve their targets.

use chrono::{DateTime, FixedOffset};
use log::warn;
use xmltree::Element;

use crate::document::{Document, Selector, attr, child_elements, child_text, descendants};
use crate::error::AnnaError;
use crate::models::anna::{
    Generation, NO_PRESET, PRESET_RULE_NAME, PresetCatalog, ThermostatStatus, appliance_types, log_types,
    template_tags,
};
use crate::utils::{parse_modified_date, round_one_decimal};

pub const APPLIANCES_ENDPOINT: &str = "/core/appliances";
pub const LOCATIONS_ENDPOINT: &str = "/core/locations";
pub const RULES_ENDPOINT: &str = "/core/rules";

/// Point-log id of the first service declaring `log_type`
/// (`module/services/*[@log_type]/functionalities/point_log`).
pub fn point_log_id(root: &Element, log_type: &str) -> Option<String> {
    Selector::child("module")
        .then("services")
        .any()
        .with_attr("log_type", log_type)
        .then("functionalities")
        .then("point_log")
        .find(root)
        .and_then(|el| attr(el, "id"))
        .map(str::to_string)
}

/// Latest measurement of the point log `point_log_id`, wherever it is logged
/// (`*/logs/point_log[@id]/period/measurement`, first match).
pub fn measurement(root: &Element, point_log_id: &str) -> Option<String> {
    Selector::default()
        .any()
        .then("logs")
        .then("point_log")
        .with_attr("id", point_log_id)
        .then("period")
        .then("measurement")
        .find_text(root)
}

/// Measurement text for a log type; `None` when the device does not log it.
pub fn log_value(root: &Element, log_type: &str) -> Option<String> {
    point_log_id(root, log_type).and_then(|id| measurement(root, &id))
}

/// First appliance whose `type` child equals `appliance_type`.
pub fn appliance<'a>(root: &'a Element, appliance_type: &str) -> Option<&'a Element> {
    Selector::child("appliance")
        .with_child_text("type", appliance_type)
        .find(root)
}

/// The thermostat appliance. Every gateway has one; its absence is an error.
pub fn thermostat_appliance(root: &Element) -> Result<&Element, AnnaError> {
    appliance(root, appliance_types::THERMOSTAT)
        .ok_or_else(|| AnnaError::MissingElement("thermostat appliance".to_string()))
}

/// `appliance[type]/logs/point_log[type]/period/measurement`, first match.
pub fn appliance_log_value(root: &Element, appliance_type: &str, log_type: &str) -> Option<String> {
    Selector::child("appliance")
        .with_child_text("type", appliance_type)
        .then("logs")
        .then("point_log")
        .with_child_text("type", log_type)
        .then("period")
        .then("measurement")
        .find_text(root)
}

/// `Some(true)` when the appliance log reads `on`, `None` when it is not logged.
pub fn appliance_flag(root: &Element, appliance_type: &str, log_type: &str) -> Option<bool> {
    appliance_log_value(root, appliance_type, log_type).map(|v| v == "on")
}

/// Location referenced by the thermostat appliance (current generation only).
pub fn thermostat_location_id(root: &Element) -> Result<String, AnnaError> {
    let thermostat = thermostat_appliance(root)?;
    Selector::child("location")
        .has_attr("id")
        .find(thermostat)
        .and_then(|el| attr(el, "id"))
        .map(str::to_string)
        .ok_or_else(|| AnnaError::MissingElement("thermostat location".to_string()))
}

/// A document is legacy when its thermostat carries no location reference.
pub fn detect_generation(doc: &Document) -> Result<Generation, AnnaError> {
    let thermostat = thermostat_appliance(doc.root())?;
    let has_location = Selector::child("location").has_attr("id").find(thermostat).is_some();
    Ok(Generation::from_legacy_flag(!has_location))
}

/// Top-level rule with the given id.
pub fn rule_by_id<'a>(root: &'a Element, rule_id: &str) -> Option<&'a Element> {
    Selector::child("rule").with_attr("id", rule_id).find(root)
}

/// Id of the first top-level rule named exactly `name`.
pub fn rule_id_by_name(root: &Element, name: &str) -> Option<String> {
    Selector::child("rule")
        .with_child_text("name", name)
        .find(root)
        .and_then(|el| attr(el, "id"))
        .map(str::to_string)
}

/// Ids of all top-level rules whose template carries `tag`, in document order.
pub fn rule_ids_by_template_tag(root: &Element, tag: &str) -> Vec<String> {
    Selector::child("rule")
        .find_all(root)
        .into_iter()
        .filter(|rule| {
            Selector::child("template")
                .with_attr("tag", tag)
                .find(rule)
                .is_some()
        })
        .filter_map(|rule| attr(rule, "id"))
        .map(str::to_string)
        .collect()
}

/// Template id of the rule `rule_id`.
pub fn rule_template_id(root: &Element, rule_id: &str) -> Option<String> {
    let rule = rule_by_id(root, rule_id)?;
    Selector::child("template")
        .find(rule)
        .and_then(|el| attr(el, "id"))
        .map(str::to_string)
}

fn parse_number(raw: &str) -> Option<f64> {
    match raw.trim().parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring non-numeric value {:?}", raw);
            None
        }
    }
}

/// Preset -> setpoint pairs from the directives of rule `rule_id`
/// (`rule[@id]/directives/*[@preset]/then/@setpoint`).
pub fn preset_dictionary(root: &Element, rule_id: &str) -> Result<PresetCatalog, AnnaError> {
    let directives = Selector::child("rule")
        .with_attr("id", rule_id)
        .then("directives")
        .find(root)
        .ok_or_else(|| AnnaError::RuleNotFound(format!("directives of rule {}", rule_id)))?;

    let mut presets = PresetCatalog::new();
    for directive in child_elements(directives) {
        let Some(preset) = attr(directive, "preset") else {
            continue;
        };
        let setpoint = Selector::child("then")
            .find(directive)
            .and_then(|then| attr(then, "setpoint"))
            .and_then(parse_number);
        match setpoint {
            Some(v) => {
                presets.insert(preset.to_string(), v);
            }
            None => warn!("Preset {} in rule {} has no usable setpoint", preset, rule_id),
        }
    }
    Ok(presets)
}

/// Icon -> temperature pairs from every rule directive (legacy presets).
pub fn legacy_preset_dictionary(root: &Element) -> PresetCatalog {
    Selector::child("rule")
        .then("directives")
        .then("when")
        .then("then")
        .has_attr("icon")
        .find_all(root)
        .into_iter()
        .filter_map(|then| {
            let icon = attr(then, "icon")?;
            let temperature = attr(then, "temperature").and_then(parse_number)?;
            Some((icon.to_string(), temperature))
        })
        .collect()
}

/// Id of the legacy rule activating `preset`.
pub fn legacy_preset_rule_id(root: &Element, preset: &str) -> Result<String, AnnaError> {
    Selector::child("rule")
        .find_all(root)
        .into_iter()
        .find(|rule| {
            Selector::child("directives")
                .then("when")
                .then("then")
                .with_attr("icon", preset)
                .find(rule)
                .is_some()
        })
        .and_then(|rule| attr(rule, "id"))
        .map(str::to_string)
        .ok_or_else(|| AnnaError::PresetNotFound(preset.to_string()))
}

fn is_active(rule: &Element) -> bool {
    child_text(rule, "active").as_deref() == Some("true")
}

/// Name of the active rule among `rule_ids`, or of the most recently modified
/// one when none is active. Later rules win ties on `modified_date`.
pub fn resolve_active_name(root: &Element, rule_ids: &[String]) -> Option<String> {
    let mut last_modified: Option<(DateTime<FixedOffset>, String)> = None;
    for rule_id in rule_ids {
        let Some(rule) = rule_by_id(root, rule_id) else {
            continue;
        };
        let Some(name) = child_text(rule, "name") else {
            continue;
        };
        if is_active(rule) {
            return Some(name);
        }
        let raw_date = child_text(rule, "modified_date").unwrap_or_default();
        let Some(modified) = parse_modified_date(&raw_date) else {
            warn!("Rule {} has unparseable modified_date {:?}", rule_id, raw_date);
            continue;
        };
        if last_modified.as_ref().is_none_or(|(best, _)| modified >= *best) {
            last_modified = Some((modified, name));
        }
    }
    last_modified.map(|(_, name)| name)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Rounding {
    Exact,
    OneDecimal,
    /// Rounded to one decimal on legacy devices only.
    LegacyOneDecimal,
}

/// Generation-aware reads over a document snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Navigator {
    generation: Generation,
}

impl Navigator {
    pub fn new(generation: Generation) -> Self {
        Navigator { generation }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Preset catalog. Current devices resolve the preset rule by template
    /// tag, then by name, and fail with `RuleNotFound` if neither matches.
    pub fn presets(&self, doc: &Document) -> Result<PresetCatalog, AnnaError> {
        let root = doc.root();
        match self.generation {
            Generation::Legacy => Ok(legacy_preset_dictionary(root)),
            Generation::Current => {
                let rule_id = rule_ids_by_template_tag(root, template_tags::PRESETS)
                    .into_iter()
                    .next()
                    .or_else(|| rule_id_by_name(root, PRESET_RULE_NAME))
                    .ok_or_else(|| AnnaError::RuleNotFound("thermostat presets".to_string()))?;
                preset_dictionary(root, &rule_id)
            }
        }
    }

    fn is_preset_rule(&self, rule: &Element, name: &str) -> bool {
        match self.generation {
            Generation::Legacy => name.contains("preset"),
            Generation::Current => {
                name.contains("presets")
                    || Selector::child("template")
                        .with_attr("tag", template_tags::PRESETS)
                        .find(rule)
                        .is_some()
            }
        }
    }

    /// Names of all non-preset rules; `None` when there are none.
    pub fn schema_names(&self, doc: &Document) -> Option<Vec<String>> {
        let names: Vec<String> = descendants(doc.root(), "rule")
            .into_iter()
            .filter_map(|rule| child_text(rule, "name").map(|name| (rule, name)))
            .filter(|(rule, name)| !self.is_preset_rule(rule, name))
            .map(|(_, name)| name)
            .collect();
        if names.is_empty() { None } else { Some(names) }
    }

    /// Ids of the rules acting as schedules.
    pub fn schedule_rule_ids(&self, doc: &Document) -> Vec<String> {
        let root = doc.root();
        match self.generation {
            Generation::Current => rule_ids_by_template_tag(root, template_tags::SCHEDULE),
            Generation::Legacy => Selector::child("rule")
                .find_all(root)
                .into_iter()
                .filter(|rule| child_text(rule, "name").is_some_and(|name| !self.is_preset_rule(rule, &name)))
                .filter_map(|rule| attr(rule, "id"))
                .map(str::to_string)
                .collect(),
        }
    }

    /// Active schedule, falling back to the last modified one.
    pub fn active_schema_name(&self, doc: &Document) -> Option<String> {
        let ids = self.schedule_rule_ids(doc);
        resolve_active_name(doc.root(), &ids)
    }

    /// Whether any schedule rule is marked active.
    pub fn schedule_active(&self, doc: &Document) -> bool {
        self.schedule_rule_ids(doc)
            .iter()
            .filter_map(|id| rule_by_id(doc.root(), id))
            .any(is_active)
    }

    /// Thermostat `schedule_state` log.
    pub fn schema_state(&self, doc: &Document) -> Option<bool> {
        appliance_flag(doc.root(), appliance_types::THERMOSTAT, log_types::SCHEDULE_STATE)
    }

    /// Active preset name, or `"none"`.
    pub fn current_preset(&self, doc: &Document) -> String {
        let root = doc.root();
        let preset = match self.generation {
            Generation::Legacy => Selector::child("rule")
                .with_child_text("active", "true")
                .then("directives")
                .then("when")
                .then("then")
                .find(root)
                .and_then(|then| attr(then, "icon"))
                .map(str::to_string),
            Generation::Current => {
                appliance_log_value(root, appliance_types::THERMOSTAT, log_types::PRESET_STATE)
            }
        };
        preset.unwrap_or_else(|| NO_PRESET.to_string())
    }

    pub fn boiler_status(&self, doc: &Document) -> Option<bool> {
        appliance_flag(doc.root(), appliance_types::HEATER_CENTRAL, log_types::BOILER_STATE)
    }

    pub fn heating_status(&self, doc: &Document) -> Option<bool> {
        appliance_flag(doc.root(), appliance_types::HEATER_CENTRAL, log_types::CENTRAL_HEATING_STATE)
    }

    pub fn cooling_status(&self, doc: &Document) -> Option<bool> {
        appliance_flag(doc.root(), appliance_types::HEATER_CENTRAL, log_types::COOLING_STATE)
    }

    /// Legacy devices do not report hot water.
    pub fn domestic_hot_water_status(&self, doc: &Document) -> Option<bool> {
        match self.generation {
            Generation::Legacy => None,
            Generation::Current => appliance_flag(
                doc.root(),
                appliance_types::HEATER_CENTRAL,
                log_types::DOMESTIC_HOT_WATER_STATE,
            ),
        }
    }

    fn reading(&self, doc: &Document, log_type: &str, rounding: Rounding) -> Option<f64> {
        let value = log_value(doc.root(), log_type).and_then(|raw| parse_number(&raw))?;
        let round = match rounding {
            Rounding::Exact => false,
            Rounding::OneDecimal => true,
            Rounding::LegacyOneDecimal => self.generation.is_legacy(),
        };
        Some(if round { round_one_decimal(value) } else { value })
    }

    pub fn current_temperature(&self, doc: &Document) -> Option<f64> {
        self.reading(doc, log_types::TEMPERATURE, Rounding::LegacyOneDecimal)
    }

    pub fn target_temperature(&self, doc: &Document) -> Option<f64> {
        self.reading(doc, log_types::TARGET_TEMPERATURE, Rounding::LegacyOneDecimal)
    }

    pub fn thermostat_temperature(&self, doc: &Document) -> Option<f64> {
        self.reading(doc, log_types::THERMOSTAT, Rounding::LegacyOneDecimal)
    }

    pub fn schedule_temperature(&self, doc: &Document) -> Option<f64> {
        self.reading(doc, log_types::SCHEDULE_TEMPERATURE, Rounding::Exact)
    }

    pub fn outdoor_temperature(&self, doc: &Document) -> Option<f64> {
        self.reading(doc, log_types::OUTDOOR_TEMPERATURE, Rounding::OneDecimal)
    }

    pub fn illuminance(&self, doc: &Document) -> Option<f64> {
        self.reading(doc, log_types::ILLUMINANCE, Rounding::OneDecimal)
    }

    pub fn boiler_temperature(&self, doc: &Document) -> Option<f64> {
        self.reading(doc, log_types::BOILER_TEMPERATURE, Rounding::OneDecimal)
    }

    pub fn water_pressure(&self, doc: &Document) -> Option<f64> {
        self.reading(doc, log_types::WATER_PRESSURE, Rounding::Exact)
    }

    /// Resource a setpoint is PUT to.
    pub fn temperature_uri(&self, doc: &Document) -> Result<String, AnnaError> {
        let root = doc.root();
        match self.generation {
            Generation::Legacy => {
                let thermostat = thermostat_appliance(root)?;
                let appliance_id = attr(thermostat, "id")
                    .ok_or_else(|| AnnaError::MissingElement("thermostat appliance id".to_string()))?;
                Ok(format!("{};id={}/thermostat", APPLIANCES_ENDPOINT, appliance_id))
            }
            Generation::Current => {
                let location_id = thermostat_location_id(root)?;
                let functionality_id = Selector::child("location")
                    .with_attr("id", &location_id)
                    .then("actuator_functionalities")
                    .then("thermostat_functionality")
                    .find(root)
                    .and_then(|el| attr(el, "id"))
                    .ok_or_else(|| {
                        AnnaError::MissingElement(format!("thermostat functionality of location {}", location_id))
                    })?;
                Ok(format!(
                    "{};id={}/thermostat;id={}",
                    LOCATIONS_ENDPOINT, location_id, functionality_id
                ))
            }
        }
    }

    /// All reads for one snapshot. A missing preset rule leaves `presets` empty.
    pub fn status(&self, doc: &Document) -> Result<ThermostatStatus, AnnaError> {
        let presets = match self.presets(doc) {
            Ok(p) => Some(p),
            Err(AnnaError::RuleNotFound(_)) => None,
            Err(e) => return Err(e),
        };
        Ok(ThermostatStatus {
            generation: self.generation,
            current_preset: self.current_preset(doc),
            presets,
            schema_names: self.schema_names(doc),
            active_schema: self.active_schema_name(doc),
            schema_state: self.schema_state(doc),
            schedule_active: self.schedule_active(doc),
            current_temperature: self.current_temperature(doc),
            target_temperature: self.target_temperature(doc),
            thermostat_temperature: self.thermostat_temperature(doc),
            schedule_temperature: self.schedule_temperature(doc),
            outdoor_temperature: self.outdoor_temperature(doc),
            illuminance: self.illuminance(doc),
            boiler_temperature: self.boiler_temperature(doc),
            water_pressure: self.water_pressure(doc),
            boiler_active: self.boiler_status(doc),
            heating_active: self.heating_status(doc),
            cooling_active: self.cooling_status(doc),
            domestic_hot_water_active: self.domestic_hot_water_status(doc),
        })
    }
}
