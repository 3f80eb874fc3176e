//! Request bodies for gateway PUTs.
//!
//! Each body is built as a small element tree and serialized, so names and
//! presets containing markup characters are escaped by the writer.

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::error::AnnaError;

fn element(name: &str) -> Element {
    Element::new(name)
}

fn text_element(name: &str, text: &str) -> Element {
    let mut el = Element::new(name);
    el.children.push(XMLNode::Text(text.to_string()));
    el
}

fn with_id(mut el: Element, id: &str) -> Element {
    el.attributes.insert("id".to_string(), id.to_string());
    el
}

fn push(parent: &mut Element, child: Element) {
    parent.children.push(XMLNode::Element(child));
}

fn wrap(container: &str, item: Element) -> Element {
    let mut root = element(container);
    push(&mut root, item);
    root
}

pub fn serialize(el: &Element) -> Result<String, AnnaError> {
    let config = EmitterConfig::new()
        .write_document_declaration(false)
        .perform_indent(false);
    let mut buf = Vec::new();
    el.write_with_config(&mut buf, config)
        .map_err(|e| AnnaError::Fragment(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| AnnaError::Fragment(e.to_string()))
}

/// `<locations><location id><name/><type/><preset/></location></locations>`
///
/// The gateway drops fields missing from a location PUT, so name and type are
/// echoed back alongside the new preset.
pub fn location_preset(location_id: &str, name: &str, location_type: &str, preset: &str) -> Result<String, AnnaError> {
    let mut location = with_id(element("location"), location_id);
    push(&mut location, text_element("name", name));
    push(&mut location, text_element("type", location_type));
    push(&mut location, text_element("preset", preset));
    serialize(&wrap("locations", location))
}

/// `<rules><rule id><active>true</active></rule></rules>`
pub fn rule_activation(rule_id: &str) -> Result<String, AnnaError> {
    let mut rule = with_id(element("rule"), rule_id);
    push(&mut rule, text_element("active", "true"));
    serialize(&wrap("rules", rule))
}

/// `<rules><rule id><name><![CDATA[..]]></name><template id/><active/></rule></rules>`
pub fn schema_state(rule_id: &str, name: &str, template_id: &str, active: bool) -> Result<String, AnnaError> {
    let mut rule = with_id(element("rule"), rule_id);
    let mut name_el = element("name");
    name_el.children.push(XMLNode::CData(name.to_string()));
    push(&mut rule, name_el);
    push(&mut rule, with_id(element("template"), template_id));
    push(&mut rule, text_element("active", if active { "true" } else { "false" }));
    serialize(&wrap("rules", rule))
}

/// `<thermostat_functionality><setpoint>..</setpoint></thermostat_functionality>`
pub fn setpoint(value: f64) -> Result<String, AnnaError> {
    if !value.is_finite() {
        return Err(AnnaError::Fragment(format!("setpoint must be a finite number, got {}", value)));
    }
    let root = wrap("thermostat_functionality", text_element("setpoint", &format_setpoint(value)));
    serialize(&root)
}

/// Whole degrees keep one decimal (`22.0`), everything else prints as-is.
pub fn format_setpoint(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
