//! HTTP client for the Anna thermostat gateway.
//!
//! - Blocking client using `ureq` (no async), one request at a time.
//! - Reads return parsed [`Document`] snapshots; no caching, every call re-fetches.
//! - Writes resolve their target in a caller-supplied snapshot, then PUT an XML
//!   fragment. Any non-2xx answer is returned as an error.
//! - No retries; callers decide how to react to failures.
//!
//! Authentication
//! - HTTP basic auth on every request, credentials owned by the client instance.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::StatusCode;
use log::{debug, info};

use crate::config::GatewayConfig;
use crate::document::{Document, Selector, child_text};
use crate::error::AnnaError;
use crate::fragment;
use crate::models::anna::{Generation, ThermostatStatus};
use crate::navigator::{self, LOCATIONS_ENDPOINT, Navigator, RULES_ENDPOINT};

pub const PING_ENDPOINT: &str = "/ping";
pub const DIRECT_OBJECTS_ENDPOINT: &str = "/core/direct_objects";
pub const DOMAIN_OBJECTS_ENDPOINT: &str = "/core/domain_objects";

pub struct AnnaClient {
    agent: ureq::Agent,
    endpoint: String,
    authorization: String,
    navigator: Navigator,
}

impl AnnaClient {
    /// Client for a device of known generation.
    pub fn new(config: &GatewayConfig, generation: Generation) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build();
        let credentials = format!("{}:{}", config.username, config.password);

        AnnaClient {
            agent: ureq::Agent::new_with_config(agent_config),
            endpoint: config.endpoint(),
            authorization: format!("Basic {}", STANDARD.encode(credentials)),
            navigator: Navigator::new(generation),
        }
    }

    /// Client whose generation comes from `config.legacy`, or from probing the
    /// domain objects once when the flag is unset.
    pub fn connect(config: &GatewayConfig) -> Result<Self, AnnaError> {
        if let Some(legacy) = config.legacy {
            return Ok(Self::new(config, Generation::from_legacy_flag(legacy)));
        }

        let mut client = Self::new(config, Generation::Current);
        let doc = client.domain_objects()?;
        let generation = navigator::detect_generation(&doc)?;
        info!("Detected {:?} gateway at {}", generation, client.endpoint);
        client.navigator = Navigator::new(generation);
        Ok(client)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn generation(&self) -> Generation {
        self.navigator.generation()
    }

    pub fn navigator(&self) -> Navigator {
        self.navigator
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.endpoint, path)
        } else {
            format!("{}/{}", self.endpoint, path)
        }
    }

    fn get(&self, path: &str) -> Result<(StatusCode, String), ureq::Error> {
        let mut res = self
            .agent
            .get(&self.url(path))
            .header("Authorization", self.authorization.as_str())
            .call()?;
        let status = res.status();
        let body = res.body_mut().read_to_string()?;
        debug!("GET {} -> {}", path, status.as_u16());
        Ok((status, body))
    }

    fn put(&self, path: &str, body: &str) -> Result<(StatusCode, String), AnnaError> {
        let mut res = self
            .agent
            .put(&self.url(path))
            .header("Authorization", self.authorization.as_str())
            .header("Content-Type", "text/xml")
            .send(body)?;
        let status = res.status();
        let text = res.body_mut().read_to_string()?;
        debug!("PUT {} -> {}", path, status.as_u16());
        Ok((status, text))
    }

    fn fetch(&self, path: &str) -> Result<Document, AnnaError> {
        let connectivity = |reason: String| AnnaError::Connectivity {
            endpoint: path.to_string(),
            reason,
        };
        let (status, body) = self.get(path).map_err(|e| connectivity(e.to_string()))?;
        if status != StatusCode::OK {
            return Err(connectivity(format!("http {}", status.as_u16())));
        }
        Document::parse(&body)
    }

    /// Liveness probe. The gateway answers `/ping` with 404; anything else
    /// means something other than the gateway is listening.
    pub fn ping(&self) -> Result<bool, AnnaError> {
        let (status, _) = self.get(PING_ENDPOINT).map_err(|e| AnnaError::Connectivity {
            endpoint: PING_ENDPOINT.to_string(),
            reason: e.to_string(),
        })?;
        if status != StatusCode::NOT_FOUND {
            return Err(AnnaError::Connectivity {
                endpoint: PING_ENDPOINT.to_string(),
                reason: format!("http {}", status.as_u16()),
            });
        }
        Ok(true)
    }

    pub fn domain_objects(&self) -> Result<Document, AnnaError> {
        self.fetch(DOMAIN_OBJECTS_ENDPOINT)
    }

    pub fn direct_objects(&self) -> Result<Document, AnnaError> {
        self.fetch(DIRECT_OBJECTS_ENDPOINT)
    }

    pub fn locations(&self) -> Result<Document, AnnaError> {
        self.fetch(LOCATIONS_ENDPOINT)
    }

    /// Fetch the domain objects and read everything from that one snapshot.
    pub fn status(&self) -> Result<ThermostatStatus, AnnaError> {
        let doc = self.domain_objects()?;
        self.navigator.status(&doc)
    }

    /// Activate `preset`. Returns the gateway's response body.
    pub fn set_preset(&self, doc: &Document, preset: &str) -> Result<String, AnnaError> {
        let (path, body) = match self.generation() {
            Generation::Legacy => {
                let rule_id = navigator::legacy_preset_rule_id(doc.root(), preset)?;
                (RULES_ENDPOINT.to_string(), fragment::rule_activation(&rule_id)?)
            }
            Generation::Current => {
                let location_id = navigator::thermostat_location_id(doc.root())?;
                // The PUT must echo name and type, which only the locations endpoint has current.
                let locations = self.locations()?;
                let location = Selector::child("location")
                    .with_attr("id", &location_id)
                    .find(locations.root())
                    .ok_or_else(|| AnnaError::MissingElement(format!("location {}", location_id)))?;
                let name = child_text(location, "name")
                    .ok_or_else(|| AnnaError::MissingElement(format!("name of location {}", location_id)))?;
                let location_type = child_text(location, "type")
                    .ok_or_else(|| AnnaError::MissingElement(format!("type of location {}", location_id)))?;
                (
                    format!("{};id={}", LOCATIONS_ENDPOINT, location_id),
                    fragment::location_preset(&location_id, &name, &location_type, preset)?,
                )
            }
        };

        let (status, text) = self.put(&path, &body)?;
        if !status.is_success() {
            return Err(AnnaError::PresetWrite {
                status: status.as_u16(),
                body: text,
            });
        }
        info!("Preset set to {}", preset);
        Ok(text)
    }

    /// Switch the schedule named `schema` on or off.
    pub fn set_schema_state(&self, doc: &Document, schema: &str, active: bool) -> Result<String, AnnaError> {
        let root = doc.root();
        let rule_id = navigator::rule_id_by_name(root, schema)
            .ok_or_else(|| AnnaError::RuleNotFound(format!("schedule '{}'", schema)))?;
        let template_id = navigator::rule_template_id(root, &rule_id)
            .ok_or_else(|| AnnaError::MissingElement(format!("template of rule {}", rule_id)))?;

        let body = fragment::schema_state(&rule_id, schema, &template_id, active)?;
        let (status, text) = self.put(&format!("{};id={}", RULES_ENDPOINT, rule_id), &body)?;
        if !status.is_success() {
            return Err(AnnaError::ScheduleWrite {
                status: status.as_u16(),
                body: text,
            });
        }
        info!("Schedule {} set to active={}", schema, active);
        Ok(text)
    }

    /// Write a new setpoint in degrees Celsius.
    pub fn set_temperature(&self, doc: &Document, temperature: f64) -> Result<String, AnnaError> {
        let uri = self.navigator.temperature_uri(doc)?;
        let body = fragment::setpoint(temperature)?;
        let (status, text) = self.put(&uri, &body)?;
        if !status.is_success() {
            return Err(AnnaError::TemperatureWrite {
                status: status.as_u16(),
                body: text,
            });
        }
        info!("Setpoint set to {}", fragment::format_setpoint(temperature));
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const AUTH: &str = "Basic c21pbGU6c2hvcnRfaWQ=";

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/data/{}", name)).expect("fixture present")
    }

    fn config(server: &MockServer) -> GatewayConfig {
        GatewayConfig::new("smile", "short_id", server.host(), server.port()).with_timeout(Duration::from_secs(5))
    }

    fn client(server: &MockServer, generation: Generation) -> AnnaClient {
        AnnaClient::new(&config(server), generation)
    }

    fn doc(name: &str) -> Document {
        Document::parse(&fixture(name)).unwrap()
    }

    #[test]
    fn ping_succeeds_on_404() {
        let server = MockServer::start();
        let ping = server.mock(|when, then| {
            when.method(GET).path("/ping").header("authorization", AUTH);
            then.status(404);
        });
        assert!(client(&server, Generation::Current).ping().unwrap());
        ping.assert();
    }

    #[test]
    fn ping_fails_on_any_other_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/ping");
            then.status(200).body("hello");
        });
        let err = client(&server, Generation::Current).ping().unwrap_err();
        assert!(matches!(err, AnnaError::Connectivity { ref reason, .. } if reason == "http 200"));
    }

    #[test]
    fn unreachable_gateway_is_a_connectivity_error() {
        let cfg = GatewayConfig::new("smile", "short_id", "127.0.0.1", 1).with_timeout(Duration::from_secs(2));
        let err = AnnaClient::new(&cfg, Generation::Current).domain_objects().unwrap_err();
        assert!(matches!(err, AnnaError::Connectivity { ref endpoint, .. } if endpoint == DOMAIN_OBJECTS_ENDPOINT));
    }

    #[test]
    fn fetch_normalizes_bare_ampersands() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(DIRECT_OBJECTS_ENDPOINT);
            then.status(200)
                .body(r#"<direct_objects><location id="l"><name>Tom & Jerry's</name></location></direct_objects>"#);
        });
        let doc = client(&server, Generation::Current).direct_objects().unwrap();
        let name = Selector::child("location").then("name").find_text(doc.root());
        assert_eq!(name.as_deref(), Some("Tom & Jerry's"));
    }

    #[test]
    fn fetch_rejects_non_200() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(DOMAIN_OBJECTS_ENDPOINT);
            then.status(401).body("unauthorized");
        });
        let err = client(&server, Generation::Current).domain_objects().unwrap_err();
        assert!(matches!(err, AnnaError::Connectivity { ref reason, .. } if reason == "http 401"));
    }

    #[test]
    fn connect_probes_generation_once() {
        let server = MockServer::start();
        let objects = server.mock(|when, then| {
            when.method(GET).path(DOMAIN_OBJECTS_ENDPOINT);
            then.status(200).body(fixture("domain_objects_legacy.xml"));
        });
        let probed = AnnaClient::connect(&config(&server)).unwrap();
        assert_eq!(probed.generation(), Generation::Legacy);
        objects.assert_hits(1);

        let explicit = AnnaClient::connect(&config(&server).with_legacy(false)).unwrap();
        assert_eq!(explicit.generation(), Generation::Current);
        objects.assert_hits(1);
    }

    #[test]
    fn status_reads_one_snapshot() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(DOMAIN_OBJECTS_ENDPOINT);
            then.status(200).body(fixture("domain_objects.xml"));
        });
        let status = client(&server, Generation::Current).status().unwrap();
        assert_eq!(status.current_temperature, Some(20.46));
        assert_eq!(status.heating_active, Some(true));
        assert_eq!(
            status.schema_names,
            Some(vec!["Weekdays".to_string(), "Winter".to_string(), "Summer".to_string()])
        );
    }

    #[test]
    fn set_preset_echoes_location_fields() {
        let server = MockServer::start();
        let locations = server.mock(|when, then| {
            when.method(GET).path(LOCATIONS_ENDPOINT);
            then.status(200).body(fixture("locations.xml"));
        });
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/core/locations;id=loc-living")
                .header("authorization", AUTH)
                .header("content-type", "text/xml")
                .body(r#"<locations><location id="loc-living"><name>Living &amp; Dining</name><type>residential</type><preset>away</preset></location></locations>"#);
            then.status(200).body("<ok/>");
        });

        let reply = client(&server, Generation::Current)
            .set_preset(&doc("domain_objects.xml"), "away")
            .unwrap();
        assert_eq!(reply, "<ok/>");
        locations.assert();
        put.assert();
    }

    #[test]
    fn set_preset_aborts_when_locations_fetch_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(LOCATIONS_ENDPOINT);
            then.status(503);
        });
        let put = server.mock(|when, then| {
            when.method(PUT);
            then.status(200);
        });

        let err = client(&server, Generation::Current)
            .set_preset(&doc("domain_objects.xml"), "away")
            .unwrap_err();
        assert!(matches!(err, AnnaError::Connectivity { ref endpoint, .. } if endpoint == LOCATIONS_ENDPOINT));
        put.assert_hits(0);
    }

    #[test]
    fn set_preset_refuses_to_blank_location_fields() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(LOCATIONS_ENDPOINT);
            then.status(200)
                .body(r#"<locations><location id="loc-living"><preset>home</preset></location></locations>"#);
        });
        let put = server.mock(|when, then| {
            when.method(PUT);
            then.status(200).body("ok");
        });

        let err = client(&server, Generation::Current)
            .set_preset(&doc("domain_objects.xml"), "away")
            .unwrap_err();
        assert!(matches!(err, AnnaError::MissingElement(ref what) if what == "name of location loc-living"));
        put.assert_hits(0);
    }

    #[test]
    fn set_preset_surfaces_write_failures() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(LOCATIONS_ENDPOINT);
            then.status(200).body(fixture("locations.xml"));
        });
        server.mock(|when, then| {
            when.method(PUT).path("/core/locations;id=loc-living");
            then.status(400).body("bad preset");
        });

        let err = client(&server, Generation::Current)
            .set_preset(&doc("domain_objects.xml"), "party")
            .unwrap_err();
        match err {
            AnnaError::PresetWrite { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad preset");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn legacy_set_preset_activates_rule() {
        let server = MockServer::start();
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path(RULES_ENDPOINT)
                .body(r#"<rules><rule id="lr-away"><active>true</active></rule></rules>"#);
            then.status(200);
        });

        client(&server, Generation::Legacy)
            .set_preset(&doc("domain_objects_legacy.xml"), "away")
            .unwrap();
        put.assert();
    }

    #[test]
    fn legacy_set_preset_unknown_icon() {
        let server = MockServer::start();
        let any = server.mock(|when, then| {
            when.any_request();
            then.status(200);
        });
        let err = client(&server, Generation::Legacy)
            .set_preset(&doc("domain_objects_legacy.xml"), "vacation")
            .unwrap_err();
        assert!(matches!(err, AnnaError::PresetNotFound(_)));
        any.assert_hits(0);
    }

    #[test]
    fn preset_round_trip_keeps_current_value() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(DOMAIN_OBJECTS_ENDPOINT);
            then.status(200).body(fixture("domain_objects.xml"));
        });
        server.mock(|when, then| {
            when.method(GET).path(LOCATIONS_ENDPOINT);
            then.status(200).body(fixture("locations.xml"));
        });
        server.mock(|when, then| {
            when.method(PUT).path("/core/locations;id=loc-living").body_contains("<preset>home</preset>");
            then.status(200);
        });

        let client = client(&server, Generation::Current);
        let before = client.domain_objects().unwrap();
        let current = client.navigator().current_preset(&before);
        client.set_preset(&before, &current).unwrap();
        let after = client.domain_objects().unwrap();
        assert_eq!(client.navigator().current_preset(&after), current);
    }

    #[test]
    fn set_schema_state_puts_rule_fragment() {
        let server = MockServer::start();
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/core/rules;id=rule-summer")
                .body_contains("<name><![CDATA[Summer]]></name>")
                .body_contains(r#"<template id="tpl-schedule""#)
                .body_contains("<active>true</active>");
            then.status(200).body("done");
        });

        let reply = client(&server, Generation::Current)
            .set_schema_state(&doc("domain_objects.xml"), "Summer", true)
            .unwrap();
        assert_eq!(reply, "done");
        put.assert();
    }

    #[test]
    fn set_schema_state_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/core/rules;id=rule-winter");
            then.status(500).body("rule locked");
        });
        let client = client(&server, Generation::Current);
        let doc = doc("domain_objects.xml");

        assert!(matches!(
            client.set_schema_state(&doc, "Autumn", true),
            Err(AnnaError::RuleNotFound(_))
        ));
        assert!(matches!(
            client.set_schema_state(&doc, "Winter", false),
            Err(AnnaError::ScheduleWrite { status: 500, ref body }) if body == "rule locked"
        ));
    }

    #[test]
    fn set_temperature_targets_thermostat_functionality() {
        let server = MockServer::start();
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/core/locations;id=loc-living/thermostat;id=tf-living")
                .body("<thermostat_functionality><setpoint>22.0</setpoint></thermostat_functionality>");
            then.status(200);
        });
        client(&server, Generation::Current)
            .set_temperature(&doc("domain_objects.xml"), 22.0)
            .unwrap();
        put.assert();
    }

    #[test]
    fn legacy_set_temperature_targets_appliance() {
        let server = MockServer::start();
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/core/appliances;id=app-legacy-thermostat/thermostat")
                .body_contains("<setpoint>19.5</setpoint>");
            then.status(202);
        });
        client(&server, Generation::Legacy)
            .set_temperature(&doc("domain_objects_legacy.xml"), 19.5)
            .unwrap();
        put.assert();
    }

    #[test]
    fn set_temperature_failure_carries_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/core/locations;id=loc-living/thermostat;id=tf-living");
            then.status(500).body("setpoint out of range");
        });
        let err = client(&server, Generation::Current)
            .set_temperature(&doc("domain_objects.xml"), 45.0)
            .unwrap_err();
        assert!(matches!(
            err,
            AnnaError::TemperatureWrite { status: 500, ref body } if body == "setpoint out of range"
        ));
        assert!(err.to_string().contains("setpoint out of range"));
    }
}
