//! Error taxonomy for gateway reads and writes.

use core::fmt;
use std::error::Error;

#[derive(Debug)]
pub enum AnnaError {
    /// A read failed: unexpected status code or no response at all.
    Connectivity { endpoint: String, reason: String },
    /// A write request never produced a response (DNS, connect, timeout, body read).
    Transport(String),
    /// The response body is not well-formed XML, even after normalization.
    Parse(xmltree::ParseError),
    /// A structural element every document of this generation carries is missing.
    MissingElement(String),
    RuleNotFound(String),
    PresetNotFound(String),
    PresetWrite { status: u16, body: String },
    ScheduleWrite { status: u16, body: String },
    TemperatureWrite { status: u16, body: String },
    /// An outbound fragment could not be serialized.
    Fragment(String),
}

impl fmt::Display for AnnaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnaError::Connectivity { endpoint, reason } => {
                write!(f, "could not fetch {} from the gateway: {}", endpoint, reason)
            }
            AnnaError::Transport(s) => write!(f, "transport error: {}", s),
            AnnaError::Parse(e) => write!(f, "xml parse error: {}", e),
            AnnaError::MissingElement(what) => write!(f, "document has no {}", what),
            AnnaError::RuleNotFound(what) => write!(f, "rule not found: {}", what),
            AnnaError::PresetNotFound(p) => write!(f, "could not find preset '{}'", p),
            AnnaError::PresetWrite { status, body } => {
                write!(f, "could not set the given preset (http {}): {}", status, body)
            }
            AnnaError::ScheduleWrite { status, body } => {
                write!(f, "could not set the schema state (http {}): {}", status, body)
            }
            AnnaError::TemperatureWrite { status, body } => {
                write!(f, "could not set the temperature (http {}): {}", status, body)
            }
            AnnaError::Fragment(s) => write!(f, "could not build request body: {}", s),
        }
    }
}

impl Error for AnnaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AnnaError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<xmltree::ParseError> for AnnaError {
    fn from(value: xmltree::ParseError) -> Self {
        AnnaError::Parse(value)
    }
}

impl From<ureq::Error> for AnnaError {
    fn from(value: ureq::Error) -> Self {
        AnnaError::Transport(value.to_string())
    }
}
