//! Client for the Plugwise Anna thermostat gateway.
//!
//! Fetch a [`Document`] with [`AnnaClient`], read it through a [`Navigator`],
//! and change presets, schedules or setpoints with the client's write methods.

pub mod models {
    pub mod anna;
}

pub mod client;
pub mod config;
pub mod document;
pub mod env_file;
pub mod error;
pub mod fragment;
pub mod navigator;
pub mod utils;

pub use client::AnnaClient;
pub use config::GatewayConfig;
pub use document::Document;
pub use error::AnnaError;
pub use models::anna::{Generation, PresetCatalog, ThermostatStatus};
pub use navigator::Navigator;
