//! Gateway connection settings.
//! Each client owns its own copy; nothing here is process-global.

use std::time::Duration;

pub const DEFAULT_USERNAME: &str = "smile";
pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub username: String,
    /// Gateway password (the short id printed on the device).
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Device generation; `None` probes the domain objects once on connect.
    pub legacy: Option<bool>,
    /// Applied to every request.
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        GatewayConfig {
            username: username.into(),
            password: password.into(),
            host: host.into(),
            port,
            legacy: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_legacy(mut self, legacy: bool) -> Self {
        self.legacy = Some(legacy);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL every endpoint path is appended to.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let username = non_empty("ANNA_USERNAME").unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        let password = non_empty("ANNA_PASSWORD").ok_or_else(|| "Missing gateway password: set ANNA_PASSWORD".to_string())?;
        let host = non_empty("ANNA_HOST").ok_or_else(|| "Missing gateway address: set ANNA_HOST".to_string())?;

        let port = match non_empty("ANNA_PORT") {
            Some(s) => s
                .parse::<u16>()
                .map_err(|_| format!("ANNA_PORT must be a port number, got {:?}", s))?,
            None => DEFAULT_PORT,
        };

        let legacy = match non_empty("ANNA_LEGACY").as_deref() {
            None => None,
            Some("1" | "true" | "TRUE") => Some(true),
            Some("0" | "false" | "FALSE") => Some(false),
            Some(other) => return Err(format!("ANNA_LEGACY must be true or false, got {:?}", other)),
        };

        let timeout_secs = non_empty("ANNA_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(GatewayConfig {
            username,
            password,
            host,
            port,
            legacy,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
