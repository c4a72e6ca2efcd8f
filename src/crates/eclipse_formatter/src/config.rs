use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{FormatterError, FormatterResult};

/// Environment variable consulted first for the listener port.
pub const PORT_ENV_VAR: &str = "CUCUMBER_ECLIPSE_PORT";

/// Runner userdata key (`-D cucumber_eclipse_port=<port>`) consulted second.
pub const PORT_USERDATA_KEY: &str = "cucumber_eclipse_port";

/// Connection settings for the formatter transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterConfig {
    /// Port the IDE listener accepts on, always on the local machine.
    pub port: u16,
    /// Upper bound on the initial TCP connect. Zero waits indefinitely.
    pub connect_timeout: Duration,
    /// Upper bound on each acknowledgment read (and frame write). Zero waits
    /// indefinitely.
    pub ack_timeout: Duration,
}

impl FormatterConfig {
    /// Create a config targeting a specific local port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            connect_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(5),
        }
    }

    /// Resolve the port from the process environment, then from runner userdata.
    pub fn from_env(userdata: &BTreeMap<String, String>) -> FormatterResult<Self> {
        let env_value = std::env::var(PORT_ENV_VAR).ok();
        Self::resolve(env_value.as_deref(), userdata)
    }

    /// Resolve the port from an already-read environment value and userdata.
    ///
    /// The environment wins whenever it is non-empty. An empty value on
    /// either side counts as absent.
    pub fn resolve(
        env_value: Option<&str>,
        userdata: &BTreeMap<String, String>,
    ) -> FormatterResult<Self> {
        let raw = env_value
            .filter(|value| !value.is_empty())
            .or_else(|| {
                userdata
                    .get(PORT_USERDATA_KEY)
                    .map(String::as_str)
                    .filter(|value| !value.is_empty())
            })
            .ok_or(FormatterError::MissingPort)?;

        Ok(Self::new(parse_port(raw)?))
    }

    /// Override the connect timeout; `Duration::ZERO` disables it.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the acknowledgment timeout; `Duration::ZERO` disables it.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }
}

fn parse_port(raw: &str) -> FormatterResult<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(FormatterError::InvalidPort(raw.to_string())),
        Ok(port) => Ok(port),
    }
}
