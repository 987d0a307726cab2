//! Configuration types.

use serde::{Deserialize, Serialize};

use crate::address::NetLocation;

pub const DEFAULT_INITIAL_BUFFER_CAPACITY: usize = 32 * 1024;
pub const DEFAULT_MAX_BUFFER_CAPACITY: usize = 16 * 1024 * 1024;
pub const DEFAULT_MAX_ENGINE_STEPS: usize = 1024;

pub fn default_true() -> bool {
    true
}

fn default_initial_buffer_capacity() -> usize {
    DEFAULT_INITIAL_BUFFER_CAPACITY
}

fn default_max_buffer_capacity() -> usize {
    DEFAULT_MAX_BUFFER_CAPACITY
}

fn default_max_engine_steps() -> usize {
    DEFAULT_MAX_ENGINE_STEPS
}

/// Buffer sizing and loop limits for `SyncTlsStreams`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Starting capacity of each of the four buffers
    #[serde(default = "default_initial_buffer_capacity")]
    pub initial_buffer_capacity: usize,
    /// No buffer grows past this
    #[serde(default = "default_max_buffer_capacity")]
    pub max_buffer_capacity: usize,
    /// Engine calls allowed in a row without transport input or
    /// application data moving
    #[serde(default = "default_max_engine_steps")]
    pub max_engine_steps: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            initial_buffer_capacity: DEFAULT_INITIAL_BUFFER_CAPACITY,
            max_buffer_capacity: DEFAULT_MAX_BUFFER_CAPACITY,
            max_engine_steps: DEFAULT_MAX_ENGINE_STEPS,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> std::io::Result<()> {
        if self.initial_buffer_capacity == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "initial_buffer_capacity must be greater than zero",
            ));
        }
        if self.max_buffer_capacity < self.initial_buffer_capacity {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "max_buffer_capacity ({}) is smaller than initial_buffer_capacity ({})",
                    self.max_buffer_capacity, self.initial_buffer_capacity
                ),
            ));
        }
        if self.max_engine_steps == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "max_engine_steps must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TlsClientConfig {
    #[serde(default = "default_true")]
    pub verify: bool,
    /// Extra trusted CA, as a PEM file path or inline PEM data
    #[serde(default)]
    pub ca_cert: Option<String>,
    /// Client certificate, as a PEM file path or inline PEM data
    #[serde(default)]
    pub cert: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    /// Overrides the server name sent in SNI and used for verification
    #[serde(default)]
    pub sni_hostname: Option<String>,
    #[serde(alias = "alpn_protocol", default)]
    pub alpn_protocols: Vec<String>,
    #[serde(default = "default_true")]
    pub enable_sni: bool,
}

impl Default for TlsClientConfig {
    fn default() -> Self {
        Self {
            verify: true,
            ca_cert: None,
            cert: None,
            key: None,
            sni_hostname: None,
            alpn_protocols: vec![],
            enable_sni: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub server: NetLocation,
    #[serde(default)]
    pub socks5_proxy: Option<NetLocation>,
    #[serde(default)]
    pub tls: TlsClientConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}
