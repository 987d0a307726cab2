//! Client configuration.
//!
//! - [`types`]: configuration types, deserialized from YAML
//! - [`pem`]: PEM values given inline or as file paths
//! - [`validate`]: checks applied after parsing
//!
//! The main entry point is [`load_config`].

mod pem;
mod types;
mod validate;

pub use pem::load_pem;
pub use types::*;
pub use validate::{validate_client_config, validate_tls_client_config};

/// Loads and validates a client configuration file.
pub fn load_config(config_filename: &str) -> std::io::Result<ClientConfig> {
    let config_bytes = match std::fs::read(config_filename) {
        Ok(b) => b,
        Err(e) => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Could not read config file {config_filename}: {e}"),
            ));
        }
    };

    let config_str = match String::from_utf8(config_bytes) {
        Ok(s) => s,
        Err(e) => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Could not parse config file {config_filename} as UTF8: {e}"),
            ));
        }
    };

    let config = match serde_yaml::from_str::<ClientConfig>(&config_str) {
        Ok(c) => c,
        Err(e) => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Could not parse config file {config_filename} as config YAML: {e}"),
            ));
        }
    };

    validate_client_config(&config)?;
    Ok(config)
}
