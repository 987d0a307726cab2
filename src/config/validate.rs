//! Configuration validation.

use super::types::{ClientConfig, TlsClientConfig};

pub fn validate_client_config(config: &ClientConfig) -> std::io::Result<()> {
    if config.server.port() == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Invalid server port in {}", config.server),
        ));
    }
    if let Some(ref proxy) = config.socks5_proxy
        && proxy.port() == 0
    {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Invalid SOCKS5 proxy port in {proxy}"),
        ));
    }
    validate_tls_client_config(&config.tls)?;
    config.bridge.validate()
}

pub fn validate_tls_client_config(config: &TlsClientConfig) -> std::io::Result<()> {
    if config.cert.is_some() != config.key.is_some() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "TLS client cert and key must be specified together",
        ));
    }
    if let Some(ref hostname) = config.sni_hostname
        && hostname.is_empty()
    {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "TLS sni_hostname is empty",
        ));
    }
    Ok(())
}
