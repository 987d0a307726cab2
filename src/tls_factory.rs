// Builds TLS client streams from configuration
//
// One rustls client config is built up front; every connection gets its own
// engine and bridge.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use rustls::pki_types::ServerName;

use crate::address::NetLocation;
use crate::config::{BridgeConfig, TlsClientConfig, load_pem, validate_tls_client_config};
use crate::crypto::RustlsEngine;
use crate::rustls_util::create_client_config;
use crate::socks5_client::Socks5Client;
use crate::sync_tls::SyncTlsStreams;

pub struct TrustedTlsFactory {
    client_config: Arc<rustls::ClientConfig>,
    /// Server name to present instead of the connection host
    sni_hostname: Option<String>,
}

impl TrustedTlsFactory {
    pub fn new(config: &TlsClientConfig) -> io::Result<Self> {
        validate_tls_client_config(config)?;

        let ca_cert = match config.ca_cert {
            Some(ref ca_cert) => Some(load_pem(ca_cert)?),
            None => None,
        };
        let client_key_and_cert = match (&config.key, &config.cert) {
            (Some(key), Some(cert)) => Some((load_pem(key)?, load_pem(cert)?)),
            _ => None,
        };

        let client_config = create_client_config(
            config.verify,
            ca_cert.as_deref(),
            &config.alpn_protocols,
            config.enable_sni,
            client_key_and_cert,
        )?;

        Ok(Self::from_client_config(
            Arc::new(client_config),
            config.sni_hostname.clone(),
        ))
    }

    pub fn from_client_config(
        client_config: Arc<rustls::ClientConfig>,
        sni_hostname: Option<String>,
    ) -> Self {
        Self {
            client_config,
            sni_hostname,
        }
    }

    pub fn create_engine(&self, host: &str) -> io::Result<RustlsEngine> {
        let name = self.sni_hostname.as_deref().unwrap_or(host);
        let server_name = ServerName::try_from(name.to_string()).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid TLS server name {name:?}: {e}"),
            )
        })?;
        RustlsEngine::new_client(self.client_config.clone(), server_name)
    }

    /// Layer TLS over an already-connected transport.
    pub fn start_tls(
        &self,
        transport_in: Box<dyn Read + Send>,
        transport_out: Box<dyn Write + Send>,
        host: &str,
        port: u16,
        bridge_config: &BridgeConfig,
    ) -> io::Result<SyncTlsStreams> {
        if port == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid port number: 0",
            ));
        }
        let engine = self.create_engine(host)?;
        log::debug!("starting TLS to {host}:{port}");
        SyncTlsStreams::with_config(Box::new(engine), transport_in, transport_out, bridge_config)
    }

    /// Open a TCP connection, optionally through a SOCKS5 proxy, and start TLS on it.
    pub fn connect(
        &self,
        location: &NetLocation,
        socks5_proxy: Option<&NetLocation>,
        bridge_config: &BridgeConfig,
    ) -> io::Result<SyncTlsStreams> {
        let host = location.address().to_string();
        let port = location.port();
        if port == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid port number: 0",
            ));
        }

        let stream = match socks5_proxy {
            Some(proxy) => {
                let stream = open_tcp_stream(proxy)?;
                let (_, stream) = Socks5Client::request(stream.try_clone()?, stream, &host, port)?;
                stream
            }
            None => open_tcp_stream(location)?,
        };

        let reader = stream.try_clone()?;
        let shutdown = stream.try_clone()?;
        let streams =
            self.start_tls(Box::new(reader), Box::new(stream), &host, port, bridge_config)?;
        Ok(streams.with_transport_shutdown(Box::new(move || shutdown.shutdown(Shutdown::Both))))
    }
}

fn open_tcp_stream(location: &NetLocation) -> io::Result<TcpStream> {
    let stream = location.connect()?;
    if let Err(e) = stream.set_nodelay(true) {
        log::error!("Failed to set TCP no-delay on client socket: {e}");
    }
    Ok(stream)
}

impl std::fmt::Debug for TrustedTlsFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustedTlsFactory")
            .field("sni_hostname", &self.sni_hostname)
            .finish()
    }
}
