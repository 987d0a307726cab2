//! synctls - blocking TLS streams over any byte transport.
//!
//! A record-oriented crypto engine (rustls by default) is bridged onto a pair
//! of blocking `Read`/`Write` transport halves. The result is a plaintext
//! reader and writer that can be used from separate threads; the TLS
//! handshake happens lazily on first use.
//!
//! ```no_run
//! use std::io::{Read, Write};
//!
//! use synctls::address::NetLocation;
//! use synctls::config::{BridgeConfig, TlsClientConfig};
//! use synctls::tls_factory::TrustedTlsFactory;
//!
//! # fn main() -> std::io::Result<()> {
//! let factory = TrustedTlsFactory::new(&TlsClientConfig::default())?;
//! let location = NetLocation::from_str("imap.example.com:993", None)?;
//! let (mut reader, mut writer) = factory
//!     .connect(&location, None, &BridgeConfig::default())?
//!     .split();
//!
//! writer.write_all(b"a1 CAPABILITY\r\n")?;
//! writer.flush()?;
//! let mut buf = [0u8; 1024];
//! let n = reader.read(&mut buf)?;
//! # let _ = n;
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod config;
pub mod crypto;
mod grow_buffer;
pub mod rustls_util;
pub mod socks5_client;
pub mod sync_tls;
pub mod tls_factory;

#[cfg(test)]
mod test_util;

pub use config::BridgeConfig;
pub use crypto::{CryptoEngine, RustlsEngine};
pub use sync_tls::{SyncTlsReader, SyncTlsStreams, SyncTlsWriter, TransportShutdown};
pub use tls_factory::TrustedTlsFactory;
