// rustls-backed crypto engine
//
// rustls exposes read_tls/write_tls/process_new_packets rather than
// wrap/unwrap, so this adapter emulates the record engine contract:
// ciphertext produced by rustls is staged internally and copied out on
// wrap, and ciphertext handed to unwrap is fed through read_tls.

use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use rustls::pki_types::ServerName;

use super::crypto_engine::{
    CryptoEngine, DelegatedTask, EngineResult, EngineStatus, HandshakeStatus,
};

/// Largest plaintext chunk accepted per wrap call (one full TLS record).
const MAX_PLAINTEXT_CHUNK: usize = 16384;

/// A `CryptoEngine` over a rustls client or server connection.
#[derive(Debug)]
pub struct RustlsEngine {
    connection: rustls::Connection,
    /// Ciphertext taken from rustls but not yet handed out by `wrap`
    staged: Vec<u8>,
    /// Set once `Finished` has been reported
    handshake_complete: bool,
}

impl RustlsEngine {
    pub fn new(connection: rustls::Connection) -> Self {
        Self {
            connection,
            staged: Vec::new(),
            handshake_complete: false,
        }
    }

    pub fn new_client(
        config: Arc<rustls::ClientConfig>,
        server_name: ServerName<'static>,
    ) -> io::Result<Self> {
        let connection = rustls::ClientConnection::new(config, server_name).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("failed to create rustls client connection: {e}"),
            )
        })?;
        Ok(Self::new(rustls::Connection::Client(connection)))
    }

    pub fn new_server(config: Arc<rustls::ServerConfig>) -> io::Result<Self> {
        let connection = rustls::ServerConnection::new(config).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("failed to create rustls server connection: {e}"),
            )
        })?;
        Ok(Self::new(rustls::Connection::Server(connection)))
    }

    pub fn is_server(&self) -> bool {
        matches!(self.connection, rustls::Connection::Server(_))
    }

    /// The negotiated ALPN protocol, once the handshake has progressed far enough.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.connection.alpn_protocol()
    }

    fn process_packets(&mut self) -> io::Result<rustls::IoState> {
        self.connection.process_new_packets().map_err(|e| {
            let side = if self.is_server() { "server" } else { "client" };
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("rustls {side} error processing new packets: {e}"),
            )
        })
    }

    /// Move everything rustls wants to send into the staging buffer.
    fn stage_pending_tls(&mut self) -> io::Result<()> {
        while self.connection.wants_write() {
            if self.connection.write_tls(&mut self.staged)? == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Handshake status after an operation, reporting `Finished` exactly once.
    ///
    /// Records rustls queues after the handshake (session tickets, alerts,
    /// key updates) still report `NeedWrap`.
    fn handshake_progress(&mut self) -> HandshakeStatus {
        if !self.staged.is_empty() || self.connection.wants_write() {
            HandshakeStatus::NeedWrap
        } else if self.handshake_complete {
            HandshakeStatus::NotHandshaking
        } else if self.connection.is_handshaking() {
            HandshakeStatus::NeedUnwrap
        } else {
            self.handshake_complete = true;
            log::debug!(
                "rustls {} handshake complete",
                if self.is_server() { "server" } else { "client" }
            );
            HandshakeStatus::Finished
        }
    }
}

impl CryptoEngine for RustlsEngine {
    fn wrap(&mut self, src: &[u8], dst: &mut [u8]) -> io::Result<EngineResult> {
        self.stage_pending_tls()?;

        // Application data is only accepted once nothing else is queued, so
        // handshake records always go out ahead of it.
        let mut consumed = 0;
        if self.staged.is_empty() && !self.connection.is_handshaking() && !src.is_empty() {
            let chunk = &src[..src.len().min(MAX_PLAINTEXT_CHUNK)];
            consumed = self.connection.writer().write(chunk)?;
            self.stage_pending_tls()?;
        }

        if dst.is_empty() && !self.staged.is_empty() {
            return Ok(EngineResult::new(
                EngineStatus::Overflow,
                HandshakeStatus::NeedWrap,
                consumed,
                0,
            ));
        }

        let produced = self.staged.len().min(dst.len());
        dst[..produced].copy_from_slice(&self.staged[..produced]);
        self.staged.drain(..produced);

        let handshake_status = if self.staged.is_empty() {
            self.handshake_progress()
        } else {
            HandshakeStatus::NeedWrap
        };

        Ok(EngineResult::new(
            EngineStatus::Ok,
            handshake_status,
            consumed,
            produced,
        ))
    }

    fn unwrap(&mut self, src: &[u8], dst: &mut [u8]) -> io::Result<EngineResult> {
        let mut io_state = self.process_packets()?;

        // Never hand rustls an empty reader: a zero-length read_tls is taken
        // as transport EOF.
        let mut consumed = 0;
        if io_state.plaintext_bytes_to_read() == 0 && !io_state.peer_has_closed() && !src.is_empty()
        {
            consumed = self.connection.read_tls(&mut Cursor::new(src))?;
            io_state = self.process_packets()?;
        }

        let available = io_state.plaintext_bytes_to_read();
        if available > 0 && dst.is_empty() {
            return Ok(EngineResult::new(
                EngineStatus::Overflow,
                self.handshake_progress(),
                consumed,
                0,
            ));
        }

        let produced = if available > 0 {
            match self.connection.reader().read(dst) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => 0,
                Err(e) => return Err(e),
            }
        } else {
            0
        };

        let handshake_status = self.handshake_progress();
        let status = if produced == 0 && available == 0 && io_state.peer_has_closed() {
            EngineStatus::Closed
        } else if consumed == 0
            && produced == 0
            && matches!(
                handshake_status,
                HandshakeStatus::NeedUnwrap | HandshakeStatus::NotHandshaking
            )
        {
            EngineStatus::Underflow
        } else {
            EngineStatus::Ok
        };

        Ok(EngineResult::new(
            status,
            handshake_status,
            consumed,
            produced,
        ))
    }

    fn handshake_status(&self) -> HandshakeStatus {
        if !self.staged.is_empty() || self.connection.wants_write() {
            HandshakeStatus::NeedWrap
        } else if self.handshake_complete {
            HandshakeStatus::NotHandshaking
        } else if self.connection.is_handshaking() {
            HandshakeStatus::NeedUnwrap
        } else {
            HandshakeStatus::NotHandshaking
        }
    }

    fn delegated_task(&mut self) -> Option<DelegatedTask> {
        // rustls performs all of its work inside process_new_packets.
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::new_engine_pair;

    /// Move everything `from` wants to send into `to`.
    fn transfer(from: &mut RustlsEngine, to: &mut RustlsEngine) {
        let mut wire = vec![0u8; 65536];
        let mut plain = vec![0u8; 65536];
        loop {
            let wrapped = from.wrap(&[], &mut wire).unwrap();
            assert_eq!(wrapped.status, EngineStatus::Ok);
            if wrapped.bytes_produced == 0 {
                break;
            }
            let mut offset = 0;
            while offset < wrapped.bytes_produced {
                let unwrapped = to
                    .unwrap(&wire[offset..wrapped.bytes_produced], &mut plain)
                    .unwrap();
                if unwrapped.bytes_consumed == 0 {
                    break;
                }
                offset += unwrapped.bytes_consumed;
            }
        }
    }

    #[test]
    fn test_initial_handshake_status() {
        let (client, server) = new_engine_pair();
        assert!(!client.is_server());
        assert!(server.is_server());
        assert_eq!(client.handshake_status(), HandshakeStatus::NeedWrap);
        assert_eq!(server.handshake_status(), HandshakeStatus::NeedUnwrap);
    }

    #[test]
    fn test_client_hello_then_need_unwrap() {
        let (mut client, _server) = new_engine_pair();
        let mut wire = vec![0u8; 65536];
        let result = client.wrap(b"early", &mut wire).unwrap();
        assert_eq!(result.status, EngineStatus::Ok);
        assert_eq!(result.handshake_status, HandshakeStatus::NeedUnwrap);
        assert_eq!(result.bytes_consumed, 0);
        assert!(result.bytes_produced > 0);
        // TLS handshake record
        assert_eq!(wire[0], 0x16);
    }

    #[test]
    fn test_unwrap_without_input_underflows() {
        let (_client, mut server) = new_engine_pair();
        let mut plain = vec![0u8; 1024];
        let result = server.unwrap(&[], &mut plain).unwrap();
        assert_eq!(result.status, EngineStatus::Underflow);
        assert_eq!(result.handshake_status, HandshakeStatus::NeedUnwrap);
        assert_eq!(result.bytes_consumed, 0);
        assert_eq!(result.bytes_produced, 0);
    }

    #[test]
    fn test_wrap_into_empty_destination_overflows() {
        let (mut client, _server) = new_engine_pair();
        let result = client.wrap(&[], &mut []).unwrap();
        assert_eq!(result.status, EngineStatus::Overflow);
        assert_eq!(result.bytes_produced, 0);
    }

    #[test]
    fn test_handshake_and_application_data() {
        let (mut client, mut server) = new_engine_pair();
        for _ in 0..8 {
            transfer(&mut client, &mut server);
            transfer(&mut server, &mut client);
        }
        assert_eq!(client.handshake_status(), HandshakeStatus::NotHandshaking);
        assert_eq!(server.handshake_status(), HandshakeStatus::NotHandshaking);

        let mut wire = vec![0u8; 65536];
        let wrapped = client.wrap(b"hello", &mut wire).unwrap();
        assert_eq!(wrapped.status, EngineStatus::Ok);
        assert_eq!(wrapped.bytes_consumed, 5);
        assert_eq!(wrapped.handshake_status, HandshakeStatus::NotHandshaking);

        let mut plain = vec![0u8; 64];
        let unwrapped = server
            .unwrap(&wire[..wrapped.bytes_produced], &mut plain)
            .unwrap();
        assert_eq!(unwrapped.status, EngineStatus::Ok);
        assert_eq!(unwrapped.bytes_consumed, wrapped.bytes_produced);
        assert_eq!(&plain[..unwrapped.bytes_produced], b"hello");
    }

    #[test]
    fn test_close_notify_reports_closed() {
        let (mut client, mut server) = new_engine_pair();
        for _ in 0..8 {
            transfer(&mut client, &mut server);
            transfer(&mut server, &mut client);
        }

        client.connection.send_close_notify();
        let mut wire = vec![0u8; 65536];
        let wrapped = client.wrap(&[], &mut wire).unwrap();
        assert!(wrapped.bytes_produced > 0);

        let mut plain = vec![0u8; 64];
        let unwrapped = server
            .unwrap(&wire[..wrapped.bytes_produced], &mut plain)
            .unwrap();
        assert_eq!(unwrapped.status, EngineStatus::Closed);
        assert_eq!(unwrapped.bytes_produced, 0);
    }

    #[test]
    fn test_queued_alert_after_handshake_needs_wrap() {
        let (mut client, mut server) = new_engine_pair();
        for _ in 0..8 {
            transfer(&mut client, &mut server);
            transfer(&mut server, &mut client);
        }
        assert_eq!(client.handshake_status(), HandshakeStatus::NotHandshaking);

        client.connection.send_close_notify();
        assert_eq!(client.handshake_status(), HandshakeStatus::NeedWrap);

        // Too small for the alert record, so it stays staged.
        let mut wire = [0u8; 4];
        let wrapped = client.wrap(&[], &mut wire).unwrap();
        assert_eq!(wrapped.status, EngineStatus::Ok);
        assert_eq!(wrapped.bytes_produced, 4);
        assert_eq!(wrapped.handshake_status, HandshakeStatus::NeedWrap);

        let mut wire = vec![0u8; 65536];
        let wrapped = client.wrap(&[], &mut wire).unwrap();
        assert!(wrapped.bytes_produced > 0);
        assert_eq!(wrapped.handshake_status, HandshakeStatus::NotHandshaking);
        assert_eq!(client.handshake_status(), HandshakeStatus::NotHandshaking);
    }

    #[test]
    fn test_garbage_input_is_invalid_data() {
        let (_client, mut server) = new_engine_pair();
        let mut plain = vec![0u8; 1024];
        let err = server
            .unwrap(b"this is not a tls record at all", &mut plain)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
