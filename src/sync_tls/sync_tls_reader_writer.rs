// Blocking plaintext adapters
//
// SyncTlsReader serves plaintext from app_in, unwrapping more records when it
// runs dry. SyncTlsWriter buffers plaintext in app_out and only wraps on
// flush or when the buffer cannot take the next write.

use std::io::{self, Read, Write};
use std::sync::Arc;

use super::sync_tls_close::Side;
use super::sync_tls_driver::{DriveOutcome, Driver, Operation};
use super::sync_tls_streams::{Halves, Shared};
use crate::crypto::HandshakeStatus;

/// The plaintext read half of a [`SyncTlsStreams`](super::SyncTlsStreams).
pub struct SyncTlsReader {
    shared: Arc<Shared>,
}

impl SyncTlsReader {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn handshake_status(&self) -> HandshakeStatus {
        self.shared.handshake_status()
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.shared.is_handshake_complete()
    }

    /// Close the reading side. Idempotent.
    pub fn close(&mut self) {
        Halves::lock(&self.shared, Side::Reader).close_primary();
    }

    fn read_inner(halves: &mut Halves<'_>, buf: &mut [u8]) -> io::Result<usize> {
        let mut driver = Driver::new(&halves.shared().config);
        loop {
            if let Some(inbound) = halves.inbound() {
                let buffers = inbound.buffers()?;
                if !buffers.app_in.is_empty() {
                    let n = buffers.app_in.read(buf)?;
                    buffers.app_in.compact();
                    return Ok(n);
                }
            }

            if driver.drive(halves, Operation::Unwrapping)? == DriveOutcome::Closed {
                log::debug!("peer closed the TLS session");
                halves.teardown();
                return Ok(0);
            }
        }
    }
}

impl Read for SyncTlsReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut halves = Halves::lock(&self.shared, Side::Reader);
        if halves.primary_closed() {
            return Ok(0);
        }

        match Self::read_inner(&mut halves, buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                log::debug!("TLS read failed: {e}");
                halves.teardown();
                Err(e)
            }
        }
    }
}

impl Drop for SyncTlsReader {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SyncTlsReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncTlsReader")
            .field("handshake_done", &self.shared.is_handshake_complete())
            .finish()
    }
}

/// The plaintext write half. Data is buffered until `flush` or until the
/// buffer cannot take the next write.
pub struct SyncTlsWriter {
    shared: Arc<Shared>,
}

impl SyncTlsWriter {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn handshake_status(&self) -> HandshakeStatus {
        self.shared.handshake_status()
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.shared.is_handshake_complete()
    }

    /// Close the writing side without flushing. Idempotent.
    pub fn close(&mut self) {
        Halves::lock(&self.shared, Side::Writer).close_primary();
    }

    fn write_inner(halves: &mut Halves<'_>, buf: &[u8]) -> io::Result<usize> {
        let max_capacity = halves.shared().config.max_buffer_capacity;

        let needs_room = {
            let buffers = halves.outbound().buffers()?;
            buffers.app_out.compact();
            buffers.app_out.remaining_capacity() < buf.len()
        };

        if needs_room {
            let mut driver = Driver::new(&halves.shared().config);
            Self::flush_app_out(halves, &mut driver)?;
            let app_out = &mut halves.outbound().buffers()?.app_out;
            while app_out.capacity() < buf.len() && app_out.capacity() < max_capacity {
                app_out.grow(max_capacity)?;
            }
            app_out.compact();
        }

        // At the capacity cap, take what fits and let the caller retry.
        let app_out = &mut halves.outbound().buffers()?.app_out;
        let n = buf.len().min(app_out.remaining_capacity());
        app_out.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush_inner(halves: &mut Halves<'_>) -> io::Result<()> {
        let mut driver = Driver::new(&halves.shared().config);

        // An empty flush still has to get the handshake through.
        if !halves.shared().is_handshake_complete() {
            Self::wrap_once(halves, &mut driver)?;
        }

        Self::flush_app_out(halves, &mut driver)
    }

    fn flush_app_out(halves: &mut Halves<'_>, driver: &mut Driver) -> io::Result<()> {
        while !halves.outbound().buffers()?.app_out.is_empty() {
            Self::wrap_once(halves, driver)?;
        }
        Ok(())
    }

    fn wrap_once(halves: &mut Halves<'_>, driver: &mut Driver) -> io::Result<()> {
        match driver.drive(halves, Operation::Wrapping)? {
            DriveOutcome::Settled => Ok(()),
            DriveOutcome::Closed => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "TLS session closed while writing",
            )),
        }
    }
}

impl Write for SyncTlsWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut halves = Halves::lock(&self.shared, Side::Writer);
        if halves.primary_closed() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "write to closed TLS stream",
            ));
        }

        match Self::write_inner(&mut halves, buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                log::debug!("TLS write failed: {e}");
                halves.teardown();
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut halves = Halves::lock(&self.shared, Side::Writer);
        if halves.primary_closed() {
            return Ok(());
        }

        match Self::flush_inner(&mut halves) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::debug!("TLS flush failed: {e}");
                halves.teardown();
                Err(e)
            }
        }
    }
}

impl Drop for SyncTlsWriter {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SyncTlsWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncTlsWriter")
            .field("handshake_done", &self.shared.is_handshake_complete())
            .finish()
    }
}
