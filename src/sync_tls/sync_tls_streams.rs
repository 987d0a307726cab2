// Shared bridge state and the entry point that splits it into halves
//
// Lock order is always inbound, then outbound, then the close coordinator,
// then the engine. The engine lock is only held for a single engine call.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use super::sync_tls_close::{CloseCoordinator, Side};
use super::sync_tls_reader_writer::{SyncTlsReader, SyncTlsWriter};
use super::sync_tls_transport::{Inbound, Outbound};
use crate::config::BridgeConfig;
use crate::crypto::{CryptoEngine, HandshakeStatus};

/// How long the writer waits on the inbound half before re-checking whether
/// another thread finished the handshake.
const HANDSHAKE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Unblocks a thread parked in a transport read, such as
/// `TcpStream::shutdown(Shutdown::Both)` on a clone of the socket.
pub type TransportShutdown = Box<dyn FnOnce() -> io::Result<()> + Send>;

pub(super) struct Shared {
    pub inbound: Mutex<Inbound>,
    pub outbound: Mutex<Outbound>,
    pub engine: Mutex<Option<Box<dyn CryptoEngine>>>,
    pub close: Mutex<CloseCoordinator>,
    /// Taken last, after every other lock
    pub shutdown: Mutex<Option<TransportShutdown>>,
    pub handshake_done: AtomicBool,
    pub config: BridgeConfig,
}

impl Shared {
    pub fn handshake_status(&self) -> HandshakeStatus {
        match self.engine.lock().as_ref() {
            Some(engine) => engine.handshake_status(),
            None => HandshakeStatus::NotHandshaking,
        }
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.handshake_done.load(Ordering::Acquire)
    }

    pub fn mark_handshake_complete(&self) {
        if !self.handshake_done.swap(true, Ordering::AcqRel) {
            log::debug!("TLS handshake complete");
        }
    }

    fn shutdown_transport(&self) {
        let shutdown = self.shutdown.lock().take();
        if let Some(shutdown) = shutdown {
            if let Err(e) = shutdown() {
                log::warn!("failed to shut down transport: {e}");
            }
        }
    }
}

/// The halves of the shared state one adapter operation holds.
///
/// The half belonging to the calling adapter (`primary`) is locked for the
/// whole operation; the other half is taken on demand, in lock order.
pub(super) struct Halves<'a> {
    shared: &'a Shared,
    primary: Side,
    inbound: Option<MutexGuard<'a, Inbound>>,
    outbound: Option<MutexGuard<'a, Outbound>>,
}

impl<'a> Halves<'a> {
    pub fn lock(shared: &'a Shared, primary: Side) -> Self {
        let (inbound, outbound) = match primary {
            Side::Reader => (Some(shared.inbound.lock()), None),
            Side::Writer => (None, Some(shared.outbound.lock())),
        };
        Self {
            shared,
            primary,
            inbound,
            outbound,
        }
    }

    pub fn shared(&self) -> &'a Shared {
        self.shared
    }

    pub fn primary(&self) -> Side {
        self.primary
    }

    /// The inbound half, or None if the handshake completed on another
    /// thread while waiting for it.
    pub fn inbound(&mut self) -> Option<&mut Inbound> {
        let shared = self.shared;
        if self.inbound.is_none() {
            // Inbound must be taken before outbound.
            let relock = self.outbound.take().is_some();
            let guard = loop {
                if let Some(guard) = shared.inbound.try_lock_for(HANDSHAKE_POLL_INTERVAL) {
                    break Some(guard);
                }
                if shared.is_handshake_complete() {
                    break None;
                }
            };
            self.inbound = guard;
            if relock {
                self.outbound = Some(shared.outbound.lock());
            }
        }
        self.inbound.as_deref_mut()
    }

    pub fn outbound(&mut self) -> &mut Outbound {
        let shared = self.shared;
        self.outbound.get_or_insert_with(|| shared.outbound.lock())
    }

    /// Release the half that does not belong to the calling adapter.
    pub fn release_secondary(&mut self) {
        match self.primary {
            Side::Reader => self.outbound = None,
            Side::Writer => self.inbound = None,
        }
    }

    /// Full teardown: drop the engine and close both transport halves.
    ///
    /// Only the first call drops the engine and runs the transport shutdown
    /// hook, which wakes a thread blocked reading the transport. Halves held
    /// by another thread are released by that thread once it returns.
    pub fn teardown(&mut self) {
        let first = self.shared.close.lock().begin_teardown();
        if first {
            log::debug!("tearing down TLS streams");
            self.shared.engine.lock().take();
            self.shared.shutdown_transport();
        }

        match self.inbound.as_mut() {
            Some(inbound) => inbound.release(),
            None if first => {
                if let Some(mut inbound) = self.shared.inbound.try_lock() {
                    inbound.release();
                }
            }
            None => {}
        }
        match self.outbound.as_mut() {
            Some(outbound) => outbound.release(),
            None if first => {
                if let Some(mut outbound) = self.shared.outbound.try_lock() {
                    outbound.release();
                }
            }
            None => {}
        }
    }

    /// True if the calling adapter can no longer be used. Releases its
    /// transport half if a teardown happened elsewhere.
    pub fn primary_closed(&mut self) -> bool {
        let (open, torn_down) = {
            let close = self.shared.close.lock();
            (close.is_open(self.primary), close.is_torn_down())
        };
        if torn_down {
            self.release_primary();
        }
        !open
    }

    fn release_primary(&mut self) {
        match self.primary {
            Side::Reader => {
                if let Some(inbound) = self.inbound.as_mut() {
                    inbound.release();
                }
            }
            Side::Writer => {
                if let Some(outbound) = self.outbound.as_mut() {
                    outbound.release();
                }
            }
        }
    }

    /// Close the calling adapter's side. Tears everything down if the other
    /// side is already closed.
    pub fn close_primary(&mut self) {
        let teardown = self.shared.close.lock().close_side(self.primary);
        match self.primary {
            Side::Reader => {
                if let Some(inbound) = self.inbound.as_mut() {
                    inbound.close_buffers();
                }
            }
            Side::Writer => {
                if let Some(outbound) = self.outbound.as_mut() {
                    outbound.close_buffers();
                }
            }
        }
        if teardown {
            self.teardown();
        } else if self.shared.close.lock().is_torn_down() {
            self.release_primary();
        }
    }
}

/// A crypto engine bridged onto a blocking transport.
///
/// No IO happens until the first read or flush; the handshake is then driven
/// lazily by whichever adapter needs it.
pub struct SyncTlsStreams {
    shared: Arc<Shared>,
}

impl SyncTlsStreams {
    pub fn new(
        engine: Box<dyn CryptoEngine>,
        transport_in: Box<dyn Read + Send>,
        transport_out: Box<dyn Write + Send>,
    ) -> Self {
        Self::build(engine, transport_in, transport_out, BridgeConfig::default())
    }

    pub fn with_config(
        engine: Box<dyn CryptoEngine>,
        transport_in: Box<dyn Read + Send>,
        transport_out: Box<dyn Write + Send>,
        config: &BridgeConfig,
    ) -> io::Result<Self> {
        config.validate()?;
        Ok(Self::build(engine, transport_in, transport_out, config.clone()))
    }

    fn build(
        engine: Box<dyn CryptoEngine>,
        transport_in: Box<dyn Read + Send>,
        transport_out: Box<dyn Write + Send>,
        config: BridgeConfig,
    ) -> Self {
        let initial_capacity = config.initial_buffer_capacity;
        Self {
            shared: Arc::new(Shared {
                inbound: Mutex::new(Inbound::new(transport_in, initial_capacity)),
                outbound: Mutex::new(Outbound::new(transport_out, initial_capacity)),
                engine: Mutex::new(Some(engine)),
                close: Mutex::new(CloseCoordinator::new()),
                shutdown: Mutex::new(None),
                handshake_done: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// Install a hook run once at teardown to unblock a pending transport read.
    ///
    /// Without one, a reader blocked on the transport only returns when the
    /// peer sends data or closes the connection.
    pub fn with_transport_shutdown(self, shutdown: TransportShutdown) -> Self {
        *self.shared.shutdown.lock() = Some(shutdown);
        self
    }

    pub fn handshake_status(&self) -> HandshakeStatus {
        self.shared.handshake_status()
    }

    /// Split into the plaintext reader and writer.
    pub fn split(self) -> (SyncTlsReader, SyncTlsWriter) {
        (
            SyncTlsReader::new(self.shared.clone()),
            SyncTlsWriter::new(self.shared),
        )
    }
}

impl std::fmt::Debug for SyncTlsStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncTlsStreams")
            .field("handshake_done", &self.shared.is_handshake_complete())
            .field("config", &self.shared.config)
            .finish()
    }
}
