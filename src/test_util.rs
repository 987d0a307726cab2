// Test helpers: in-memory blocking pipes and generated certificates.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};
use rustls::pki_types::ServerName;

use crate::crypto::RustlsEngine;
use crate::rustls_util::{create_client_config, create_server_config};

#[derive(Default)]
struct PipeState {
    data: VecDeque<u8>,
    writer_closed: bool,
    reader_closed: bool,
}

struct Pipe {
    state: Mutex<PipeState>,
    readable: Condvar,
}

/// Read end of a pipe. Reads block until data arrives or the write end is dropped.
pub struct PipeReader {
    pipe: Arc<Pipe>,
    /// Upper bound on bytes returned per read, to split records across reads
    fragment_size: usize,
}

pub struct PipeWriter {
    pipe: Arc<Pipe>,
}

pub fn pipe(fragment_size: usize) -> (PipeReader, PipeWriter) {
    let pipe = Arc::new(Pipe {
        state: Mutex::new(PipeState::default()),
        readable: Condvar::new(),
    });
    (
        PipeReader {
            pipe: pipe.clone(),
            fragment_size: fragment_size.max(1),
        },
        PipeWriter { pipe },
    )
}

impl PipeReader {
    /// A handle that closes the pipe from outside, waking a blocked reader.
    pub fn shutdown_handle(&self) -> PipeShutdown {
        PipeShutdown {
            pipe: self.pipe.clone(),
        }
    }
}

pub struct PipeShutdown {
    pipe: Arc<Pipe>,
}

impl PipeShutdown {
    pub fn shutdown(&self) -> io::Result<()> {
        let mut state = self.pipe.state.lock();
        state.writer_closed = true;
        state.reader_closed = true;
        self.pipe.readable.notify_all();
        Ok(())
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.pipe.state.lock();
        while state.data.is_empty() && !state.writer_closed {
            self.pipe.readable.wait(&mut state);
        }
        let n = buf.len().min(self.fragment_size).min(state.data.len());
        for (dst, src) in buf[..n].iter_mut().zip(state.data.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.pipe.state.lock().reader_closed = true;
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.pipe.state.lock();
        if state.reader_closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe reader closed",
            ));
        }
        state.data.extend(buf);
        self.pipe.readable.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.pipe.state.lock().writer_closed = true;
        self.pipe.readable.notify_all();
    }
}

/// Both directions of an in-memory connection, as seen from one end.
pub struct Endpoint {
    pub reader: PipeReader,
    pub writer: PipeWriter,
}

pub fn loopback(fragment_size: usize) -> (Endpoint, Endpoint) {
    let (a_reader, b_writer) = pipe(fragment_size);
    let (b_reader, a_writer) = pipe(fragment_size);
    (
        Endpoint {
            reader: a_reader,
            writer: a_writer,
        },
        Endpoint {
            reader: b_reader,
            writer: b_writer,
        },
    )
}

/// Counts how many times the wrapped transport half was dropped.
pub struct DropCounted<T> {
    inner: T,
    drops: Arc<AtomicUsize>,
}

impl<T> DropCounted<T> {
    pub fn new(inner: T) -> (Self, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                drops: drops.clone(),
            },
            drops,
        )
    }
}

impl<T: Read> Read for DropCounted<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<T: Write> Write for DropCounted<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<T> Drop for DropCounted<T> {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every byte written, for inspecting what reached the transport.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    pub written: Arc<Mutex<Vec<u8>>>,
    pub flushes: Arc<AtomicUsize>,
}

impl Write for RecordingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A reader that counts read calls and then reports end of stream.
#[derive(Clone, Default)]
pub struct EmptyReader {
    pub reads: Arc<AtomicUsize>,
}

impl Read for EmptyReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

pub struct TestCertificate {
    pub cert_pem: String,
    pub key_pem: String,
}

impl TestCertificate {
    /// A self-signed certificate for "localhost".
    pub fn generate() -> Self {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        Self {
            cert_pem: certified.cert.pem(),
            key_pem: certified.key_pair.serialize_pem(),
        }
    }

    pub fn server_config(&self) -> Arc<rustls::ServerConfig> {
        Arc::new(
            create_server_config(self.cert_pem.as_bytes(), self.key_pem.as_bytes(), &[]).unwrap(),
        )
    }

    /// A client config that trusts only the webpki roots and this certificate.
    pub fn client_config(&self) -> Arc<rustls::ClientConfig> {
        Arc::new(
            create_client_config(true, Some(self.cert_pem.as_bytes()), &[], true, None).unwrap(),
        )
    }
}

/// A connected-by-configuration (client, server) engine pair for "localhost".
pub fn new_engine_pair() -> (RustlsEngine, RustlsEngine) {
    let cert = TestCertificate::generate();
    let client = RustlsEngine::new_client(
        cert.client_config(),
        ServerName::try_from("localhost").unwrap(),
    )
    .unwrap();
    let server = RustlsEngine::new_server(cert.server_config()).unwrap();
    (client, server)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_fragments_reads() {
        let (mut reader, mut writer) = pipe(3);
        writer.write_all(b"abcdefg").unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        drop(writer);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_pipe_write_after_reader_drop() {
        let (reader, mut writer) = pipe(16);
        drop(reader);
        let err = writer.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_pipe_shutdown_wakes_reader() {
        let (mut reader, mut writer) = pipe(16);
        let shutdown = reader.shutdown_handle();
        let blocked = std::thread::spawn(move || {
            let mut buf = [0u8; 4];
            reader.read(&mut buf).unwrap()
        });
        std::thread::sleep(std::time::Duration::from_millis(50));
        shutdown.shutdown().unwrap();
        assert_eq!(blocked.join().unwrap(), 0);
        assert_eq!(writer.write(b"x").unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_drop_counter() {
        let (counted, drops) = DropCounted::new(io::empty());
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(counted);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
