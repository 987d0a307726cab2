// Transport-facing halves of the bridge
//
// The inbound half owns the ciphertext/plaintext receive buffers and the
// transport reader; the outbound half owns the send buffers and the
// transport writer. Buffers go away when the matching adapter closes, the
// transport streams only at teardown.

use std::io::{self, Read, Write};

use crate::grow_buffer::GrowBuffer;

pub enum SideState<B> {
    Open(B),
    Closed,
}

pub struct InboundBuffers {
    /// Ciphertext received from the transport, not yet unwrapped
    pub wire_in: GrowBuffer,
    /// Plaintext unwrapped, not yet handed to the reader
    pub app_in: GrowBuffer,
}

#[derive(Debug)]
pub struct OutboundBuffers {
    /// Plaintext accepted by the writer, not yet wrapped
    pub app_out: GrowBuffer,
    /// Ciphertext wrapped, not yet pushed to the transport
    pub wire_out: GrowBuffer,
}

pub struct Inbound {
    pub state: SideState<InboundBuffers>,
    transport: Option<Box<dyn Read + Send>>,
}

pub struct Outbound {
    pub state: SideState<OutboundBuffers>,
    transport: Option<Box<dyn Write + Send>>,
}

impl Inbound {
    pub fn new(transport: Box<dyn Read + Send>, initial_capacity: usize) -> Self {
        Self {
            state: SideState::Open(InboundBuffers {
                wire_in: GrowBuffer::new(initial_capacity),
                app_in: GrowBuffer::new(initial_capacity),
            }),
            transport: Some(transport),
        }
    }

    pub fn buffers(&mut self) -> io::Result<&mut InboundBuffers> {
        match self.state {
            SideState::Open(ref mut buffers) => Ok(buffers),
            SideState::Closed => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "TLS reader is closed",
            )),
        }
    }

    pub fn close_buffers(&mut self) {
        self.state = SideState::Closed;
    }

    /// Pull more ciphertext from the transport into `wire_in`.
    ///
    /// Issues exactly one successful read. A zero-byte read is end of stream.
    pub fn fill_wire_in(&mut self, max_capacity: usize) -> io::Result<usize> {
        let transport = match self.transport.as_mut() {
            Some(transport) => transport,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "transport reader is closed",
                ));
            }
        };
        let buffers = match self.state {
            SideState::Open(ref mut buffers) => buffers,
            SideState::Closed => {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "TLS reader is closed",
                ));
            }
        };

        let wire_in = &mut buffers.wire_in;
        wire_in.compact();
        if wire_in.remaining_capacity() == 0 {
            wire_in.grow(max_capacity)?;
        }

        loop {
            match transport.read(wire_in.write_slice()) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "transport closed during TLS read",
                    ));
                }
                Ok(n) => {
                    wire_in.advance_write(n);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Drop the buffers and close the transport reader.
    pub fn release(&mut self) {
        self.state = SideState::Closed;
        if self.transport.take().is_some() {
            log::debug!("closed transport reader");
        }
    }
}

impl Outbound {
    pub fn new(transport: Box<dyn Write + Send>, initial_capacity: usize) -> Self {
        Self {
            state: SideState::Open(OutboundBuffers {
                app_out: GrowBuffer::new(initial_capacity),
                wire_out: GrowBuffer::new(initial_capacity),
            }),
            transport: Some(transport),
        }
    }

    pub fn buffers(&mut self) -> io::Result<&mut OutboundBuffers> {
        match self.state {
            SideState::Open(ref mut buffers) => Ok(buffers),
            SideState::Closed => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "TLS writer is closed",
            )),
        }
    }

    pub fn close_buffers(&mut self) {
        self.state = SideState::Closed;
    }

    /// Push all of `wire_out` to the transport and flush it.
    pub fn drain_wire_out(&mut self) -> io::Result<()> {
        let transport = match self.transport.as_mut() {
            Some(transport) => transport,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "transport writer is closed",
                ));
            }
        };
        let buffers = match self.state {
            SideState::Open(ref mut buffers) => buffers,
            SideState::Closed => {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "TLS writer is closed",
                ));
            }
        };

        transport.write_all(buffers.wire_out.as_slice())?;
        transport.flush()?;
        buffers.wire_out.clear();
        Ok(())
    }

    /// Drop the buffers and close the transport writer.
    pub fn release(&mut self) {
        self.state = SideState::Closed;
        if let Some(mut transport) = self.transport.take() {
            // Unflushed ciphertext is discarded, but give buffered writers a
            // chance to push out what they already hold.
            if let Err(e) = transport.flush() {
                log::warn!("failed to flush transport writer on close: {e}");
            }
            log::debug!("closed transport writer");
        }
    }

    #[cfg(test)]
    pub fn is_released(&self) -> bool {
        self.transport.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{EmptyReader, RecordingWriter, pipe};

    #[test]
    fn test_fill_wire_in_reads_once() {
        let (reader, mut writer) = pipe(4);
        writer.write_all(b"0123456789").unwrap();
        let mut inbound = Inbound::new(Box::new(reader), 16);

        assert_eq!(inbound.fill_wire_in(1024).unwrap(), 4);
        assert_eq!(inbound.buffers().unwrap().wire_in.as_slice(), b"0123");
        assert_eq!(inbound.fill_wire_in(1024).unwrap(), 4);
        assert_eq!(inbound.buffers().unwrap().wire_in.as_slice(), b"01234567");
    }

    #[test]
    fn test_fill_wire_in_grows_when_full() {
        let (reader, mut writer) = pipe(64);
        writer.write_all(b"abcdefgh").unwrap();
        let mut inbound = Inbound::new(Box::new(reader), 4);

        assert_eq!(inbound.fill_wire_in(1024).unwrap(), 4);
        assert_eq!(inbound.fill_wire_in(1024).unwrap(), 4);
        let buffers = inbound.buffers().unwrap();
        assert_eq!(buffers.wire_in.capacity(), 8);
        assert_eq!(buffers.wire_in.as_slice(), b"abcdefgh");
    }

    #[test]
    fn test_fill_wire_in_eof() {
        let reader = EmptyReader::default();
        let mut inbound = Inbound::new(Box::new(reader.clone()), 16);
        let err = inbound.fill_wire_in(1024).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(reader.reads.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fill_wire_in_at_capacity_limit() {
        let (reader, mut writer) = pipe(64);
        writer.write_all(b"abcdefgh").unwrap();
        let mut inbound = Inbound::new(Box::new(reader), 4);
        inbound.fill_wire_in(4).unwrap();
        let err = inbound.fill_wire_in(4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::OutOfMemory);
    }

    #[test]
    fn test_drain_wire_out() {
        let writer = RecordingWriter::default();
        let mut outbound = Outbound::new(Box::new(writer.clone()), 16);
        outbound
            .buffers()
            .unwrap()
            .wire_out
            .extend_from_slice(b"ciphertext");
        outbound.drain_wire_out().unwrap();

        assert_eq!(writer.written.lock().as_slice(), b"ciphertext");
        assert_eq!(writer.flushes.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(outbound.buffers().unwrap().wire_out.is_empty());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut outbound = Outbound::new(Box::new(RecordingWriter::default()), 16);
        outbound.release();
        assert!(outbound.is_released());
        outbound.release();
        assert_eq!(
            outbound.buffers().unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
        assert_eq!(
            outbound.drain_wire_out().unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }
}
