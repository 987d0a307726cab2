// Handshake and transfer driver
//
// A single loop alternates between wrapping and unwrapping until the engine
// reports that the handshake is settled. Every iteration is bounded: a run of
// more than `max_engine_steps` iterations without fresh transport input or
// the engine consuming or producing bytes is a protocol violation.

use std::io;

use super::sync_tls_close::Side;
use super::sync_tls_streams::Halves;
use crate::config::BridgeConfig;
use crate::crypto::{EngineResult, EngineStatus, HandshakeStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Wrapping,
    Unwrapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// The engine has nothing more to do for now
    Settled,
    /// The engine reported it is closed
    Closed,
}

/// Drives the engine for one adapter operation.
///
/// The step budget is shared by every `drive` call made through the same
/// driver, so a read or write that loops over several drives is bounded too.
pub struct Driver {
    idle_steps: usize,
    max_engine_steps: usize,
    max_buffer_capacity: usize,
}

impl Driver {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            idle_steps: 0,
            max_engine_steps: config.max_engine_steps,
            max_buffer_capacity: config.max_buffer_capacity,
        }
    }

    pub fn drive(&mut self, halves: &mut Halves<'_>, start: Operation) -> io::Result<DriveOutcome> {
        let outcome = self.drive_loop(halves, start);
        halves.release_secondary();
        outcome
    }

    fn drive_loop(&mut self, halves: &mut Halves<'_>, start: Operation) -> io::Result<DriveOutcome> {
        let mut operation = start;
        loop {
            self.idle_steps += 1;
            if self.idle_steps > self.max_engine_steps {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "TLS engine made no progress in {} steps",
                        self.max_engine_steps
                    ),
                ));
            }

            let result = match operation {
                Operation::Wrapping => self.wrap_step(halves)?,
                Operation::Unwrapping => match self.unwrap_step(halves)? {
                    Some(result) => result,
                    None => return Ok(DriveOutcome::Settled),
                },
            };

            log::trace!(
                "{:?}: status={:?} handshake={:?} consumed={} produced={}",
                operation,
                result.status,
                result.handshake_status,
                result.bytes_consumed,
                result.bytes_produced
            );

            match result.status {
                EngineStatus::Closed => return Ok(DriveOutcome::Closed),
                EngineStatus::Overflow => self.grow_destination(halves, operation)?,
                EngineStatus::Underflow => {
                    if !self.fill_wire_in(halves)? {
                        return Ok(DriveOutcome::Settled);
                    }
                }
                EngineStatus::Ok => match result.handshake_status {
                    HandshakeStatus::NeedTask => self.run_delegated_tasks(halves)?,
                    HandshakeStatus::NeedWrap => operation = Operation::Wrapping,
                    HandshakeStatus::NeedUnwrap => operation = Operation::Unwrapping,
                    HandshakeStatus::Finished | HandshakeStatus::NotHandshaking => {
                        halves.shared().mark_handshake_complete();
                        return Ok(DriveOutcome::Settled);
                    }
                },
            }
        }
    }

    /// Wrap `app_out` into `wire_out` and push any ciphertext to the transport.
    fn wrap_step(&mut self, halves: &mut Halves<'_>) -> io::Result<EngineResult> {
        let shared = halves.shared();
        let outbound = halves.outbound();
        let buffers = outbound.buffers()?;
        buffers.wire_out.compact();

        let src_len = buffers.app_out.len();
        let dst_len = buffers.wire_out.remaining_capacity();
        let result = {
            let mut engine = shared.engine.lock();
            let engine = engine.as_mut().ok_or_else(torn_down_error)?;
            engine.wrap(buffers.app_out.as_slice(), buffers.wire_out.write_slice())?
        };
        check_accounting("wrap", &result, src_len, dst_len)?;

        buffers.app_out.consume(result.bytes_consumed);
        buffers.wire_out.advance_write(result.bytes_produced);
        if result.bytes_consumed > 0 || result.bytes_produced > 0 {
            self.idle_steps = 0;
        }

        if !buffers.wire_out.is_empty() {
            outbound.drain_wire_out()?;
        }
        Ok(result)
    }

    /// Unwrap `wire_in` into `app_in`. None if the inbound half could not be
    /// taken because the handshake completed elsewhere.
    fn unwrap_step(&mut self, halves: &mut Halves<'_>) -> io::Result<Option<EngineResult>> {
        let shared = halves.shared();
        let inbound = match halves.inbound() {
            Some(inbound) => inbound,
            None => return Ok(None),
        };
        let buffers = inbound.buffers()?;
        buffers.app_in.compact();

        let src_len = buffers.wire_in.len();
        let dst_len = buffers.app_in.remaining_capacity();
        let result = {
            let mut engine = shared.engine.lock();
            let engine = engine.as_mut().ok_or_else(torn_down_error)?;
            engine.unwrap(buffers.wire_in.as_slice(), buffers.app_in.write_slice())?
        };
        check_accounting("unwrap", &result, src_len, dst_len)?;

        buffers.wire_in.consume(result.bytes_consumed);
        buffers.app_in.advance_write(result.bytes_produced);
        if result.bytes_consumed > 0 || result.bytes_produced > 0 {
            self.idle_steps = 0;
        }
        Ok(Some(result))
    }

    fn grow_destination(&mut self, halves: &mut Halves<'_>, operation: Operation) -> io::Result<()> {
        match operation {
            Operation::Wrapping => {
                let buffers = halves.outbound().buffers()?;
                buffers.wire_out.grow(self.max_buffer_capacity)
            }
            Operation::Unwrapping => match halves.inbound() {
                Some(inbound) => inbound.buffers()?.app_in.grow(self.max_buffer_capacity),
                None => Ok(()),
            },
        }
    }

    /// Returns false if the inbound half is no longer needed because the
    /// handshake completed elsewhere.
    fn fill_wire_in(&mut self, halves: &mut Halves<'_>) -> io::Result<bool> {
        // Don't hold up the writer while blocked on the transport.
        if halves.primary() == Side::Reader {
            halves.release_secondary();
        }
        let inbound = match halves.inbound() {
            Some(inbound) => inbound,
            None => return Ok(false),
        };
        let n = inbound.fill_wire_in(self.max_buffer_capacity)?;
        log::trace!("read {n} bytes from transport");
        self.idle_steps = 0;
        Ok(true)
    }

    fn run_delegated_tasks(&mut self, halves: &mut Halves<'_>) -> io::Result<()> {
        let shared = halves.shared();
        loop {
            let task = {
                let mut engine = shared.engine.lock();
                engine
                    .as_mut()
                    .ok_or_else(torn_down_error)?
                    .delegated_task()
            };
            match task {
                Some(task) => task()?,
                None => return Ok(()),
            }
        }
    }
}

fn torn_down_error() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "TLS streams are closed")
}

fn check_accounting(
    operation: &str,
    result: &EngineResult,
    src_len: usize,
    dst_len: usize,
) -> io::Result<()> {
    if result.bytes_consumed > src_len || result.bytes_produced > dst_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "TLS engine {operation} reported {} bytes consumed of {src_len} and {} produced into {dst_len}",
                result.bytes_consumed, result.bytes_produced
            ),
        ));
    }
    Ok(())
}
