// Record-oriented crypto engine capability
//
// The bridge only ever talks to an engine through this trait, so any
// transport-security implementation that can express "wrap", "unwrap",
// "what does the handshake need next" and "run this task for me" can be
// plugged in.

use std::io;

/// Outcome of a single wrap or unwrap call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// The call completed; consult the handshake status for what comes next
    Ok,
    /// The engine is closed in this direction and will produce no more data
    Closed,
    /// The destination buffer was too small to hold the output
    Overflow,
    /// The source buffer did not hold enough input to make progress
    Underflow,
}

/// What the engine needs next to make handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// A delegated task must be run before wrap/unwrap can continue
    NeedTask,
    /// The engine has output to produce
    NeedWrap,
    /// The engine is waiting for peer input
    NeedUnwrap,
    /// The handshake completed during this call
    Finished,
    /// No handshake is in progress
    NotHandshaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineResult {
    pub status: EngineStatus,
    pub handshake_status: HandshakeStatus,
    /// Bytes taken from the source slice
    pub bytes_consumed: usize,
    /// Bytes written to the front of the destination slice
    pub bytes_produced: usize,
}

impl EngineResult {
    pub fn new(
        status: EngineStatus,
        handshake_status: HandshakeStatus,
        bytes_consumed: usize,
        bytes_produced: usize,
    ) -> Self {
        Self {
            status,
            handshake_status,
            bytes_consumed,
            bytes_produced,
        }
    }
}

/// CPU-bound work the engine hands back to the caller.
///
/// Tasks are run inline on the thread that is driving the engine, and
/// any error they return is propagated unchanged.
pub type DelegatedTask = Box<dyn FnOnce() -> io::Result<()> + Send>;

/// A non-blocking transport-security engine.
///
/// Implementations never perform IO themselves: `wrap` turns plaintext from
/// `src` into ciphertext in `dst`, and `unwrap` turns ciphertext from `src`
/// into plaintext in `dst`. Either call may consume or produce zero bytes
/// while the handshake is in progress.
pub trait CryptoEngine: Send {
    fn wrap(&mut self, src: &[u8], dst: &mut [u8]) -> io::Result<EngineResult>;

    fn unwrap(&mut self, src: &[u8], dst: &mut [u8]) -> io::Result<EngineResult>;

    fn handshake_status(&self) -> HandshakeStatus;

    /// Take the next pending delegated task, if any.
    fn delegated_task(&mut self) -> Option<DelegatedTask>;
}
