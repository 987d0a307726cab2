// Record-oriented crypto engines
//
// This module defines the engine capability the synchronous bridge drives,
// and the rustls implementation of it.

mod crypto_engine;
mod rustls_engine;

pub use crypto_engine::{
    CryptoEngine, DelegatedTask, EngineResult, EngineStatus, HandshakeStatus,
};
pub use rustls_engine::RustlsEngine;
