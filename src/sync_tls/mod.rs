// Blocking TLS streams over a record-oriented crypto engine
//
// SyncTlsStreams owns the engine, four growable buffers and the transport
// halves, and splits into a SyncTlsReader and SyncTlsWriter that can be
// used from different threads.

mod sync_tls_close;
mod sync_tls_driver;
mod sync_tls_reader_writer;
mod sync_tls_streams;
mod sync_tls_transport;


pub use sync_tls_reader_writer::{SyncTlsReader, SyncTlsWriter};
pub use sync_tls_streams::{SyncTlsStreams, TransportShutdown};
