// Core modules for the Ignix client driver
pub mod error; // DriverError + ProtocolError
pub mod config; // DriverConfig + builder, default host/port
pub mod protocol; // Command, Reply, multi-bulk request encoder
pub mod buffer; // ReceiveBuffer (bytes + cursor, compaction)
pub mod decode; // Decoder (incremental reply parsing with rollback)
pub mod transport; // Transport trait + mio TcpTransport
pub mod driver; // Driver::open/request (the request/reply cycle)
pub mod shared; // SharedDriver (mutex-guarded handle)

// Re-export all public items from modules for easier access
pub use error::*;
pub use config::*;
pub use protocol::*;
pub use buffer::*;
pub use decode::*;
pub use transport::*;
pub use driver::*;
pub use shared::*;
