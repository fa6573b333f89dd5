//! The dlt645 module contains the core protocol implementation: the frame
//! codec, the server and client dispatchers, and the TCP and serial (RTU)
//! transports that feed them.

pub mod client;
pub mod frame;
pub mod serial;
pub mod server;
pub mod tcp;

pub use client::{MeterClient, Transport};
pub use frame::{build_frame, deserialize, Frame};
pub use serial::{RtuClient, RtuServer, SerialConfig};
pub use server::{MeterServer, ServerCore};
pub use tcp::{TcpClient, TcpServer};
