//! # dlt645-rs - A Rust Crate for DL/T 645-2007 Meter Communication
//!
//! The dlt645-rs crate implements both roles of the DL/T 645-2007
//! electricity-meter protocol: a meter server that emulates (or fronts) a
//! physical meter and answers queries about its data items, and a meter
//! client that issues those queries over the same wire protocol. Both
//! roles share the frame codec, the BCD codecs and the data-item
//! catalogue.
//!
//! ## Features
//!
//! - Byte-exact frame encoding and decoding, including the preamble, the
//!   +0x33 data transform and the modulo-256 checksum
//! - Packed-BCD codecs for fixed-point values and calendar time
//! - A catalogue of data items expanded combinatorially from four JSON
//!   seed tables over the electrical dimensions of the 2007 standard
//! - Request and response dispatchers for time sync, data reads and the
//!   address commands, with broadcast-aware authorisation
//! - TCP and serial (RTU) transports with read deadlines and a clean
//!   process-wide shutdown signal
//!
//! ## Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use dlt645_rs::{new_tcp_client, new_tcp_server};
//!
//! # async fn run() -> Result<(), dlt645_rs::Dlt645Error> {
//! let server = new_tcp_server("0.0.0.0:10521", Duration::from_secs(5))?;
//! server.set_energy(0x0000_0000, 123456.78)?;
//! tokio::spawn(async move { server.start().await });
//!
//! let mut client = new_tcp_client("127.0.0.1:10521", Duration::from_secs(5))?;
//! client.connect().await?;
//! let item = client.read_energy(0x0000_0000).await?;
//! println!("{}: {:?} {}", item.name, item.value, item.unit);
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod dlt645;
pub mod error;
pub mod logging;
pub mod payload;
pub mod util;

use std::time::Duration;

pub use dlt645::client::{MeterClient, Transport};
pub use dlt645::frame::{build_frame, deserialize, Frame};
pub use dlt645::serial::{DataBits, Parity, RtuClient, RtuServer, SerialConfig, StopBits};
pub use dlt645::server::{MeterServer, ServerCore};
pub use dlt645::tcp::{TcpClient, TcpServer};
pub use error::Dlt645Error;
pub use logging::{init_logger, log_debug, log_error, log_info, log_warn};
pub use payload::catalog::Catalog;
pub use payload::data_item::{DataItem, Demand, Value};

/// Creates a meter server listening on a TCP socket, with the catalogue
/// seeded from the default config directory.
pub fn new_tcp_server(bind: &str, timeout: Duration) -> Result<MeterServer, Dlt645Error> {
    Ok(MeterServer::tcp(bind, timeout, Catalog::load_default()?))
}

/// Creates a meter client that dials a TCP meter server.
pub fn new_tcp_client(addr: &str, timeout: Duration) -> Result<MeterClient, Dlt645Error> {
    let transport = TcpClient::new(addr, timeout);
    Ok(MeterClient::new(
        Box::new(transport),
        Catalog::load_default()?,
    ))
}

/// Creates a meter server on a serial (RTU) port.
pub fn new_rtu_server(
    port: &str,
    baud_rate: u32,
    data_bits: DataBits,
    stop_bits: StopBits,
    parity: Parity,
    timeout: Duration,
) -> Result<MeterServer, Dlt645Error> {
    let config = SerialConfig {
        port: port.to_string(),
        baud_rate,
        data_bits,
        stop_bits,
        parity,
        timeout,
    };
    Ok(MeterServer::rtu(config, Catalog::load_default()?))
}

/// Creates a meter client on a serial (RTU) port.
pub fn new_rtu_client(
    port: &str,
    baud_rate: u32,
    data_bits: DataBits,
    stop_bits: StopBits,
    parity: Parity,
    timeout: Duration,
) -> Result<MeterClient, Dlt645Error> {
    let config = SerialConfig {
        port: port.to_string(),
        baud_rate,
        data_bits,
        stop_bits,
        parity,
        timeout,
    };
    Ok(MeterClient::new(
        Box::new(RtuClient::new(config)),
        Catalog::load_default()?,
    ))
}
