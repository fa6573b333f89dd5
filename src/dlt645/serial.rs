//! # Serial (RTU) Transport
//!
//! Server side: the port is the single connection; the read loop is the
//! TCP handler's, minus the accept. Serial reads cannot be cancelled
//! mid-flight on every platform, so the loop keeps each read short and
//! races it against the shutdown signal.
//!
//! Client side: writes the full frame, then keeps reading into a growing
//! buffer until an end marker shows up past the fixed header or the
//! deadline passes. Bytes collected by the deadline are returned as-is;
//! silence is [`Dlt645Error::NoResponse`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::{timeout, Instant};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

pub use tokio_serial::{DataBits, Parity, StopBits};

use crate::constants::{FRAME_END, READ_BUF_LEN};
use crate::dlt645::client::Transport;
use crate::dlt645::frame::deserialize;
use crate::dlt645::server::ServerCore;
use crate::error::Dlt645Error;
use crate::util::hex::format_hex_spaced;

/// Per-iteration read deadline on the server loop; see the TCP twin.
const SHUTDOWN_POLL: Duration = Duration::from_millis(500);

/// Serial line settings shared by both roles.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub timeout: Duration,
}

impl SerialConfig {
    /// 8N1 at the given baud rate.
    pub fn new(port: impl Into<String>, baud_rate: u32, timeout: Duration) -> Self {
        SerialConfig {
            port: port.into(),
            baud_rate,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            timeout,
        }
    }
}

fn open_port(config: &SerialConfig) -> Result<SerialStream, Dlt645Error> {
    tokio_serial::new(&config.port, config.baud_rate)
        .data_bits(config.data_bits)
        .stop_bits(config.stop_bits)
        .parity(config.parity)
        .timeout(config.timeout)
        .open_native_async()
        .map_err(|e| Dlt645Error::SerialPort(e.to_string()))
}

/// Serial read loop for the meter server.
pub struct RtuServer {
    config: SerialConfig,
    shutdown: watch::Sender<bool>,
}

impl RtuServer {
    pub fn new(config: SerialConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        RtuServer { config, shutdown }
    }

    /// Serves requests from the port until [`RtuServer::stop`] is called.
    pub async fn start(&self, core: Arc<ServerCore>) -> Result<(), Dlt645Error> {
        let mut port = open_port(&self.config)?;
        info!("RTU meter server started on {}", self.config.port);

        let mut shutdown = self.shutdown.subscribe();
        let mut buf = [0u8; READ_BUF_LEN];
        loop {
            if *shutdown.borrow() {
                break;
            }
            let read = tokio::select! {
                _ = shutdown.changed() => break,
                read = timeout(SHUTDOWN_POLL, port.read(&mut buf)) => read,
            };
            let n = match read {
                Err(_) => continue, // deadline: poll the shutdown flag again
                Ok(Ok(0)) => continue,
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    warn!("serial read error: {e}");
                    break;
                }
            };

            debug!("received {}", format_hex_spaced(&buf[..n]));
            let frame = match deserialize(&buf[..n]) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("frame decode failed: {e}");
                    continue;
                }
            };

            match core.handle_request(&frame) {
                Ok(response) => {
                    if let Err(e) = port.write_all(&response).await {
                        warn!("response write failed: {e}");
                        break;
                    }
                    debug!("sent {}", format_hex_spaced(&response));
                }
                Err(e) => warn!("request not served: {e}"),
            }
        }
        info!("RTU meter server shut down");
        Ok(())
    }

    /// Signals the read loop to exit at its next deadline.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Whether an accumulated response holds at least one complete frame:
/// an end marker at or past the fixed header length.
pub(crate) fn frame_complete(buf: &[u8]) -> bool {
    buf.len() >= 11 && buf[10..].contains(&FRAME_END)
}

/// Serial dialer for the meter client.
pub struct RtuClient {
    config: SerialConfig,
    port: Option<SerialStream>,
}

impl RtuClient {
    pub fn new(config: SerialConfig) -> Self {
        RtuClient { config, port: None }
    }
}

#[async_trait]
impl Transport for RtuClient {
    async fn connect(&mut self) -> Result<(), Dlt645Error> {
        let port = open_port(&self.config)?;
        info!("RTU client connected to {}", self.config.port);
        self.port = Some(port);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Dlt645Error> {
        // dropping the stream closes the port
        if self.port.take().is_some() {
            info!("RTU client disconnected from {}", self.config.port);
        }
        Ok(())
    }

    async fn send_request(&mut self, frame: &[u8]) -> Result<Vec<u8>, Dlt645Error> {
        let port = self.port.as_mut().ok_or(Dlt645Error::IoClosed)?;

        port.write_all(frame).await?;

        let mut response = BytesMut::with_capacity(READ_BUF_LEN);
        let mut buf = [0u8; READ_BUF_LEN];
        let deadline = Instant::now() + self.config.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, port.read(&mut buf)).await {
                Err(_) => break, // deadline reached
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    response.extend_from_slice(&buf[..n]);
                    if frame_complete(&response) {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    if response.is_empty() {
                        return Err(e.into());
                    }
                    warn!("serial read error after partial response: {e}");
                    break;
                }
            }
        }

        if response.is_empty() {
            return Err(Dlt645Error::NoResponse);
        }
        Ok(response.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlt645::frame::build_frame;

    #[test]
    fn test_frame_complete_on_whole_frame() {
        let raw = build_frame(&[0u8; 6], 0x91, &[0x00, 0x00, 0x00, 0x00]);
        assert!(frame_complete(&raw[4..]));
        assert!(frame_complete(&raw));
    }

    #[test]
    fn test_frame_incomplete_without_end_marker() {
        let raw = build_frame(&[0u8; 6], 0x91, &[0x00, 0x00, 0x00, 0x00]);
        assert!(!frame_complete(&raw[..raw.len() - 1]));
        assert!(!frame_complete(&[0x16; 5]));
    }
}
