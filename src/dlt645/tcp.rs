//! # TCP Transport
//!
//! Server side: an accept loop that spawns one handler task per
//! connection. Each handler reads with a short deadline so it can
//! observe the shutdown signal between reads; complete frames go through
//! the shared dispatcher and the response bytes are written back.
//!
//! Client side: a dialer with one synchronous request/response exchange
//! per call, write and read both bounded by the configured timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;

use crate::constants::READ_BUF_LEN;
use crate::dlt645::client::Transport;
use crate::dlt645::frame::deserialize;
use crate::dlt645::server::ServerCore;
use crate::error::Dlt645Error;
use crate::util::hex::format_hex_spaced;

/// Per-iteration read deadline on server connections, so handlers can
/// poll the shutdown flag between reads. Unrelated to the configured
/// client-facing timeout.
const SHUTDOWN_POLL: Duration = Duration::from_millis(500);

/// TCP accept loop for the meter server.
pub struct TcpServer {
    bind: String,
    timeout: Duration,
    shutdown: watch::Sender<bool>,
}

impl TcpServer {
    pub fn new(bind: impl Into<String>, timeout: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        TcpServer {
            bind: bind.into(),
            timeout,
            shutdown,
        }
    }

    /// Accepts connections until [`TcpServer::stop`] is called, spawning
    /// an independent handler per connection.
    pub async fn start(&self, core: Arc<ServerCore>) -> Result<(), Dlt645Error> {
        let listener = TcpListener::bind(&self.bind).await?;
        info!("TCP meter server listening on {}", listener.local_addr()?);

        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return Ok(());
        }
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("accepted connection from {peer}");
                        tokio::spawn(handle_connection(
                            stream,
                            core.clone(),
                            self.shutdown.subscribe(),
                            self.timeout,
                        ));
                    }
                    Err(e) => warn!("accept failed: {e}"),
                },
            }
        }
        info!("TCP meter server shut down");
        Ok(())
    }

    /// Signals the accept loop and every live handler to exit.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    core: Arc<ServerCore>,
    shutdown: watch::Receiver<bool>,
    write_timeout: Duration,
) {
    let mut buf = [0u8; READ_BUF_LEN];
    loop {
        if *shutdown.borrow() {
            debug!("connection handler observed shutdown");
            break;
        }
        let n = match timeout(SHUTDOWN_POLL, stream.read(&mut buf)).await {
            Err(_) => continue, // deadline: poll the shutdown flag again
            Ok(Ok(0)) => break, // peer closed
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                warn!("connection read error: {e}");
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
                match timeout(write_timeout, stream.write_all(&response)).await {
                    Ok(Ok(())) => debug!("sent {}", format_hex_spaced(&response)),
                    Ok(Err(e)) => {
                        warn!("response write failed: {e}");
                        break;
                    }
                    Err(_) => {
                        warn!("response write timed out");
                        break;
                    }
                }
            }
            // unknown codes and bad addresses get silence, not a synthetic frame
            Err(e) => warn!("request not served: {e}"),
        }
    }
}

/// TCP dialer for the meter client.
pub struct TcpClient {
    addr: String,
    timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpClient {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        TcpClient {
            addr: addr.into(),
            timeout,
            stream: None,
        }
    }
}

#[async_trait]
impl Transport for TcpClient {
    async fn connect(&mut self) -> Result<(), Dlt645Error> {
        let stream = timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| Dlt645Error::IoTimeout)??;
        info!("connected to meter server at {}", self.addr);
        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Dlt645Error> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await.ok();
            info!("disconnected from {}", self.addr);
        }
        Ok(())
    }

    async fn send_request(&mut self, frame: &[u8]) -> Result<Vec<u8>, Dlt645Error> {
        let stream = self.stream.as_mut().ok_or(Dlt645Error::IoClosed)?;

        timeout(self.timeout, stream.write_all(frame))
            .await
            .map_err(|_| Dlt645Error::IoTimeout)??;

        // a DLT645 response fits one read
        let mut buf = [0u8; READ_BUF_LEN];
        let n = timeout(self.timeout, stream.read(&mut buf))
            .await
            .map_err(|_| Dlt645Error::IoTimeout)??;
        if n == 0 {
            return Err(Dlt645Error::IoClosed);
        }
        Ok(buf[..n].to_vec())
    }
}
