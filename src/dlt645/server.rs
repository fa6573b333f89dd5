//! # Meter Server
//!
//! The server role: per-meter state (address, password, wall clock and
//! the catalogue handle) plus the request dispatcher that turns one
//! parsed frame into its response bytes. The dispatcher is pure and
//! non-blocking; the transports in [`crate::dlt645::tcp`] and
//! [`crate::dlt645::serial`] feed it and write whatever it returns.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime};
use log::{debug, info, warn};

use crate::constants::{
    ADDR_LEN, BROADCAST_ADDR, BROADCAST_TIME_ADDR, CTRL_READ_ADDRESS, CTRL_READ_DATA,
    CTRL_RESPONSE_FLAG, CTRL_TIME_SYNC, CTRL_WRITE_ADDRESS, DI_CLASS_DEMAND, DI_CLASS_ENERGY,
    DI_CLASS_PARAMETER, DI_CLASS_VARIABLE, DI_LEN, PASSWORD_LEN, TARIFF_SCHEDULE_FIRST,
    TARIFF_SCHEDULE_LAST,
};
use crate::dlt645::frame::{build_frame, Frame};
use crate::dlt645::serial::{RtuServer, SerialConfig};
use crate::dlt645::tcp::TcpServer;
use crate::error::Dlt645Error;
use crate::payload::catalog::Catalog;
use crate::payload::data_item::{Demand, Value};
use crate::util::codec::{bytes_to_i64_le, digits_to_bcd, float_to_bcd, time_to_bcd, Endian};
use crate::util::hex::format_hex_spaced;

/// Shared per-meter state and the request dispatcher.
pub struct ServerCore {
    address: RwLock<[u8; ADDR_LEN]>,
    password: RwLock<[u8; PASSWORD_LEN]>,
    clock: RwLock<NaiveDateTime>,
    catalog: Catalog,
}

impl ServerCore {
    pub fn new(catalog: Catalog) -> Self {
        ServerCore {
            address: RwLock::new([0u8; ADDR_LEN]),
            password: RwLock::new([0u8; PASSWORD_LEN]),
            clock: RwLock::new(Local::now().naive_local()),
            catalog,
        }
    }

    /// The meter's own communication address.
    pub fn address(&self) -> [u8; ADDR_LEN] {
        *self.address.read().expect("address lock poisoned")
    }

    /// Sets the meter's own communication address.
    pub fn set_address(&self, address: [u8; ADDR_LEN]) {
        *self.address.write().expect("address lock poisoned") = address;
        info!("meter address set to {}", format_hex_spaced(&address));
    }

    /// Sets the meter password.
    pub fn set_password(&self, password: [u8; PASSWORD_LEN]) {
        *self.password.write().expect("password lock poisoned") = password;
        info!("meter password updated");
    }

    /// The password checked by authenticated commands.
    pub fn password(&self) -> [u8; PASSWORD_LEN] {
        *self.password.read().expect("password lock poisoned")
    }

    /// The meter wall clock as last synchronised.
    pub fn time(&self) -> NaiveDateTime {
        *self.clock.read().expect("clock lock poisoned")
    }

    /// Writes an energy register (`di3 = 0x00`).
    pub fn set_energy(&self, di: u32, value: f32) -> Result<(), Dlt645Error> {
        self.catalog.set(di, Value::Float(value))
    }

    /// Writes a demand register with its occurrence time (`di3 = 0x01`).
    pub fn set_demand(&self, di: u32, demand: Demand) -> Result<(), Dlt645Error> {
        self.catalog.set(di, Value::Demand(demand))
    }

    /// Writes an instantaneous variable (`di3 = 0x02`).
    pub fn set_variable(&self, di: u32, value: f32) -> Result<(), Dlt645Error> {
        self.catalog.set(di, Value::Float(value))
    }

    /// Writes a parameter: a digit string, or a digit-string list for
    /// tariff-schedule DIs (`di3 = 0x04`).
    pub fn set_parameter(&self, di: u32, value: Value) -> Result<(), Dlt645Error> {
        self.catalog.set(di, value)
    }

    /// The shared catalogue handle.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// A request is served iff it is addressed to this meter, or uses a
    /// broadcast address together with the control code that broadcast
    /// exists for.
    fn authorized(&self, frame: &Frame) -> bool {
        frame.address == self.address()
            || (frame.address == BROADCAST_ADDR
                && matches!(frame.ctrl, CTRL_READ_ADDRESS | CTRL_WRITE_ADDRESS))
            || (frame.address == BROADCAST_TIME_ADDR && frame.ctrl == CTRL_TIME_SYNC)
    }

    /// Turns one parsed request frame into its response bytes.
    ///
    /// Errors are reported to the transport, which logs and continues
    /// without answering; a confused peer never receives a synthetic
    /// frame.
    pub fn handle_request(&self, frame: &Frame) -> Result<Vec<u8>, Dlt645Error> {
        if !self.authorized(frame) {
            warn!(
                "dropping request from unauthorized address {}",
                format_hex_spaced(&frame.address)
            );
            return Err(Dlt645Error::Unauthorized);
        }

        match frame.ctrl {
            CTRL_TIME_SYNC => {
                debug!("time sync: {}", format_hex_spaced(&frame.data));
                self.sync_clock(&frame.data);
                Ok(build_frame(
                    &frame.address,
                    frame.ctrl | CTRL_RESPONSE_FLAG,
                    &frame.data,
                ))
            }
            CTRL_READ_DATA => self.handle_read(frame),
            CTRL_READ_ADDRESS => {
                let own = self.address();
                Ok(build_frame(&own, frame.ctrl | CTRL_RESPONSE_FLAG, &own))
            }
            CTRL_WRITE_ADDRESS => {
                let new: [u8; ADDR_LEN] = frame
                    .data
                    .get(..ADDR_LEN)
                    .and_then(|bytes| bytes.try_into().ok())
                    .ok_or(Dlt645Error::InvalidLength(frame.data.len() as u8))?;
                self.set_address(new);
                Ok(build_frame(
                    &self.address(),
                    frame.ctrl | CTRL_RESPONSE_FLAG,
                    &[],
                ))
            }
            other => {
                warn!("unknown control code {other:#04x}");
                Err(Dlt645Error::UnknownCtrl(other))
            }
        }
    }

    /// Dispatches a read request on the DI class byte.
    fn handle_read(&self, frame: &Frame) -> Result<Vec<u8>, Dlt645Error> {
        let di = frame
            .di()
            .ok_or(Dlt645Error::InvalidLength(frame.data.len() as u8))?;
        let di3 = frame.data[DI_LEN - 1];

        let mut payload = frame.data[..DI_LEN].to_vec();
        match di3 {
            DI_CLASS_ENERGY => {
                let item = self.catalog.get(di)?;
                let value = item.value.as_f32().unwrap_or(0.0);
                payload.extend(float_to_bcd(value, &item.format, Endian::Little)?);
            }
            DI_CLASS_DEMAND => {
                let item = self.catalog.get(di)?;
                let (value, occur_time) = match item.value.as_demand() {
                    Some(demand) => (demand.value, demand.occur_time),
                    None => (0.0, self.time()),
                };
                payload.extend(float_to_bcd(value, &item.format, Endian::Little)?);
                payload.extend(time_to_bcd(&occur_time));
                debug!("demand read response: {}", format_hex_spaced(&payload));
            }
            DI_CLASS_VARIABLE => {
                let item = self.catalog.get(di)?;
                let value = item.value.as_f32().unwrap_or(0.0);
                payload.extend(float_to_bcd(value, &item.format, Endian::Little)?);
            }
            DI_CLASS_PARAMETER => {
                let item = self.catalog.get(di)?;
                if (TARIFF_SCHEDULE_FIRST..=TARIFF_SCHEDULE_LAST).contains(&di) {
                    let Value::DigitsList(entries) = &item.value else {
                        return Err(Dlt645Error::InvalidValue);
                    };
                    for entry in entries {
                        payload.extend(digits_to_bcd(entry, Endian::Little)?);
                    }
                } else {
                    let digits = item.value.as_digits().ok_or(Dlt645Error::InvalidValue)?;
                    payload.extend(digits_to_bcd(digits, Endian::Little)?);
                }
            }
            other => {
                warn!("unknown data class {other:#04x} in read request");
                return Err(Dlt645Error::UnknownDi3(other));
            }
        }

        Ok(build_frame(
            &frame.address,
            frame.ctrl | CTRL_RESPONSE_FLAG,
            &payload,
        ))
    }

    /// Interprets the time-sync payload as little-endian Unix seconds
    /// and moves the meter clock.
    fn sync_clock(&self, payload: &[u8]) {
        let timestamp = bytes_to_i64_le(payload);
        match DateTime::from_timestamp(timestamp, 0) {
            Some(t) => {
                *self.clock.write().expect("clock lock poisoned") = t.naive_utc();
                info!("meter clock synchronised to {timestamp}");
            }
            None => warn!("time sync carried unrepresentable timestamp {timestamp}"),
        }
    }
}

/// One meter instance bound to a transport. Hosts a single meter address
/// and its broadcast aliases; state does not persist across restarts.
pub struct MeterServer {
    core: Arc<ServerCore>,
    transport: ServerTransport,
}

enum ServerTransport {
    Tcp(TcpServer),
    Rtu(RtuServer),
}

impl MeterServer {
    /// Creates a meter server listening on a TCP socket.
    pub fn tcp(bind: impl Into<String>, timeout: Duration, catalog: Catalog) -> Self {
        MeterServer {
            core: Arc::new(ServerCore::new(catalog)),
            transport: ServerTransport::Tcp(TcpServer::new(bind, timeout)),
        }
    }

    /// Creates a meter server on a serial (RTU) port.
    pub fn rtu(config: SerialConfig, catalog: Catalog) -> Self {
        MeterServer {
            core: Arc::new(ServerCore::new(catalog)),
            transport: ServerTransport::Rtu(RtuServer::new(config)),
        }
    }

    /// Runs the transport until [`MeterServer::stop`] is called. All
    /// live connections observe the shutdown within their next read
    /// deadline.
    pub async fn start(&self) -> Result<(), Dlt645Error> {
        match &self.transport {
            ServerTransport::Tcp(tcp) => tcp.start(self.core.clone()).await,
            ServerTransport::Rtu(rtu) => rtu.start(self.core.clone()).await,
        }
    }

    /// Signals the accept loop and every connection handler to exit.
    pub fn stop(&self) {
        match &self.transport {
            ServerTransport::Tcp(tcp) => tcp.stop(),
            ServerTransport::Rtu(rtu) => rtu.stop(),
        }
    }

    /// The role state and dispatcher, shared with the transport tasks.
    pub fn core(&self) -> &Arc<ServerCore> {
        &self.core
    }

    pub fn set_address(&self, address: [u8; ADDR_LEN]) {
        self.core.set_address(address);
    }

    pub fn set_password(&self, password: [u8; PASSWORD_LEN]) {
        self.core.set_password(password);
    }

    pub fn set_energy(&self, di: u32, value: f32) -> Result<(), Dlt645Error> {
        self.core.set_energy(di, value)
    }

    pub fn set_demand(&self, di: u32, demand: Demand) -> Result<(), Dlt645Error> {
        self.core.set_demand(di, demand)
    }

    pub fn set_variable(&self, di: u32, value: f32) -> Result<(), Dlt645Error> {
        self.core.set_variable(di, value)
    }

    pub fn set_parameter(&self, di: u32, value: Value) -> Result<(), Dlt645Error> {
        self.core.set_parameter(di, value)
    }
}
