//! # Meter Client
//!
//! The client role: synchronous request/response over one owned
//! connection. A read call encodes a request frame, transmits it through
//! the [`Transport`], decodes the single response frame and dispatches
//! on the response control code to produce a typed [`DataItem`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::constants::{
    ADDR_LEN, BROADCAST_ADDR, BROADCAST_TIME_ADDR, CTRL_READ_ADDRESS, CTRL_READ_DATA,
    CTRL_RESPONSE_FLAG, CTRL_TIME_SYNC, CTRL_WRITE_ADDRESS, DI_CLASS_DEMAND, DI_CLASS_ENERGY,
    DI_CLASS_PARAMETER, DI_CLASS_VARIABLE, DI_LEN, FORMAT_ADDRESS, FORMAT_DATETIME, PASSWORD_LEN,
    TARIFF_SCHEDULE_FIRST, TARIFF_SCHEDULE_LAST, TARIFF_SCHEDULE_SLOTS,
};
use crate::dlt645::frame::{build_frame, deserialize, Frame};
use crate::error::Dlt645Error;
use crate::payload::catalog::Catalog;
use crate::payload::data_item::{DataItem, Demand, Value};
use crate::util::codec::{
    bcd_to_digits, bcd_to_float, bcd_to_time, bytes_to_i64_le, format_digit_count, reverse_bytes,
    Endian, TIME_BCD_LEN,
};
use crate::util::hex::format_hex_spaced;

/// A client-side connection: connect, disconnect, and one synchronous
/// request/response exchange.
#[async_trait]
pub trait Transport: Send {
    async fn connect(&mut self) -> Result<(), Dlt645Error>;
    async fn disconnect(&mut self) -> Result<(), Dlt645Error>;
    /// Writes a complete frame and returns the peer's response bytes.
    async fn send_request(&mut self, frame: &[u8]) -> Result<Vec<u8>, Dlt645Error>;
}

/// The client role state: its own address and password, the shared
/// catalogue for response metadata, and the owned connection.
pub struct MeterClient {
    address: [u8; ADDR_LEN],
    password: [u8; PASSWORD_LEN],
    catalog: Catalog,
    conn: Box<dyn Transport>,
}

impl MeterClient {
    pub fn new(conn: Box<dyn Transport>, catalog: Catalog) -> Self {
        MeterClient {
            address: [0u8; ADDR_LEN],
            password: [0u8; PASSWORD_LEN],
            catalog,
            conn,
        }
    }

    pub async fn connect(&mut self) -> Result<(), Dlt645Error> {
        self.conn.connect().await
    }

    pub async fn disconnect(&mut self) -> Result<(), Dlt645Error> {
        self.conn.disconnect().await
    }

    /// The meter address this client talks to.
    pub fn address(&self) -> [u8; ADDR_LEN] {
        self.address
    }

    /// Sets the target meter address. Leave at the default and use
    /// [`MeterClient::read_address`] with the broadcast to discover it.
    pub fn set_address(&mut self, address: [u8; ADDR_LEN]) {
        self.address = address;
    }

    pub fn set_password(&mut self, password: [u8; PASSWORD_LEN]) {
        self.password = password;
    }

    /// The password sent with authenticated commands.
    pub fn password(&self) -> [u8; PASSWORD_LEN] {
        self.password
    }

    /// Reads an energy register (`di3 = 0x00`).
    pub async fn read_energy(&mut self, di: u32) -> Result<DataItem, Dlt645Error> {
        self.read_item(di).await
    }

    /// Reads a demand register and its occurrence time (`di3 = 0x01`).
    pub async fn read_demand(&mut self, di: u32) -> Result<DataItem, Dlt645Error> {
        self.read_item(di).await
    }

    /// Reads an instantaneous variable (`di3 = 0x02`).
    pub async fn read_variable(&mut self, di: u32) -> Result<DataItem, Dlt645Error> {
        self.read_item(di).await
    }

    /// Reads a parameter (`di3 = 0x04`).
    pub async fn read_parameter(&mut self, di: u32) -> Result<DataItem, Dlt645Error> {
        self.read_item(di).await
    }

    /// Reads the meter's communication address. Send with the broadcast
    /// address when the meter address is unknown; the response updates
    /// this client's target address.
    pub async fn read_address(&mut self) -> Result<DataItem, Dlt645Error> {
        // an unset client address falls back to the discovery broadcast
        let target = if self.address == [0u8; ADDR_LEN] {
            BROADCAST_ADDR
        } else {
            self.address
        };
        let raw = build_frame(&target, CTRL_READ_ADDRESS, &[]);
        self.send_and_handle(raw).await
    }

    /// Writes a new communication address into the meter.
    pub async fn write_address(&mut self, new: [u8; ADDR_LEN]) -> Result<DataItem, Dlt645Error> {
        let raw = build_frame(&self.address, CTRL_WRITE_ADDRESS, &new);
        self.send_and_handle(raw).await
    }

    async fn read_item(&mut self, di: u32) -> Result<DataItem, Dlt645Error> {
        let raw = build_frame(&self.address, CTRL_READ_DATA, &di.to_le_bytes());
        self.send_and_handle(raw).await
    }

    /// Transmits one request and decodes the response into a data item.
    async fn send_and_handle(&mut self, raw: Vec<u8>) -> Result<DataItem, Dlt645Error> {
        debug!("sending {}", format_hex_spaced(&raw));
        let response = self.conn.send_request(&raw).await?;
        debug!("received {}", format_hex_spaced(&response));
        let frame = deserialize(&response)?;
        self.handle_response(&frame)
    }

    /// Accept responses addressed to us; the address commands and the
    /// two broadcast aliases are exempt, mirroring the server side.
    fn authorized(&self, frame: &Frame) -> bool {
        matches!(
            frame.ctrl & !CTRL_RESPONSE_FLAG,
            CTRL_READ_ADDRESS | CTRL_WRITE_ADDRESS
        ) || frame.address == BROADCAST_ADDR
            || frame.address == BROADCAST_TIME_ADDR
            || frame.address == self.address
    }

    /// Dispatches one parsed response frame into a typed data item.
    pub fn handle_response(&mut self, frame: &Frame) -> Result<DataItem, Dlt645Error> {
        if frame.is_exception() {
            let code = frame.data.first().copied().unwrap_or(0);
            warn!("device exception response, code {code:#04x}");
            return Err(Dlt645Error::DeviceException(code));
        }
        if !self.authorized(frame) {
            warn!(
                "dropping response from unexpected address {}",
                format_hex_spaced(&frame.address)
            );
            return Err(Dlt645Error::Unauthorized);
        }

        match frame.ctrl {
            ctrl if ctrl == (CTRL_TIME_SYNC | CTRL_RESPONSE_FLAG) => {
                let stamp = frame
                    .data
                    .get(..4)
                    .ok_or(Dlt645Error::InvalidLength(frame.data.len() as u8))?;
                let time = DateTime::from_timestamp(bytes_to_i64_le(stamp), 0)
                    .ok_or(Dlt645Error::InvalidValue)?;
                Ok(self.synthetic_item(
                    "meter wall clock",
                    FORMAT_DATETIME,
                    Value::Time(time.naive_utc()),
                ))
            }
            ctrl if ctrl == (CTRL_READ_DATA | CTRL_RESPONSE_FLAG) => {
                self.handle_read_response(frame)
            }
            ctrl if ctrl == (CTRL_READ_ADDRESS | CTRL_RESPONSE_FLAG) => {
                if let Ok(address) = <[u8; ADDR_LEN]>::try_from(frame.data.as_slice()) {
                    self.address = address;
                    debug!("meter address learned: {}", format_hex_spaced(&address));
                }
                Ok(self.synthetic_item(
                    "communication address",
                    FORMAT_ADDRESS,
                    Value::Bytes(frame.data.clone()),
                ))
            }
            ctrl if ctrl == (CTRL_WRITE_ADDRESS | CTRL_RESPONSE_FLAG) => Ok(self.synthetic_item(
                "communication address",
                FORMAT_ADDRESS,
                Value::Bytes(frame.data.clone()),
            )),
            other => {
                warn!("unknown response control code {other:#04x}");
                Err(Dlt645Error::UnknownCtrl(other))
            }
        }
    }

    /// Decodes a read-data response on its DI class.
    fn handle_read_response(&mut self, frame: &Frame) -> Result<DataItem, Dlt645Error> {
        let di = frame
            .di()
            .ok_or(Dlt645Error::InvalidLength(frame.data.len() as u8))?;
        let di3 = frame.data[DI_LEN - 1];
        let body = &frame.data[DI_LEN..];
        let mut item = self.catalog.get(di)?;
        item.timestamp = Utc::now().timestamp();

        match di3 {
            DI_CLASS_ENERGY => {
                let bcd = body.get(..4).ok_or(Dlt645Error::Truncated)?;
                item.value = Value::Float(bcd_to_float(bcd, &item.format, Endian::Little)?);
            }
            DI_CLASS_DEMAND => {
                let bcd = body.get(..3).ok_or(Dlt645Error::Truncated)?;
                let time = body.get(3..3 + TIME_BCD_LEN).ok_or(Dlt645Error::Truncated)?;
                item.value = Value::Demand(Demand {
                    value: bcd_to_float(bcd, &item.format, Endian::Little)?,
                    occur_time: bcd_to_time(time)?,
                });
            }
            DI_CLASS_VARIABLE => {
                let width = format_digit_count(&item.format) / 2;
                let bcd = body.get(..width).ok_or(Dlt645Error::Truncated)?;
                item.value = Value::Float(bcd_to_float(bcd, &item.format, Endian::Little)?);
            }
            DI_CLASS_PARAMETER => {
                // parameters travel little-endian but are named big-endian,
                // so each sub-buffer reverses before digit extraction
                if (TARIFF_SCHEDULE_FIRST..=TARIFF_SCHEDULE_LAST).contains(&di) {
                    let step = format_digit_count(&item.format) / 2;
                    let mut entries = Vec::with_capacity(TARIFF_SCHEDULE_SLOTS);
                    for slot in 0..TARIFF_SCHEDULE_SLOTS {
                        let Some(bcd) = body.get(slot * step..(slot + 1) * step) else {
                            break;
                        };
                        entries.push(bcd_to_digits(&reverse_bytes(bcd))?);
                    }
                    item.value = Value::DigitsList(entries);
                } else {
                    item.value = Value::Digits(bcd_to_digits(&reverse_bytes(body))?);
                }
            }
            other => {
                warn!("unknown data class {other:#04x} in read response");
                return Err(Dlt645Error::UnknownDi3(other));
            }
        }
        Ok(item)
    }

    fn synthetic_item(&self, name: &str, format: &str, value: Value) -> DataItem {
        DataItem {
            di: 0,
            name: name.to_string(),
            format: format.to_string(),
            value,
            unit: String::new(),
            timestamp: Utc::now().timestamp(),
        }
    }
}
