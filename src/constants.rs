//! DL/T 645-2007 Protocol Constants
//!
//! This module defines the constants used in the DL/T 645-2007 protocol
//! implementation: frame markers, control codes, well-known addresses,
//! data-format patterns and the device exception bitmap.

/// Frame start marker, appears twice per frame.
pub const FRAME_START: u8 = 0x68;

/// Frame end marker.
pub const FRAME_END: u8 = 0x16;

/// Preamble filler byte, sent before the first start marker to wake
/// slow UART receivers.
pub const PREAMBLE_BYTE: u8 = 0xFE;

/// Number of preamble bytes emitted by the encoder.
pub const PREAMBLE_LEN: usize = 4;

/// Offset added to every data-field byte on the wire so that payload
/// bytes cannot collide with the frame markers.
pub const DATA_OFFSET: u8 = 0x33;

/// Meter address length in bytes.
pub const ADDR_LEN: usize = 6;

/// Password length in bytes.
pub const PASSWORD_LEN: usize = 4;

/// Data identifier (DI) length in bytes.
pub const DI_LEN: usize = 4;

/// Read buffer size for all transports. DL/T 645 frames carry at most
/// 200 data bytes, so a complete frame always fits.
pub const READ_BUF_LEN: usize = 256;

// ----------------------------------------------------------------------------
// Control codes (request direction; responses set CTRL_RESPONSE_FLAG)
// ----------------------------------------------------------------------------

/// Broadcast time synchronisation.
pub const CTRL_TIME_SYNC: u8 = 0x08;
/// Read a data item.
pub const CTRL_READ_DATA: u8 = 0x11;
/// Read the following data block (multi-frame reads).
pub const CTRL_READ_FOLLOWING: u8 = 0x12;
/// Read the meter communication address.
pub const CTRL_READ_ADDRESS: u8 = 0x13;
/// Write a data item.
pub const CTRL_WRITE_DATA: u8 = 0x14;
/// Write the meter communication address.
pub const CTRL_WRITE_ADDRESS: u8 = 0x15;
/// Freeze command.
pub const CTRL_FREEZE: u8 = 0x16;
/// Change the communication baud rate.
pub const CTRL_CHANGE_BAUD: u8 = 0x17;
/// Change the meter password.
pub const CTRL_CHANGE_PASSWORD: u8 = 0x18;
/// Reset the maximum demand registers.
pub const CTRL_RESET_DEMAND: u8 = 0x19;
/// Reset the meter.
pub const CTRL_RESET_METER: u8 = 0x1A;
/// Reset event counters.
pub const CTRL_RESET_EVENTS: u8 = 0x1B;

/// Set in the control code of every slave-to-master frame.
pub const CTRL_RESPONSE_FLAG: u8 = 0x80;
/// Set in the control code of an exception response; the first data
/// byte then carries the exception bitmap.
pub const CTRL_EXCEPTION_FLAG: u8 = 0x40;

// ----------------------------------------------------------------------------
// Well-known addresses
// ----------------------------------------------------------------------------

/// Broadcast address used by masters that do not know the meter address
/// yet. Accepted by the meter for the address commands only.
pub const BROADCAST_ADDR: [u8; 6] = [0xAA; 6];

/// Broadcast address accepted for the time-sync control code only.
pub const BROADCAST_TIME_ADDR: [u8; 6] = [0x99; 6];

// ----------------------------------------------------------------------------
// DI classes (highest byte of the data identifier)
// ----------------------------------------------------------------------------

pub const DI_CLASS_ENERGY: u8 = 0x00;
pub const DI_CLASS_DEMAND: u8 = 0x01;
pub const DI_CLASS_VARIABLE: u8 = 0x02;
pub const DI_CLASS_EVENT: u8 = 0x03;
pub const DI_CLASS_PARAMETER: u8 = 0x04;

/// Settlement-day back-references per expanded item: di0 = 0 is the
/// current value, di0 = k the k-th previous settlement day.
pub const SETTLEMENT_DAYS: usize = 13;

/// Rate slots per energy/demand sub-class: di1 = 0 is the all-rate
/// total, di1 = 1..63 the individual rates.
pub const RATE_SLOTS: usize = 64;

/// Parameter DIs inside this range hold a tariff schedule: a list of
/// [`TARIFF_SCHEDULE_SLOTS`] switching entries instead of one string.
pub const TARIFF_SCHEDULE_FIRST: u32 = 0x0401_0000;
pub const TARIFF_SCHEDULE_LAST: u32 = 0x0402_0008;
pub const TARIFF_SCHEDULE_SLOTS: usize = 14;

// ----------------------------------------------------------------------------
// Data-format patterns
// ----------------------------------------------------------------------------

/// Energy registers: eight digits, two decimals.
pub const FORMAT_ENERGY: &str = "XXXXXX.XX";
/// Demand registers: six digits, four decimals.
pub const FORMAT_DEMAND: &str = "XX.XXXX";
/// Communication address: twelve packed digits.
pub const FORMAT_ADDRESS: &str = "XXXXXXXXXXXX";
/// Calendar date plus weekday.
pub const FORMAT_DATE_WEEK: &str = "YYMMDDWW";
/// Wall-clock time of day.
pub const FORMAT_TIME: &str = "HHMMSS";
/// Calendar timestamp down to the minute.
pub const FORMAT_DATETIME: &str = "YYMMDDHHMM";

// ----------------------------------------------------------------------------
// Device exception bitmap (first data byte of an exception response)
// ----------------------------------------------------------------------------

pub const EXC_OTHER: u8 = 0b000_0001;
pub const EXC_NO_REQUEST_DATA: u8 = 0b000_0010;
pub const EXC_AUTH_FAILED: u8 = 0b000_0100;
pub const EXC_BAUD_IMMUTABLE: u8 = 0b000_1000;
pub const EXC_YEAR_ZONES_EXCEEDED: u8 = 0b001_0000;
pub const EXC_DAY_SLOTS_EXCEEDED: u8 = 0b010_0000;
pub const EXC_RATE_COUNT_EXCEEDED: u8 = 0b100_0000;
