//! Dispatcher tests: server request handling, client response handling,
//! and the two wired together through an in-memory loopback transport.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dlt645_rs::constants::{
    BROADCAST_ADDR, BROADCAST_TIME_ADDR, CTRL_READ_ADDRESS, CTRL_READ_DATA, CTRL_RESPONSE_FLAG,
    CTRL_TIME_SYNC, CTRL_WRITE_ADDRESS, EXC_AUTH_FAILED,
};
use dlt645_rs::{
    build_frame, deserialize, Catalog, Demand, Dlt645Error, Frame, MeterClient, ServerCore,
    Transport, Value,
};

const METER_ADDR: [u8; 6] = [0x50, 0x05, 0x00, 0x66, 0x16, 0x57];

fn server_core() -> Arc<ServerCore> {
    let core = ServerCore::new(Catalog::load_default().unwrap());
    core.set_address(METER_ADDR);
    Arc::new(core)
}

/// Runs requests straight into a server core, the way a transport would.
/// The server answering nothing surfaces to the caller as a timeout.
struct Loopback {
    core: Arc<ServerCore>,
}

#[async_trait]
impl Transport for Loopback {
    async fn connect(&mut self) -> Result<(), Dlt645Error> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Dlt645Error> {
        Ok(())
    }

    async fn send_request(&mut self, frame: &[u8]) -> Result<Vec<u8>, Dlt645Error> {
        let frame = deserialize(frame)?;
        self.core
            .handle_request(&frame)
            .map_err(|_| Dlt645Error::NoResponse)
    }
}

/// Replays a canned byte sequence regardless of the request.
struct Canned {
    response: Vec<u8>,
}

#[async_trait]
impl Transport for Canned {
    async fn connect(&mut self) -> Result<(), Dlt645Error> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Dlt645Error> {
        Ok(())
    }

    async fn send_request(&mut self, _frame: &[u8]) -> Result<Vec<u8>, Dlt645Error> {
        Ok(self.response.clone())
    }
}

fn client_for(core: Arc<ServerCore>) -> MeterClient {
    let mut client = MeterClient::new(
        Box::new(Loopback { core }),
        Catalog::load_default().unwrap(),
    );
    client.set_address(METER_ADDR);
    client
}

fn read_request(di: u32) -> Vec<u8> {
    build_frame(&METER_ADDR, CTRL_READ_DATA, &di.to_le_bytes())
}

// --- scenario S1: energy read -----------------------------------------------

#[test]
fn test_energy_read_server_side() {
    let core = server_core();
    core.set_energy(0x0000_0000, 123456.78).unwrap();

    let request = deserialize(&read_request(0x0000_0000)).unwrap();
    let response = core.handle_request(&request).unwrap();
    let frame = deserialize(&response).unwrap();

    assert_eq!(frame.ctrl, CTRL_READ_DATA | CTRL_RESPONSE_FLAG);
    assert_eq!(frame.data.len(), 8);
    assert_eq!(&frame.data[..4], &[0x00, 0x00, 0x00, 0x00]);
    assert_eq!(&frame.data[4..], &[0x78, 0x56, 0x34, 0x12]);
}

#[tokio::test]
async fn test_energy_read_end_to_end() {
    let core = server_core();
    core.set_energy(0x0000_0000, 123456.78).unwrap();

    let mut client = client_for(core);
    let item = client.read_energy(0x0000_0000).await.unwrap();
    assert_eq!(item.value, Value::Float(123456.78));
    assert_eq!(item.format, "XXXXXX.XX");
    assert_eq!(item.unit, "kWh");
    assert!(item.name.contains("Combined active energy"));
}

// --- scenario S2: demand read ------------------------------------------------

#[test]
fn test_demand_read_preserves_occurrence_time() {
    let core = server_core();
    let occur = NaiveDate::from_ymd_opt(2025, 11, 2)
        .unwrap()
        .and_hms_opt(12, 9, 0)
        .unwrap();
    core.set_demand(
        0x0101_0000,
        Demand {
            value: 50.5,
            occur_time: occur,
        },
    )
    .unwrap();

    let request = deserialize(&read_request(0x0101_0000)).unwrap();
    let response = core.handle_request(&request).unwrap();
    let frame = deserialize(&response).unwrap();

    assert_eq!(frame.data.len(), 12);
    assert_eq!(&frame.data[..4], &[0x00, 0x00, 0x01, 0x01]);
    assert_eq!(&frame.data[4..7], &[0x00, 0x50, 0x50]);
    assert_eq!(&frame.data[7..12], &[0x09, 0x12, 0x02, 0x11, 0x25]);
}

#[tokio::test]
async fn test_demand_read_end_to_end() {
    let core = server_core();
    let occur = NaiveDate::from_ymd_opt(2025, 11, 2)
        .unwrap()
        .and_hms_opt(12, 9, 0)
        .unwrap();
    core.set_demand(
        0x0101_0000,
        Demand {
            value: 50.5,
            occur_time: occur,
        },
    )
    .unwrap();

    let mut client = client_for(core);
    let item = client.read_demand(0x0101_0000).await.unwrap();
    match item.value {
        Value::Demand(demand) => {
            assert_eq!(demand.value, 50.5);
            assert_eq!(demand.occur_time, occur);
        }
        other => panic!("expected a demand value, got {other:?}"),
    }
}

// --- scenario S3: read-address broadcast -------------------------------------

#[tokio::test]
async fn test_read_address_broadcast_learns_address() {
    let core = server_core();
    let mut client = MeterClient::new(
        Box::new(Loopback { core }),
        Catalog::load_default().unwrap(),
    );
    assert_eq!(client.address(), [0u8; 6]);

    let item = client.read_address().await.unwrap();
    assert_eq!(client.address(), METER_ADDR);
    assert_eq!(item.value, Value::Bytes(METER_ADDR.to_vec()));
}

#[tokio::test]
async fn test_write_address_round_trip() {
    let core = server_core();
    let mut client = client_for(core.clone());
    let new_addr = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
    client.write_address(new_addr).await.unwrap();
    assert_eq!(core.address(), new_addr);
}

// --- scenario S4: parameter schedule -----------------------------------------

#[tokio::test]
async fn test_tariff_schedule_round_trip() {
    let core = server_core();
    let schedule: Vec<String> = (1..=14).map(|i| format!("1209{i:02}")).collect();
    core.set_parameter(0x0401_0000, Value::DigitsList(schedule.clone()))
        .unwrap();

    // wire form: each entry becomes three little-endian BCD bytes
    let request = deserialize(&read_request(0x0401_0000)).unwrap();
    let response = core.handle_request(&request).unwrap();
    let frame = deserialize(&response).unwrap();
    assert_eq!(frame.data.len(), 4 + 14 * 3);
    assert_eq!(&frame.data[4..7], &[0x01, 0x09, 0x12]);

    let mut client = client_for(core);
    let item = client.read_parameter(0x0401_0000).await.unwrap();
    assert_eq!(item.value, Value::DigitsList(schedule));
}

#[tokio::test]
async fn test_single_parameter_round_trip() {
    let core = server_core();
    core.set_parameter(0x0400_0101, Value::Digits("25110212".to_string()))
        .unwrap();

    let mut client = client_for(core);
    let item = client.read_parameter(0x0400_0101).await.unwrap();
    assert_eq!(item.value, Value::Digits("25110212".to_string()));
}

// --- scenario S5: silence on unknown DI, exception decode --------------------

#[tokio::test]
async fn test_unknown_di_yields_no_response() {
    let core = server_core();
    let request = deserialize(&read_request(0x0000_0063)).unwrap();
    assert!(matches!(
        core.handle_request(&request),
        Err(Dlt645Error::UnknownDi(0x0000_0063))
    ));

    let mut client = client_for(core);
    assert!(matches!(
        client.read_energy(0x0000_0063).await,
        Err(Dlt645Error::NoResponse)
    ));
}

#[tokio::test]
async fn test_device_exception_is_reported() {
    let response = build_frame(
        &METER_ADDR,
        CTRL_READ_DATA | CTRL_RESPONSE_FLAG | 0x40,
        &[EXC_AUTH_FAILED],
    );
    let mut client = MeterClient::new(
        Box::new(Canned { response }),
        Catalog::load_default().unwrap(),
    );
    client.set_address(METER_ADDR);
    assert!(matches!(
        client.read_energy(0x0000_0000).await,
        Err(Dlt645Error::DeviceException(code)) if code == EXC_AUTH_FAILED
    ));
}

// --- scenario S6: corrupted checksum surfaces to the caller ------------------

#[tokio::test]
async fn test_bad_checksum_surfaces() {
    let core = server_core();
    core.set_energy(0x0000_0000, 1.0).unwrap();
    let request = deserialize(&read_request(0x0000_0000)).unwrap();
    let mut response = core.handle_request(&request).unwrap();
    let checksum_pos = response.len() - 2;
    response[checksum_pos] ^= 0xFF;

    let mut client = MeterClient::new(
        Box::new(Canned { response }),
        Catalog::load_default().unwrap(),
    );
    client.set_address(METER_ADDR);
    assert!(matches!(
        client.read_energy(0x0000_0000).await,
        Err(Dlt645Error::BadChecksum { .. })
    ));
}

// --- property P5: address authorisation --------------------------------------

#[test]
fn test_authorisation_matrix() {
    let core = server_core();
    core.set_energy(0x0000_0000, 1.0).unwrap();

    // addressed to the meter: served
    let served = deserialize(&read_request(0x0000_0000)).unwrap();
    assert!(core.handle_request(&served).is_ok());

    // any other unicast address: dropped
    let stranger = Frame {
        address: [0x01; 6],
        ctrl: CTRL_READ_DATA,
        data: 0u32.to_le_bytes().to_vec(),
    };
    assert!(matches!(
        core.handle_request(&stranger),
        Err(Dlt645Error::Unauthorized)
    ));

    // the AA broadcast works for the address commands only
    let broadcast_read = Frame {
        address: BROADCAST_ADDR,
        ctrl: CTRL_READ_ADDRESS,
        data: vec![],
    };
    assert!(core.handle_request(&broadcast_read).is_ok());
    let broadcast_data = Frame {
        address: BROADCAST_ADDR,
        ctrl: CTRL_READ_DATA,
        data: 0u32.to_le_bytes().to_vec(),
    };
    assert!(matches!(
        core.handle_request(&broadcast_data),
        Err(Dlt645Error::Unauthorized)
    ));

    // the 99 broadcast works for time sync only
    let time_sync = Frame {
        address: BROADCAST_TIME_ADDR,
        ctrl: CTRL_TIME_SYNC,
        data: 1_762_085_340i64.to_le_bytes().to_vec(),
    };
    assert!(core.handle_request(&time_sync).is_ok());
    let time_broadcast_read = Frame {
        address: BROADCAST_TIME_ADDR,
        ctrl: CTRL_READ_DATA,
        data: 0u32.to_le_bytes().to_vec(),
    };
    assert!(matches!(
        core.handle_request(&time_broadcast_read),
        Err(Dlt645Error::Unauthorized)
    ));
}

// --- time sync ----------------------------------------------------------------

#[test]
fn test_time_sync_updates_clock_and_echoes() {
    let core = server_core();
    let timestamp: i64 = 1_762_085_340; // 2025-11-02T12:09:00Z
    let frame = Frame {
        address: BROADCAST_TIME_ADDR,
        ctrl: CTRL_TIME_SYNC,
        data: timestamp.to_le_bytes().to_vec(),
    };
    let response = core.handle_request(&frame).unwrap();
    let parsed = deserialize(&response).unwrap();
    assert_eq!(parsed.ctrl, CTRL_TIME_SYNC | CTRL_RESPONSE_FLAG);
    assert_eq!(parsed.data, timestamp.to_le_bytes().to_vec());
    assert_eq!(core.time().and_utc().timestamp(), timestamp);
}

// --- unknown control code ------------------------------------------------------

#[test]
fn test_unknown_control_code_not_answered() {
    let core = server_core();
    let frame = Frame {
        address: METER_ADDR,
        ctrl: CTRL_WRITE_ADDRESS + 0x60, // something outside the table
        data: vec![],
    };
    assert!(matches!(
        core.handle_request(&frame),
        Err(Dlt645Error::UnknownCtrl(_))
    ));
}
