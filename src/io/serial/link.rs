// src/io/serial/link.rs
//
// Opening candidate ports. A link is an owned handle scoped to one session:
// whoever opens it drops it, and dropping closes the port.

use serde::{Deserialize, Serialize};
use serialport::{DataBits, Parity as SpParity, StopBits};
use std::io::Read;
use std::time::Duration;

use crate::error::{IngestError, IngestResult};

// ============================================================================
// Types
// ============================================================================

/// Parity setting for serial port configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Line settings applied when a candidate port is opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    /// How long a single `read` may block before reporting `TimedOut`
    pub read_timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        LinkSettings {
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            read_timeout: Duration::from_millis(10),
        }
    }
}

/// Information about an available serial port
#[derive(Clone, Debug, Serialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

// ============================================================================
// Connector
// ============================================================================

/// Opens a candidate port by name.
///
/// The scanner is generic over this so sessions can run against scripted links
/// in tests. A failed open must come back as `IngestError::Connection`.
pub trait SerialConnector {
    type Link: Read;

    fn open(&self, port: &str) -> IngestResult<Self::Link>;
}

/// Connector for real hardware via the `serialport` crate.
#[derive(Clone, Debug, Default)]
pub struct SerialPortConnector {
    settings: LinkSettings,
}

impl SerialPortConnector {
    pub fn new(settings: LinkSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }
}

impl SerialConnector for SerialPortConnector {
    type Link = Box<dyn serialport::SerialPort>;

    fn open(&self, port: &str) -> IngestResult<Self::Link> {
        let s = &self.settings;
        let link = serialport::new(port, s.baud_rate)
            .data_bits(to_serialport_data_bits(s.data_bits))
            .stop_bits(to_serialport_stop_bits(s.stop_bits))
            .parity(to_serialport_parity(s.parity))
            .timeout(s.read_timeout)
            .open()
            .map_err(|e| IngestError::Connection {
                port: port.to_string(),
                message: e.to_string(),
            })?;

        tlog!(
            "[link:{}] Opened at {} baud ({}-{}-{})",
            port,
            s.baud_rate,
            s.data_bits,
            match s.parity {
                Parity::None => 'N',
                Parity::Odd => 'O',
                Parity::Even => 'E',
            },
            s.stop_bits
        );

        Ok(link)
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

fn to_serialport_parity(p: Parity) -> SpParity {
    match p {
        Parity::None => SpParity::None,
        Parity::Odd => SpParity::Odd,
        Parity::Even => SpParity::Even,
    }
}

fn to_serialport_data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

fn to_serialport_stop_bits(bits: u8) -> StopBits {
    match bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    }
}

// ============================================================================
// Port Enumeration
// ============================================================================

/// List available serial ports.
///
/// On macOS only `/dev/cu.*` devices are returned; the `/dev/tty.*` twins block
/// on open waiting for carrier detect.
pub fn list_serial_ports() -> IngestResult<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports()
        .map_err(|e| IngestError::Io(std::io::Error::other(e.to_string())))?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (port_type, manufacturer, product, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    "USB".to_string(),
                    info.manufacturer,
                    info.product,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::BluetoothPort => {
                    ("Bluetooth".to_string(), None, None, None, None)
                }
                serialport::SerialPortType::PciPort => ("PCI".to_string(), None, None, None, None),
                serialport::SerialPortType::Unknown => {
                    ("Unknown".to_string(), None, None, None, None)
                }
            };
            SerialPortInfo {
                port_name: p.port_name,
                port_type,
                manufacturer,
                product,
                vid,
                pid,
            }
        })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
