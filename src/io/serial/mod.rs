// src/io/serial/mod.rs
//
// Serial ingestion: line reassembly, single-port sessions and the port scanner.
//
// Flow: PortScanner -> SessionRecorder -> LineReader (bytes in, lines out),
// with every line appended to the transcript file.

pub mod line_reader;
pub mod link;
pub mod scanner;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use line_reader::{LineReader, DEFAULT_POLL_INTERVAL};
pub use link::{list_serial_ports, LinkSettings, Parity, SerialConnector, SerialPortConnector, SerialPortInfo};
pub use scanner::{PortScanner, ScanCancel, ScanConfig, ScanReport};
pub use session::{SessionConfig, SessionOutcome, SessionRecorder};
