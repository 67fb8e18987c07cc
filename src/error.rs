// src/error.rs
//
// Error types for serial ingestion and transcript parsing.

use std::time::Duration;
use thiserror::Error;

use crate::transcript::Section;

/// Errors raised while capturing a transcript from a serial device.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The port could not be opened. Expected while no device is attached.
    #[error("Failed to open {port}: {message}")]
    Connection { port: String, message: String },

    #[error("No bytes received within {waited:?}")]
    LineTimeout { waited: Duration },

    #[error("Serial link disconnected")]
    Disconnected,

    /// Reading from an open link failed, e.g. the device was unplugged.
    #[error("Serial link failed: {source}")]
    Link {
        #[source]
        source: std::io::Error,
    },

    #[error("Session on {port} idle for {idle:?} before all markers were seen")]
    SessionTimeout { port: String, idle: Duration },

    #[error("Scan cancelled")]
    Cancelled,

    #[error("No complete transcript from {ports:?} after {cycles} cycle(s)")]
    DeviceNotFound { ports: Vec<String>, cycles: u32 },

    /// Transcript file or sink failure. Not retried.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Whether the scanner should back off and move on to the next port.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::Connection { .. }
                | IngestError::LineTimeout { .. }
                | IngestError::Disconnected
                | IngestError::Link { .. }
                | IngestError::SessionTimeout { .. }
        )
    }
}

/// A transcript that will never yield a snapshot, no matter how long we wait.
#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("{section} header not found in transcript")]
    MissingHeader { section: Section },

    #[error("{section} header on line {header_line} is not followed by a payload line")]
    MissingPayload { section: Section, header_line: usize },

    #[error("{section} payload on line {line} is not valid: {source}")]
    InvalidPayload {
        section: Section,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Device key {key:?} is shorter than its {prefix_len}-character prefix plus an address")]
    ShortDeviceKey { key: String, prefix_len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a complete scan-then-parse run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("{0}")]
    Settings(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
pub type TranscriptResult<T> = std::result::Result<T, TranscriptError>;
