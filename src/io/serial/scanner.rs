// src/io/serial/scanner.rs
//
// Port scanner - waits for the device to show up on one of the candidate ports.
//
// Architecture:
//   - Candidate ports tried in configured order, one session each
//   - Any failure backs off for a fixed delay before the next port
//   - After the last port the cycle starts over, optionally bounded by max_cycles
//   - Cancellation is checked between attempts and during backoff, never mid-line
//   - Each attempt records into `<output>.partial`; only a complete transcript
//     is renamed onto the output path

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use super::link::SerialConnector;
use super::session::{SessionOutcome, SessionRecorder};
use crate::error::{IngestError, IngestResult};
use crate::transcript::RequiredMarkers;

/// Longest single sleep while backing off, so cancellation stays responsive.
const BACKOFF_SLICE: Duration = Duration::from_millis(50);

// ============================================================================
// Configuration
// ============================================================================

/// Retry policy for the scan loop
#[derive(Clone, Debug)]
pub struct ScanConfig {
    /// Delay after every failed attempt
    pub backoff: Duration,
    /// Full passes over the port list before giving up (None = never give up)
    pub max_cycles: Option<u32>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            backoff: Duration::from_secs(5),
            max_cycles: None,
        }
    }
}

/// Which attempt produced the transcript
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanReport {
    pub port: String,
    /// 1-based pass over the port list
    pub cycle: u32,
    pub lines: usize,
    pub transcript: PathBuf,
}

/// Shared cancellation flag for a running scan. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct ScanCancel {
    flag: Arc<AtomicBool>,
}

impl ScanCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Partial transcript file
// ============================================================================

/// Transcript file being written by one attempt.
/// Removed on drop unless committed.
struct PartialTranscript {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl PartialTranscript {
    fn create(output: &Path) -> IngestResult<Self> {
        let mut name = output.as_os_str().to_owned();
        name.push(".partial");
        let path = PathBuf::from(name);
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    fn writer(&mut self) -> IngestResult<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| IngestError::Io(std::io::Error::other("transcript already closed")))
    }

    /// Flush, close and move the transcript onto `output`.
    fn commit(mut self, output: &Path) -> IngestResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        }
        std::fs::rename(&self.path, output)?;
        Ok(())
    }
}

impl Drop for PartialTranscript {
    fn drop(&mut self) {
        // Close before removing
        self.writer = None;
        if self.path.exists() {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

// ============================================================================
// Port Scanner
// ============================================================================

/// Tries candidate ports until one yields a complete transcript.
pub struct PortScanner<C: SerialConnector> {
    connector: C,
    recorder: SessionRecorder,
    config: ScanConfig,
    cancel: ScanCancel,
}

impl<C: SerialConnector> PortScanner<C> {
    pub fn new(connector: C, recorder: SessionRecorder, config: ScanConfig) -> Self {
        Self {
            connector,
            recorder,
            config,
            cancel: ScanCancel::new(),
        }
    }

    /// Use an externally owned cancellation flag.
    pub fn with_cancel(mut self, cancel: ScanCancel) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that stops this scanner between attempts.
    pub fn cancel_handle(&self) -> ScanCancel {
        self.cancel.clone()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Retrieve a complete transcript from whichever port the device is on and
    /// leave it at `output`.
    ///
    /// Blocks until a port delivers every required marker, the scan is
    /// cancelled, or `max_cycles` passes have failed.
    pub fn pull_graph_data(&self, ports: &[String], output: &Path) -> IngestResult<ScanReport> {
        if ports.is_empty() {
            return Err(IngestError::DeviceNotFound {
                ports: Vec::new(),
                cycles: 0,
            });
        }

        let mut cycle: u32 = 0;
        loop {
            cycle += 1;
            if let Some(max) = self.config.max_cycles {
                if cycle > max {
                    tlog!("[scan] Giving up after {} cycle(s)", max);
                    return Err(IngestError::DeviceNotFound {
                        ports: ports.to_vec(),
                        cycles: max,
                    });
                }
            }

            let final_cycle = self.config.max_cycles == Some(cycle);
            for (idx, port) in ports.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    tlog!("[scan] Cancelled before trying {}", port);
                    return Err(IngestError::Cancelled);
                }

                match self.attempt(port, output) {
                    Ok(SessionOutcome::Complete { lines }) => {
                        tlog!(
                            "[scan] Complete transcript from {} ({} lines, cycle {})",
                            port,
                            lines,
                            cycle
                        );
                        return Ok(ScanReport {
                            port: port.clone(),
                            cycle,
                            lines,
                            transcript: output.to_path_buf(),
                        });
                    }
                    Ok(SessionOutcome::TimedOut { .. }) => {
                        let err = IngestError::SessionTimeout {
                            port: port.clone(),
                            idle: self.recorder.config().session_timeout,
                        };
                        tlog!("[scan] {}. Scanning...", err);
                    }
                    Err(IngestError::Connection { .. }) => {
                        tlog!("[scan] No connection yet on port: {}. Scanning...", port);
                    }
                    Err(e) if e.is_retryable() => {
                        tlog!("[scan] Attempt on {} failed: {}. Scanning...", port, e);
                    }
                    Err(e) => return Err(e),
                }

                if final_cycle && idx + 1 == ports.len() {
                    tlog!("[scan] Giving up after {} cycle(s)", cycle);
                    return Err(IngestError::DeviceNotFound {
                        ports: ports.to_vec(),
                        cycles: cycle,
                    });
                }
                self.back_off()?;
            }
        }
    }

    /// One session on one port, recorded into a partial file that is only
    /// kept when the session completes.
    fn attempt(&self, port: &str, output: &Path) -> IngestResult<SessionOutcome> {
        let link = self.connector.open(port)?;

        let mut partial = PartialTranscript::create(output)?;
        let outcome = self
            .recorder
            .run(port, link, partial.writer()?, RequiredMarkers::default())?;

        if outcome.is_complete() {
            partial.commit(output)?;
        }
        Ok(outcome)
    }

    /// Sleep for the backoff delay in short slices, bailing out on cancel.
    fn back_off(&self) -> IngestResult<()> {
        let deadline = Instant::now() + self.config.backoff;
        loop {
            if self.cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(BACKOFF_SLICE.min(deadline - now));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
