// src/io/serial/testing.rs
//
// Scripted stand-ins for serial hardware, shared by the serial tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read};
use std::time::{Duration, Instant};

use super::link::SerialConnector;
use super::scanner::ScanCancel;
use crate::error::{IngestError, IngestResult};

/// A link that plays back a fixed byte script.
///
/// With a byte interval set, one byte becomes readable per interval; reads in
/// between report `TimedOut` like a real port with a short read timeout.
/// Once the script runs out the link hangs up (`Ok(0)`), stays open and
/// silent, or fails every read.
#[derive(Clone, Debug)]
pub(crate) struct ScriptedLink {
    bytes: VecDeque<u8>,
    interval: Duration,
    next_ready: Option<Instant>,
    stay_open: bool,
    fail_with: Option<io::ErrorKind>,
}

impl ScriptedLink {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into().into(),
            interval: Duration::ZERO,
            next_ready: None,
            stay_open: false,
            fail_with: None,
        }
    }

    /// A device that is attached but never says anything.
    pub fn silent() -> Self {
        Self::new(Vec::new()).stay_open()
    }

    pub fn byte_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn stay_open(mut self) -> Self {
        self.stay_open = true;
        self
    }

    /// Once the script runs out, every read fails with `kind`.
    pub fn fail_with(mut self, kind: io::ErrorKind) -> Self {
        self.fail_with = Some(kind);
        self
    }
}

impl Read for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.bytes.is_empty() {
            if let Some(kind) = self.fail_with {
                return Err(io::Error::from(kind));
            }
            return if self.stay_open {
                Err(io::Error::from(io::ErrorKind::TimedOut))
            } else {
                Ok(0)
            };
        }

        if self.interval.is_zero() {
            let n = buf.len().min(self.bytes.len());
            for (slot, byte) in buf.iter_mut().zip(self.bytes.drain(..n)) {
                *slot = byte;
            }
            return Ok(n);
        }

        let now = Instant::now();
        match self.next_ready {
            Some(ready) if now >= ready && !buf.is_empty() => {
                buf[0] = self.bytes.pop_front().unwrap_or_default();
                self.next_ready = Some(now + self.interval);
                Ok(1)
            }
            Some(_) => Err(io::Error::from(io::ErrorKind::TimedOut)),
            None => {
                self.next_ready = Some(now + self.interval);
                Err(io::Error::from(io::ErrorKind::TimedOut))
            }
        }
    }
}

/// Connector that hands out clones of scripted links by port name.
/// Ports without a script fail to open.
#[derive(Default)]
pub(crate) struct ScriptedConnector {
    links: HashMap<String, ScriptedLink>,
    opened: RefCell<Vec<String>>,
    cancel_after: Option<(usize, ScanCancel)>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_link(mut self, port: &str, link: ScriptedLink) -> Self {
        self.links.insert(port.to_string(), link);
        self
    }

    /// Trip `cancel` once `opens` open attempts have been made.
    pub fn cancel_after(mut self, opens: usize, cancel: ScanCancel) -> Self {
        self.cancel_after = Some((opens, cancel));
        self
    }

    /// Every port an open was attempted on, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }
}

impl SerialConnector for ScriptedConnector {
    type Link = ScriptedLink;

    fn open(&self, port: &str) -> IngestResult<ScriptedLink> {
        self.opened.borrow_mut().push(port.to_string());
        if let Some((opens, cancel)) = &self.cancel_after {
            if self.opened.borrow().len() >= *opens {
                cancel.cancel();
            }
        }

        self.links
            .get(port)
            .cloned()
            .ok_or_else(|| IngestError::Connection {
                port: port.to_string(),
                message: "No such file or directory".to_string(),
            })
    }
}

/// The four marker lines wrapped around the given payloads, with some of the
/// diagnostic chatter the firmware prints in between.
pub(crate) fn transcript_text(devices_json: &str, mesh_json: &str) -> String {
    format!(
        "boot: radio up\n\
         = Begin Devices =\n\
         {devices_json}\n\
         = End Devices =\n\
         rssi sweep done\n\
         = Mesh Graph =\n\
         {mesh_json}\n\
         = End Mesh Graph =\n"
    )
}
