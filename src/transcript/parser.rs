// src/transcript/parser.rs
//
// Extracts the Devices and Mesh Graph payloads from a finished transcript.
//
// Each section is located on its own: after its open marker, the first line
// that starts with `{` in column one is the whole payload as one JSON object.
// Lines in between (diagnostics, blank lines, indented text) are skipped.
// Later repeats of a section are ignored.

use std::collections::BTreeMap;
use std::path::Path;

use super::markers::Section;
use crate::error::{TranscriptError, TranscriptResult};
use crate::mesh::{DeviceTable, MeshGraph, MeshSnapshot};

/// Characters in front of the device address in every Devices payload key.
pub const DEVICE_KEY_PREFIX_LEN: usize = 5;

// ============================================================================
// Section state machine
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
enum SectionState {
    AwaitingHeader,
    AwaitingPayload { header_line: usize },
    Captured { line: usize, payload: String },
}

/// Locates one section's payload. Line numbers are 1-based.
#[derive(Clone, Debug)]
struct SectionScan {
    section: Section,
    state: SectionState,
}

impl SectionScan {
    fn new(section: Section) -> Self {
        Self {
            section,
            state: SectionState::AwaitingHeader,
        }
    }

    fn feed(&mut self, line_no: usize, line: &str) {
        match self.state {
            SectionState::AwaitingHeader => {
                if line.contains(self.section.open_marker()) {
                    tlog!("[transcript] Found {} header on line {}", self.section, line_no);
                    self.state = SectionState::AwaitingPayload { header_line: line_no };
                }
            }
            SectionState::AwaitingPayload { .. } => {
                if line.starts_with('{') {
                    self.state = SectionState::Captured {
                        line: line_no,
                        payload: line.to_string(),
                    };
                }
            }
            SectionState::Captured { .. } => {}
        }
    }

    fn is_captured(&self) -> bool {
        matches!(self.state, SectionState::Captured { .. })
    }

    /// The payload line and its number, or why there is none.
    fn finish(self) -> TranscriptResult<(usize, String)> {
        match self.state {
            SectionState::AwaitingHeader => Err(TranscriptError::MissingHeader {
                section: self.section,
            }),
            SectionState::AwaitingPayload { header_line } => Err(TranscriptError::MissingPayload {
                section: self.section,
                header_line,
            }),
            SectionState::Captured { line, payload } => Ok((line, payload)),
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Turns a completed transcript into a `MeshSnapshot`.
///
/// Parsing only reads its input, so the same transcript always produces the
/// same snapshot.
pub struct TranscriptParser;

impl TranscriptParser {
    /// Parse transcript lines.
    pub fn parse<I, S>(lines: I) -> TranscriptResult<MeshSnapshot>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut devices = SectionScan::new(Section::Devices);
        let mut mesh = SectionScan::new(Section::MeshGraph);

        for (idx, line) in lines.into_iter().enumerate() {
            let line = line.as_ref();
            devices.feed(idx + 1, line);
            mesh.feed(idx + 1, line);
            if devices.is_captured() && mesh.is_captured() {
                break;
            }
        }

        let (devices_line, devices_payload) = devices.finish()?;
        let (mesh_line, mesh_payload) = mesh.finish()?;

        let devices = parse_devices(devices_line, &devices_payload)?;
        let graph = parse_mesh_graph(mesh_line, &mesh_payload)?;

        tlog!(
            "[transcript] Loaded {} devices and {} graph entries",
            devices.len(),
            graph.edge_count()
        );

        Ok(MeshSnapshot::new(devices, graph))
    }

    /// Parse a whole transcript held in memory.
    pub fn parse_str(text: &str) -> TranscriptResult<MeshSnapshot> {
        Self::parse(text.lines())
    }

    /// Parse a transcript file. The file must be complete; the scanner only
    /// moves a transcript into place once its session has finished.
    pub fn parse_file(path: &Path) -> TranscriptResult<MeshSnapshot> {
        let text = std::fs::read_to_string(path)?;
        Self::parse_str(&text)
    }
}

/// Device ID carried by a Devices payload key.
pub fn device_id_from_key(key: &str) -> TranscriptResult<&str> {
    match key.char_indices().nth(DEVICE_KEY_PREFIX_LEN) {
        Some((offset, _)) => Ok(&key[offset..]),
        None => Err(TranscriptError::ShortDeviceKey {
            key: key.to_string(),
            prefix_len: DEVICE_KEY_PREFIX_LEN,
        }),
    }
}

fn parse_devices(line: usize, payload: &str) -> TranscriptResult<DeviceTable> {
    let raw: BTreeMap<String, String> =
        serde_json::from_str(payload).map_err(|source| TranscriptError::InvalidPayload {
            section: Section::Devices,
            line,
            source,
        })?;

    let mut devices = DeviceTable::new();
    for (key, name) in raw {
        let id = device_id_from_key(&key)?;
        if let Some(previous) = devices.insert(id, name) {
            tlog!(
                "[transcript] Device {} listed twice, replacing {:?}",
                id,
                previous
            );
        }
    }
    Ok(devices)
}

fn parse_mesh_graph(line: usize, payload: &str) -> TranscriptResult<MeshGraph> {
    serde_json::from_str(payload).map_err(|source| TranscriptError::InvalidPayload {
        section: Section::MeshGraph,
        line,
        source,
    })
}

// ============================================================================
// Tests
// ============================================================================
