// src/transcript/mod.rs
//
// Transcripts: the marker set that defines a complete capture, and the parser
// that turns a finished capture into a mesh snapshot.

pub mod markers;
pub mod parser;

pub use markers::{RequiredMarkers, Section, REQUIRED_MARKERS};
pub use parser::{TranscriptParser, DEVICE_KEY_PREFIX_LEN};
