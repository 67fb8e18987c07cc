// src/lib.rs
//
// chatter-mesh: pull the device table and mesh graph out of a ChatterBox
// device over serial and turn the transcript into a typed snapshot.
//
//   PortScanner      tries each candidate port until one session completes
//   SessionRecorder  records lines until all four section markers are seen
//   LineReader       reassembles newline-terminated lines from raw bytes
//   TranscriptParser turns a finished transcript into a MeshSnapshot

#[macro_use]
mod logging;

pub mod error;
pub mod io;
pub mod mesh;
pub mod settings;
pub mod transcript;

use std::path::Path;

pub use error::{IngestError, RunError, TranscriptError};
pub use io::serial::{PortScanner, ScanCancel, ScanReport, SerialConnector, SerialPortConnector, SessionRecorder};
pub use logging::{init_file_logging, stop_file_logging};
pub use mesh::{DisplayMode, Exclusions, MeshSnapshot};
pub use settings::ScanSettings;
pub use transcript::TranscriptParser;

/// Scan `settings.ports` with `connector` until a full transcript has been
/// written to `settings.transcript_path`, then parse it.
pub fn capture_snapshot<C: SerialConnector>(
    connector: C,
    settings: &ScanSettings,
    cancel: ScanCancel,
) -> Result<(ScanReport, MeshSnapshot), RunError> {
    settings.validate().map_err(RunError::Settings)?;

    let scanner = PortScanner::new(
        connector,
        SessionRecorder::new(settings.session_config()),
        settings.scan_config(),
    )
    .with_cancel(cancel);

    let report = scanner.pull_graph_data(&settings.ports, Path::new(&settings.transcript_path))?;
    let snapshot = TranscriptParser::parse_file(&report.transcript)?;

    tlog!(
        "[scan] {} devices, {} mesh entries from {} (cycle {})",
        snapshot.device_table().len(),
        snapshot.mesh_graph().edge_count(),
        report.port,
        report.cycle
    );

    Ok((report, snapshot))
}

/// Entry point for the `chatter-mesh` binary: load settings, scan real
/// hardware, print the direct-link view.
pub fn run() -> Result<(), RunError> {
    let path = settings::settings_path().map_err(RunError::Settings)?;
    let settings = settings::load_settings(&path).map_err(RunError::Settings)?;

    if let Some(dir) = &settings.log_dir {
        init_file_logging(Path::new(dir)).map_err(RunError::Settings)?;
    }

    tlog!("[main] Using settings from {}", path.display());

    let connector = SerialPortConnector::new(settings.link_settings());
    let result = capture_snapshot(connector, &settings, ScanCancel::new());

    if let Ok((_, snapshot)) = &result {
        let edges = mesh::visible_edges(snapshot, DisplayMode::Direct, &Exclusions::default());
        print!("{}", mesh::render_text(snapshot, &edges));
    }

    stop_file_logging();
    result.map(|_| ())
}
