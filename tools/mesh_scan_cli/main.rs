// tools/mesh_scan_cli/main.rs
//
// Command-line front end for scanning a ChatterBox mesh over serial.
//
//   mesh_scan_cli                         scan the configured ports, print direct links
//   mesh_scan_cli --port /dev/ttyACM2     scan only the given port(s)
//   mesh_scan_cli --parse-only            re-parse the last transcript without scanning
//   mesh_scan_cli --list-ports            show what the OS reports and exit

use std::path::PathBuf;

use chatter_mesh_lib::io::serial::list_serial_ports;
use chatter_mesh_lib::mesh::{render_text, visible_edges, DisplayMode, Exclusions};
use chatter_mesh_lib::settings::{load_settings, settings_path};
use chatter_mesh_lib::{
    capture_snapshot, init_file_logging, stop_file_logging, RunError, ScanCancel, SerialPortConnector,
    TranscriptParser,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "mesh_scan_cli",
    about = "Pull the device table and mesh graph from a ChatterBox device",
    version
)]
struct Cli {
    /// Candidate serial port; repeat to try several in order
    #[arg(long = "port", value_name = "PORT")]
    ports: Vec<String>,

    /// Show the direct rating channel (default)
    #[arg(long, conflicts_with = "indirect")]
    direct: bool,

    /// Show the indirect rating channel
    #[arg(long)]
    indirect: bool,

    /// File of device names to hide, one per line
    #[arg(long, value_name = "PATH")]
    exclusions: Option<PathBuf>,

    /// Where to write the transcript
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Parse the existing transcript instead of scanning
    #[arg(long)]
    parse_only: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Give up after this many passes over the port list
    #[arg(long, value_name = "N")]
    max_cycles: Option<u32>,

    /// Settings file (defaults to the platform config dir)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("mesh_scan_cli: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), RunError> {
    if cli.list_ports {
        return list_ports(cli.json);
    }

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => settings_path().map_err(RunError::Settings)?,
    };
    let mut settings = load_settings(&config_path).map_err(RunError::Settings)?;

    if !cli.ports.is_empty() {
        settings.ports = cli.ports.clone();
    }
    if let Some(output) = &cli.output {
        settings.transcript_path = output.to_string_lossy().to_string();
    }
    if cli.max_cycles.is_some() {
        settings.max_cycles = cli.max_cycles;
    }

    if let Some(dir) = &settings.log_dir {
        init_file_logging(&PathBuf::from(dir)).map_err(RunError::Settings)?;
    }

    let exclusions = match &cli.exclusions {
        Some(path) => Exclusions::load(path).map_err(RunError::Settings)?,
        None => Exclusions::default(),
    };
    let mode = if cli.indirect {
        DisplayMode::Indirect
    } else {
        DisplayMode::Direct
    };

    let result = if cli.parse_only {
        TranscriptParser::parse_file(&PathBuf::from(&settings.transcript_path))
            .map(|snapshot| (None, snapshot))
            .map_err(RunError::from)
    } else {
        let connector = SerialPortConnector::new(settings.link_settings());
        capture_snapshot(connector, &settings, ScanCancel::new())
            .map(|(report, snapshot)| (Some(report), snapshot))
    };
    stop_file_logging();

    let (report, snapshot) = result?;
    let edges = visible_edges(&snapshot, mode, &exclusions);

    if cli.json {
        let body = serde_json::json!({
            "port": report.as_ref().map(|r| r.port.clone()),
            "transcript": settings.transcript_path,
            "devices": snapshot.device_table(),
            "unnamed": snapshot.unnamed_devices(),
            "edges": edges,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        if let Some(report) = &report {
            println!(
                "Captured {} lines from {} (cycle {})",
                report.lines, report.port, report.cycle
            );
        }
        print!("{}", render_text(&snapshot, &edges));
    }
    Ok(())
}

fn list_ports(json: bool) -> Result<(), RunError> {
    let ports = list_serial_ports()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ports).unwrap_or_default());
        return Ok(());
    }

    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        let label = port.product.or(port.manufacturer).unwrap_or_default();
        println!("{:<28} {:<8} {}", port.port_name, port.port_type, label);
    }
    Ok(())
}
