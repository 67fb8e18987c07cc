// src/settings.rs
//
// User settings, stored as TOML in the platform config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::io::serial::{LinkSettings, Parity, ScanConfig, SessionConfig};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScanSettings {
    /// Candidate ports, tried in order
    #[serde(default = "default_ports")]
    pub ports: Vec<String>,
    /// Where the completed transcript is written
    #[serde(default = "default_transcript_path")]
    pub transcript_path: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    #[serde(default = "default_line_timeout_ms")]
    pub line_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Passes over the port list before giving up (unset = keep trying)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cycles: Option<u32>,
    #[serde(default = "default_echo_lines")]
    pub echo_lines: bool,
    /// Directory for log files (unset = stderr only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

fn default_ports() -> Vec<String> {
    vec![
        "/dev/ttyACM0".to_string(),
        "/dev/ttyACM1".to_string(),
        "/dev/cu.usbmodem14101".to_string(),
        "/dev/ttyUSB0".to_string(),
    ]
}
fn default_transcript_path() -> String {
    std::env::temp_dir()
        .join("chatter_mesh_graph.txt")
        .to_string_lossy()
        .to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    1
}
fn default_session_timeout_ms() -> u64 {
    20_000
}
fn default_line_timeout_ms() -> u64 {
    20_000
}
fn default_poll_interval_ms() -> u64 {
    50
}
fn default_read_timeout_ms() -> u64 {
    10
}
fn default_backoff_ms() -> u64 {
    5_000
}
fn default_echo_lines() -> bool {
    true
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            ports: default_ports(),
            transcript_path: default_transcript_path(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::default(),
            session_timeout_ms: default_session_timeout_ms(),
            line_timeout_ms: default_line_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            backoff_ms: default_backoff_ms(),
            max_cycles: None,
            echo_lines: default_echo_lines(),
            log_dir: None,
        }
    }
}

impl ScanSettings {
    /// Reject settings the scanner cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.ports.is_empty() {
            return Err("At least one candidate port is required".to_string());
        }
        if self.ports.iter().any(|p| p.trim().is_empty()) {
            return Err("Candidate port names must not be empty".to_string());
        }
        if self.transcript_path.trim().is_empty() {
            return Err("transcript_path must not be empty".to_string());
        }
        for (name, value) in [
            ("session_timeout_ms", self.session_timeout_ms),
            ("line_timeout_ms", self.line_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(format!("{} must be greater than zero", name));
            }
        }
        if self.max_cycles == Some(0) {
            return Err("max_cycles must be at least 1 when set".to_string());
        }
        Ok(())
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            session_timeout: Duration::from_millis(self.session_timeout_ms),
            line_timeout: Duration::from_millis(self.line_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            echo_lines: self.echo_lines,
        }
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            backoff: Duration::from_millis(self.backoff_ms),
            max_cycles: self.max_cycles,
        }
    }
}

/// `<config dir>/chatter-mesh/settings.toml`
pub fn settings_path() -> Result<PathBuf, String> {
    let config_dir = dirs::config_dir().ok_or_else(|| "Failed to get config dir".to_string())?;
    Ok(config_dir.join("chatter-mesh").join("settings.toml"))
}

/// Load settings from `path`. On first run the defaults are written there.
pub fn load_settings(path: &Path) -> Result<ScanSettings, String> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings: {}", e))?;

        let settings: ScanSettings =
            toml::from_str(&content).map_err(|e| format!("Failed to parse settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    } else {
        let settings = ScanSettings::default();
        save_settings(path, &settings)?;
        Ok(settings)
    }
}

pub fn save_settings(path: &Path, settings: &ScanSettings) -> Result<(), String> {
    settings.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create settings dir: {}", e))?;
    }

    let content = toml::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;

    std::fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))?;

    tlog!("[settings] Saved settings to {}", path.display());
    Ok(())
}
