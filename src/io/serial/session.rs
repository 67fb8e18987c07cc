// src/io/serial/session.rs
//
// One bounded capture attempt against one port.
//
// Every line the device prints goes into the transcript sink. The session ends
// as soon as every required marker has been seen, or fails once the device has
// been quiet for the whole session timeout. Any line counts as activity, not
// only lines that carry a marker.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use super::line_reader::{LineReader, DEFAULT_POLL_INTERVAL};
use super::link::SerialConnector;
use crate::error::{IngestError, IngestResult};
use crate::transcript::RequiredMarkers;

// ============================================================================
// Types and Configuration
// ============================================================================

/// Timing for one session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Idle window for the whole session; reset by every received line
    pub session_timeout: Duration,
    /// Idle window for a single line; reset by every received byte
    pub line_timeout: Duration,
    /// Sleep between polls while the link has no bytes
    pub poll_interval: Duration,
    /// Log each received line
    pub echo_lines: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            session_timeout: Duration::from_secs(20),
            line_timeout: Duration::from_secs(20),
            poll_interval: DEFAULT_POLL_INTERVAL,
            echo_lines: true,
        }
    }
}

/// How a session that did not error ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// All required markers were seen; the sink holds a full transcript.
    Complete { lines: usize },
    /// The device went quiet before all markers were seen.
    TimedOut { lines: usize, missing: Vec<String> },
}

impl SessionOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, SessionOutcome::Complete { .. })
    }

    pub fn lines(&self) -> usize {
        match self {
            SessionOutcome::Complete { lines } | SessionOutcome::TimedOut { lines, .. } => *lines,
        }
    }
}

// ============================================================================
// Session Recorder
// ============================================================================

/// Records one transcript from one serial link.
#[derive(Clone, Debug, Default)]
pub struct SessionRecorder {
    config: SessionConfig,
}

impl SessionRecorder {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open `port` through `connector` and record from it.
    ///
    /// A port that cannot be opened comes back as `IngestError::Connection`.
    /// The link lives only for this call.
    pub fn run_on_port<C, W>(
        &self,
        connector: &C,
        port: &str,
        sink: &mut W,
        markers: RequiredMarkers,
    ) -> IngestResult<SessionOutcome>
    where
        C: SerialConnector,
        W: Write,
    {
        let link = connector.open(port)?;
        self.run(port, link, sink, markers)
    }

    /// Record lines from `link` into `sink` until `markers` are all seen or
    /// the session idles out.
    ///
    /// Each line is written verbatim followed by `\n`. On `Complete` the sink
    /// has been flushed. `link` is dropped before returning on every path.
    pub fn run<R, W>(
        &self,
        port: &str,
        link: R,
        sink: &mut W,
        mut markers: RequiredMarkers,
    ) -> IngestResult<SessionOutcome>
    where
        R: Read,
        W: Write,
    {
        let mut reader = LineReader::new(link, self.config.poll_interval);
        let mut lines = 0usize;
        let mut last_line = Instant::now();

        tlog!(
            "[session:{}] Recording (session timeout {:?}, waiting for {:?})",
            port,
            self.config.session_timeout,
            markers.missing()
        );

        loop {
            if markers.is_complete() {
                sink.flush()?;
                tlog!("[session:{}] All markers seen after {} line(s)", port, lines);
                return Ok(SessionOutcome::Complete { lines });
            }

            let idle = last_line.elapsed();
            if idle >= self.config.session_timeout {
                let missing: Vec<String> = markers.missing().into_iter().map(String::from).collect();
                tlog!(
                    "[session:{}] Idle for {:?} after {} line(s), still missing {:?}",
                    port,
                    idle,
                    lines,
                    missing
                );
                return Ok(SessionOutcome::TimedOut { lines, missing });
            }

            // Bytes without a terminator do not extend the session
            let deadline = last_line + self.config.session_timeout;

            match reader.read_line_until(self.config.line_timeout, Some(deadline)) {
                Ok(line) => {
                    if self.config.echo_lines {
                        tlog!("[session:{}] {}", port, line);
                    }
                    sink.write_all(line.as_bytes())?;
                    sink.write_all(b"\n")?;
                    lines += 1;
                    last_line = Instant::now();
                    markers.observe(&line);
                }
                Err(IngestError::LineTimeout { .. }) => continue,
                Err(e) => {
                    tlog!("[session:{}] Ended after {} line(s): {}", port, lines, e);
                    return Err(e);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::testing::{transcript_text, ScriptedConnector, ScriptedLink};
    use crate::transcript::REQUIRED_MARKERS;

    fn quick_config(session_timeout: Duration) -> SessionConfig {
        SessionConfig {
            session_timeout,
            line_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(1),
            echo_lines: false,
        }
    }

    #[test]
    fn test_complete_transcript_is_written_verbatim() {
        let text = transcript_text(r#"{"XXXXX005":"Kitchen"}"#, r#"{"005":{}}"#);
        let recorder = SessionRecorder::new(quick_config(Duration::from_secs(2)));
        let mut sink = Vec::new();

        let outcome = recorder
            .run("/dev/ttyACM0", ScriptedLink::new(text.clone()), &mut sink, RequiredMarkers::default())
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Complete { lines: 8 });
        assert_eq!(String::from_utf8(sink).unwrap(), text);
    }

    #[test]
    fn test_stops_at_last_marker_without_draining_link() {
        let text = "= Begin Devices =\n= End Devices =\n= Mesh Graph =\n= End Mesh Graph =\nafter\n";
        let recorder = SessionRecorder::new(quick_config(Duration::from_secs(2)));
        let mut sink = Vec::new();

        let outcome = recorder
            .run("p", ScriptedLink::new(text), &mut sink, RequiredMarkers::default())
            .unwrap();

        assert!(outcome.is_complete());
        assert!(!String::from_utf8(sink).unwrap().contains("after"));
    }

    #[test]
    fn test_markers_in_any_order_among_noise() {
        let mut text = String::new();
        for (i, marker) in REQUIRED_MARKERS.iter().rev().enumerate() {
            text.push_str(&format!("noise {i}\n[{i}] {marker} trailer\n"));
        }
        let recorder = SessionRecorder::new(quick_config(Duration::from_secs(2)));

        let outcome = recorder
            .run("p", ScriptedLink::new(text), &mut Vec::new(), RequiredMarkers::default())
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Complete { lines: 8 });
    }

    #[test]
    fn test_missing_marker_times_out() {
        let text = "= Begin Devices =\n= End Devices =\n= Mesh Graph =\n";
        let recorder = SessionRecorder::new(quick_config(Duration::from_millis(80)));

        let outcome = recorder
            .run(
                "p",
                ScriptedLink::new(text).stay_open(),
                &mut Vec::new(),
                RequiredMarkers::default(),
            )
            .unwrap();

        assert_eq!(
            outcome,
            SessionOutcome::TimedOut {
                lines: 3,
                missing: vec!["= End Mesh Graph =".to_string()],
            }
        );
    }

    #[test]
    fn test_session_timeout_bounds_a_long_line_timeout() {
        let config = SessionConfig {
            line_timeout: Duration::from_secs(30),
            ..quick_config(Duration::from_millis(50))
        };
        let recorder = SessionRecorder::new(config);
        let started = Instant::now();

        let outcome = recorder
            .run("p", ScriptedLink::silent(), &mut Vec::new(), RequiredMarkers::default())
            .unwrap();

        assert!(!outcome.is_complete());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_bytes_without_terminator_do_not_extend_the_session() {
        let config = SessionConfig {
            line_timeout: Duration::from_millis(100),
            ..quick_config(Duration::from_millis(100))
        };
        let link = ScriptedLink::new(vec![b'x'; 300])
            .byte_interval(Duration::from_millis(5))
            .stay_open();
        let recorder = SessionRecorder::new(config);
        let started = Instant::now();

        let outcome = recorder
            .run("p", link, &mut Vec::new(), RequiredMarkers::default())
            .unwrap();

        assert!(matches!(outcome, SessionOutcome::TimedOut { lines: 0, .. }));
        assert!(started.elapsed() < Duration::from_millis(800));
    }

    #[test]
    fn test_every_line_extends_the_session() {
        // 54 bytes at 5ms each outlast the 250ms idle window, but no single
        // line takes much longer than 90ms
        let mut text = String::new();
        for _ in 0..12 {
            text.push_str("ok\n");
        }
        text.push_str("= Begin Devices =\n");
        let link = ScriptedLink::new(text).byte_interval(Duration::from_millis(5));
        let recorder = SessionRecorder::new(quick_config(Duration::from_millis(250)));

        let outcome = recorder
            .run("p", link, &mut Vec::new(), RequiredMarkers::new(["= Begin Devices ="]))
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Complete { lines: 13 });
    }

    #[test]
    fn test_unopenable_port_is_connection_error() {
        let connector = ScriptedConnector::new();
        let recorder = SessionRecorder::new(quick_config(Duration::from_millis(50)));

        let err = recorder
            .run_on_port(&connector, "/dev/ttyACM9", &mut Vec::new(), RequiredMarkers::default())
            .unwrap_err();

        assert!(matches!(err, IngestError::Connection { ref port, .. } if port == "/dev/ttyACM9"));
    }

    #[test]
    fn test_disconnect_mid_transcript_is_an_error() {
        let recorder = SessionRecorder::new(quick_config(Duration::from_secs(1)));
        let err = recorder
            .run(
                "p",
                ScriptedLink::new("= Begin Devices =\n"),
                &mut Vec::new(),
                RequiredMarkers::default(),
            )
            .unwrap_err();
        assert!(matches!(err, IngestError::Disconnected));
    }

    #[test]
    fn test_read_failure_mid_transcript_is_a_link_error() {
        let recorder = SessionRecorder::new(quick_config(Duration::from_secs(1)));
        let link = ScriptedLink::new("= Begin Devices =\n").fail_with(std::io::ErrorKind::BrokenPipe);

        let err = recorder
            .run("p", link, &mut Vec::new(), RequiredMarkers::default())
            .unwrap_err();

        assert!(matches!(err, IngestError::Link { .. }));
    }
}
