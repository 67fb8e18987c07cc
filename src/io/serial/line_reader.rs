// src/io/serial/line_reader.rs
//
// Reassembles text lines from a slow serial byte stream.
//
// Lines end at `\n` or `\r`. NUL bytes are C-string padding from the firmware
// and are dropped. Bytes that are not valid UTF-8 are logged and dropped.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use crate::error::{IngestError, IngestResult};

/// Default sleep between polls when the link has nothing for us.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Bytes requested from the link per read.
const READ_CHUNK: usize = 256;

/// Longest line kept before the reader gives up on finding its terminator.
/// Large enough for a Mesh Graph payload from a big mesh.
pub const DEFAULT_MAX_LINE_LEN: usize = 1 << 20;

/// Turns a byte source into decoded, right-trimmed lines.
///
/// The reader never writes anywhere. Bytes that arrive after a terminator in
/// the same read are kept for the next line.
pub struct LineReader<R: Read> {
    source: R,
    poll_interval: Duration,
    /// Timeout used by the `Iterator` impl
    line_timeout: Duration,
    max_line_len: usize,
    /// Raw bytes of the line being assembled (NULs already removed)
    line: Vec<u8>,
    /// Set once `line` hit `max_line_len`; bytes are dropped until the next terminator
    overflowed: bool,
    /// Bytes read from the link but not consumed yet
    pending: VecDeque<u8>,
    /// Set once the `Iterator` impl has ended
    exhausted: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(source: R, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
            line_timeout: Duration::from_secs(20),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            line: Vec::new(),
            overflowed: false,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Set the per-line timeout used when iterating.
    pub fn with_line_timeout(mut self, line_timeout: Duration) -> Self {
        self.line_timeout = line_timeout;
        self
    }

    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len.max(1);
        self
    }

    /// Give the byte source back, dropping any partial line.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Read one line.
    ///
    /// `timeout` is an idle window: it restarts every time a byte arrives.
    /// When it expires the partial line is discarded and `LineTimeout` returned.
    pub fn read_line(&mut self, timeout: Duration) -> IngestResult<String> {
        self.read_line_until(timeout, None)
    }

    /// Read one line, giving up at `deadline` even while bytes keep arriving.
    ///
    /// `idle` restarts on every byte; `deadline` does not. Whichever expires
    /// first discards the partial line and returns `LineTimeout`.
    pub fn read_line_until(&mut self, idle: Duration, deadline: Option<Instant>) -> IngestResult<String> {
        let started = Instant::now();
        let mut last_byte = started;

        loop {
            while let Some(byte) = self.pending.pop_front() {
                last_byte = Instant::now();
                match byte {
                    b'\n' | b'\r' if self.overflowed => {
                        self.overflowed = false;
                        self.line.clear();
                    }
                    b'\n' | b'\r' => return Ok(self.take_line()),
                    0 => {}
                    _ if self.overflowed => {}
                    b => self.push_byte(b),
                }
                if deadline.is_some_and(|d| last_byte >= d) {
                    break;
                }
            }

            let now = Instant::now();
            if now.duration_since(last_byte) >= idle || deadline.is_some_and(|d| now >= d) {
                self.discard_partial();
                return Err(IngestError::LineTimeout {
                    waited: now.duration_since(started),
                });
            }

            self.fill()?;
        }
    }

    fn push_byte(&mut self, byte: u8) {
        if self.line.len() >= self.max_line_len {
            tlog!(
                "[line-reader] No line terminator within {} bytes, discarding until the next one",
                self.max_line_len
            );
            self.line.clear();
            self.overflowed = true;
            return;
        }
        self.line.push(byte);
    }

    fn discard_partial(&mut self) {
        self.line.clear();
        self.overflowed = false;
    }

    /// Pull whatever the link has into `pending`, sleeping when it has nothing.
    fn fill(&mut self) -> IngestResult<()> {
        let mut buf = [0u8; READ_CHUNK];
        match self.source.read(&mut buf) {
            Ok(0) => {
                self.discard_partial();
                Err(IngestError::Disconnected)
            }
            Ok(n) => {
                self.pending.extend(&buf[..n]);
                Ok(())
            }
            Err(ref e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                std::thread::sleep(self.poll_interval);
                Ok(())
            }
            Err(e) => {
                self.discard_partial();
                Err(IngestError::Link { source: e })
            }
        }
    }

    /// Decode the assembled bytes, dropping invalid sequences, and reset.
    fn take_line(&mut self) -> String {
        let raw = std::mem::take(&mut self.line);
        let mut text = String::with_capacity(raw.len());
        for chunk in raw.utf8_chunks() {
            text.push_str(chunk.valid());
            if !chunk.invalid().is_empty() {
                tlog!(
                    "[line-reader] Dropped undecodable bytes {:02X?}",
                    chunk.invalid()
                );
            }
        }
        text.truncate(text.trim_end().len());
        text
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = IngestResult<String>;

    /// Yields lines until the link hangs up or stays quiet for a whole line
    /// timeout. Any other error is yielded once and ends the sequence.
    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        match self.read_line(self.line_timeout) {
            Ok(line) => Some(Ok(line)),
            Err(IngestError::Disconnected) | Err(IngestError::LineTimeout { .. }) => {
                self.exhausted = true;
                None
            }
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
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
    use crate::io::serial::testing::ScriptedLink;
    use proptest::prelude::*;

    fn reader(link: ScriptedLink) -> LineReader<ScriptedLink> {
        LineReader::new(link, Duration::from_millis(1))
    }

    #[test]
    fn test_splits_on_newline_and_carriage_return() {
        let mut r = reader(ScriptedLink::new(b"alpha\nbeta\rgamma\n".to_vec()));

        assert_eq!(r.read_line(Duration::from_secs(1)).unwrap(), "alpha");
        assert_eq!(r.read_line(Duration::from_secs(1)).unwrap(), "beta");
        assert_eq!(r.read_line(Duration::from_secs(1)).unwrap(), "gamma");
    }

    #[test]
    fn test_crlf_yields_empty_line_between() {
        let mut r = reader(ScriptedLink::new(b"one\r\ntwo\n".to_vec()));

        assert_eq!(r.read_line(Duration::from_secs(1)).unwrap(), "one");
        assert_eq!(r.read_line(Duration::from_secs(1)).unwrap(), "");
        assert_eq!(r.read_line(Duration::from_secs(1)).unwrap(), "two");
    }

    #[test]
    fn test_trims_trailing_whitespace_only() {
        let mut r = reader(ScriptedLink::new(b"  = Mesh Graph =  \t\n".to_vec()));
        assert_eq!(r.read_line(Duration::from_secs(1)).unwrap(), "  = Mesh Graph =");
    }

    #[test]
    fn test_nul_bytes_are_dropped() {
        let mut r = reader(ScriptedLink::new(b"\0Kit\0chen\0\0\n".to_vec()));
        assert_eq!(r.read_line(Duration::from_secs(1)).unwrap(), "Kitchen");
    }

    #[test]
    fn test_invalid_utf8_is_dropped_and_reading_continues() {
        let mut bytes = b"ab".to_vec();
        bytes.extend([0xFF, 0xFE]);
        bytes.extend("cé\nnext\n".as_bytes());
        let mut r = reader(ScriptedLink::new(bytes));

        assert_eq!(r.read_line(Duration::from_secs(1)).unwrap(), "abcé");
        assert_eq!(r.read_line(Duration::from_secs(1)).unwrap(), "next");
    }

    #[test]
    fn test_timeout_discards_partial_line() {
        // Half a line, then the device goes quiet
        let mut r = reader(ScriptedLink::new(b"partial".to_vec()).stay_open());

        let err = r.read_line(Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, IngestError::LineTimeout { .. }));
        assert!(r.line.is_empty());
    }

    #[test]
    fn test_slow_bytes_do_not_time_out() {
        // 10ms per byte against a 60ms idle window: total time exceeds the
        // window but no single gap does
        let link = ScriptedLink::new(b"slowly\n".to_vec()).byte_interval(Duration::from_millis(10));
        let mut r = reader(link);

        assert_eq!(r.read_line(Duration::from_millis(60)).unwrap(), "slowly");
    }

    #[test]
    fn test_hang_up_reports_disconnected() {
        let mut r = reader(ScriptedLink::new(b"tail-without-newline".to_vec()));
        let err = r.read_line(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, IngestError::Disconnected));
    }

    #[test]
    fn test_iterator_ends_on_disconnect() {
        let r = reader(ScriptedLink::new(b"a\nb\n".to_vec()));
        let lines: Vec<String> = r.map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_iterator_ends_when_link_goes_quiet() {
        let r = reader(ScriptedLink::new(b"a\n".to_vec()).stay_open())
            .with_line_timeout(Duration::from_millis(20));
        let lines: Vec<String> = r.map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["a".to_string()]);
    }

    #[test]
    fn test_iterator_yields_link_error_once() {
        let mut r = reader(ScriptedLink::new(b"a\n".to_vec()).fail_with(ErrorKind::BrokenPipe));

        assert_eq!(r.next().unwrap().unwrap(), "a");
        assert!(matches!(r.next(), Some(Err(IngestError::Link { .. }))));
        assert!(r.next().is_none());
        assert!(r.next().is_none());
    }

    #[test]
    fn test_read_error_is_a_link_failure() {
        let mut r = reader(ScriptedLink::new(b"half".to_vec()).fail_with(ErrorKind::BrokenPipe));

        let err = r.read_line(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, IngestError::Link { .. }));
        assert!(err.is_retryable());
        assert!(r.line.is_empty());
    }

    #[test]
    fn test_deadline_bounds_a_line_that_never_ends() {
        // A byte every 5ms keeps the idle window open indefinitely
        let link = ScriptedLink::new(vec![b'x'; 300])
            .byte_interval(Duration::from_millis(5))
            .stay_open();
        let mut r = reader(link);
        let started = Instant::now();

        let err = r
            .read_line_until(Duration::from_millis(100), Some(started + Duration::from_millis(100)))
            .unwrap_err();

        assert!(matches!(err, IngestError::LineTimeout { .. }));
        assert!(started.elapsed() < Duration::from_millis(800));
        assert!(r.line.is_empty());
    }

    #[test]
    fn test_overlong_line_is_dropped_up_to_its_terminator() {
        let mut bytes = vec![b'x'; 40];
        bytes.extend(b"\nok\n");
        let mut r = reader(ScriptedLink::new(bytes)).with_max_line_len(16);

        assert_eq!(r.read_line(Duration::from_secs(1)).unwrap(), "ok");
        assert!(r.line.len() <= 16);
    }

    proptest! {
        #[test]
        fn prop_nul_bytes_never_change_the_line(
            body in proptest::collection::vec(
                prop_oneof![Just(0u8), 0x21u8..0x7F],
                0..64,
            ),
            terminator in prop_oneof![Just(b'\n'), Just(b'\r')],
        ) {
            let mut bytes = body.clone();
            bytes.push(terminator);
            bytes.extend(b"trailing\n");

            let mut r = reader(ScriptedLink::new(bytes));
            let line = r.read_line(Duration::from_secs(1)).unwrap();

            let expected: String = body
                .iter()
                .filter(|&&b| b != 0)
                .map(|&b| b as char)
                .collect();
            prop_assert_eq!(line, expected);
        }
    }
}
