//! Line framing
//!
//! Turns an arbitrary byte stream into lines. `CR`, `LF` and `CRLF` all end a
//! line; a `CR` immediately followed by `LF` counts once. Characters
//! registered as realtime hooks are not part of line framing: they are
//! reported the moment they arrive.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::{Command, ProtocolError, Transport};

/// Something pulled off the wire by [`LineBuffer`] or [`LineTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A complete line without its terminator
    Line(String),
    /// A realtime hook character
    Realtime(char),
}

/// Incremental line framer
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    line: Vec<u8>,
    last_was_cr: bool,
    hooks: Vec<u8>,
}

impl LineBuffer {
    /// Framer without realtime hooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Framer that reports any of `hooks` as [`Received::Realtime`]
    pub fn with_realtime_hooks(hooks: &[u8]) -> Self {
        Self {
            hooks: hooks.to_vec(),
            ..Self::default()
        }
    }

    /// Feed one byte
    pub fn push(&mut self, byte: u8) -> Option<Received> {
        match byte {
            b'\r' => {
                self.last_was_cr = true;
                Some(Received::Line(self.take_line()))
            }
            b'\n' => {
                if std::mem::take(&mut self.last_was_cr) {
                    None
                } else {
                    Some(Received::Line(self.take_line()))
                }
            }
            b if self.hooks.contains(&b) => {
                self.last_was_cr = false;
                Some(Received::Realtime(b as char))
            }
            b => {
                self.last_was_cr = false;
                self.line.push(b);
                None
            }
        }
    }

    /// Feed a slice, collecting everything it completes
    pub fn push_all(&mut self, bytes: &[u8]) -> Vec<Received> {
        bytes.iter().filter_map(|b| self.push(*b)).collect()
    }

    /// Bytes of the line accumulated so far
    pub fn pending(&self) -> &[u8] {
        &self.line
    }

    /// Drop any partial line
    pub fn clear(&mut self) {
        self.line.clear();
        self.last_was_cr = false;
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        line
    }
}

/// Polling line reader/writer over a [`Transport`]
pub struct LineTransport<T: Transport> {
    transport: T,
    framer: LineBuffer,
    inbox: VecDeque<u8>,
    write_eol: String,
}

impl<T: Transport> LineTransport<T> {
    /// Wrap `transport`, appending `write_eol` to every written line
    pub fn new(transport: T, write_eol: impl Into<String>) -> Self {
        Self {
            transport,
            framer: LineBuffer::new(),
            inbox: VecDeque::new(),
            write_eol: write_eol.into(),
        }
    }

    /// Like [`new`](Self::new) with realtime hooks on the read side
    pub fn with_realtime_hooks(transport: T, write_eol: impl Into<String>, hooks: &[u8]) -> Self {
        Self {
            framer: LineBuffer::with_realtime_hooks(hooks),
            ..Self::new(transport, write_eol)
        }
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the wrapper, returning the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Write `line` followed by the configured end-of-line sequence
    pub fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        tracing::debug!(target: "calabo::serial", "write {} {:?}", self.transport.name(), line);
        let mut bytes = Vec::with_capacity(line.len() + self.write_eol.len());
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(self.write_eol.as_bytes());
        self.transport.write_all(&bytes)
    }

    /// Send a command: realtime commands go out as a single raw character,
    /// everything else as a line
    pub fn send(&mut self, command: &Command) -> Result<(), ProtocolError> {
        if command.is_realtime() {
            self.write_raw(command.to_line().as_bytes())
        } else {
            self.write_line(&command.to_line())
        }
    }

    /// Write bytes as-is, bypassing line framing
    pub fn write_raw(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        tracing::trace!(target: "calabo::serial", "write raw {} {:?}", self.transport.name(), data);
        self.transport.write_all(data)
    }

    /// Read the next line or realtime hook.
    ///
    /// Returns `Ok(None)` once `timeout` passes without any byte arriving;
    /// a partial line is kept for the next call. Availability is polled
    /// every `interval`.
    pub fn read_line(
        &mut self,
        timeout: Duration,
        interval: Duration,
    ) -> Result<Option<Received>, ProtocolError> {
        let mut last_activity = Instant::now();
        loop {
            while let Some(byte) = self.inbox.pop_front() {
                if let Some(received) = self.framer.push(byte) {
                    if let Received::Line(line) = &received {
                        tracing::debug!(
                            target: "calabo::serial",
                            "read {} {:?}",
                            self.transport.name(),
                            line
                        );
                    }
                    return Ok(Some(received));
                }
            }

            if self.fill()? {
                last_activity = Instant::now();
                continue;
            }

            if last_activity.elapsed() >= timeout {
                tracing::debug!(
                    target: "calabo::serial",
                    "timeout {} {:?} pending {:?}",
                    self.transport.name(),
                    timeout,
                    String::from_utf8_lossy(self.framer.pending())
                );
                return Ok(None);
            }
            std::thread::sleep(interval);
        }
    }

    /// Read raw characters up to and including `terminator`, bypassing line
    /// framing. Fails with [`ProtocolError::MalformedStatus`] if more than
    /// `max_len` bytes arrive first; returns `Ok(None)` on timeout.
    pub fn read_until(
        &mut self,
        terminator: u8,
        max_len: usize,
        timeout: Duration,
        interval: Duration,
    ) -> Result<Option<String>, ProtocolError> {
        let mut collected = Vec::new();
        let mut last_activity = Instant::now();
        loop {
            while let Some(byte) = self.inbox.pop_front() {
                collected.push(byte);
                if byte == terminator {
                    let text = String::from_utf8_lossy(&collected).into_owned();
                    tracing::debug!(
                        target: "calabo::serial",
                        "read raw {} {:?}",
                        self.transport.name(),
                        text
                    );
                    return Ok(Some(text));
                }
                if collected.len() >= max_len {
                    return Err(ProtocolError::MalformedStatus(
                        String::from_utf8_lossy(&collected).into_owned(),
                    ));
                }
            }

            if self.fill()? {
                last_activity = Instant::now();
                continue;
            }

            if last_activity.elapsed() >= timeout {
                tracing::debug!(
                    target: "calabo::serial",
                    "timeout {} waiting for {:?}",
                    self.transport.name(),
                    terminator as char
                );
                return Ok(None);
            }
            std::thread::sleep(interval);
        }
    }

    /// Forget buffered input, including any partial line
    pub fn clear(&mut self) {
        self.inbox.clear();
        self.framer.clear();
    }

    /// Move whatever the transport has buffered into the inbox.
    /// Returns whether anything arrived.
    fn fill(&mut self) -> Result<bool, ProtocolError> {
        let available = self.transport.bytes_to_read()?;
        if available == 0 {
            return Ok(false);
        }
        let mut buf = vec![0u8; available.min(512)];
        let n = self.transport.read(&mut buf)?;
        self.inbox.extend(&buf[..n]);
        Ok(n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(input: &[u8]) -> Vec<Received> {
        LineBuffer::new().push_all(input)
    }

    fn line(s: &str) -> Received {
        Received::Line(s.to_string())
    }

    #[test]
    fn test_lf_terminates() {
        assert_eq!(lines(b"ok\nerror:9\n"), vec![line("ok"), line("error:9")]);
    }

    #[test]
    fn test_lone_cr_terminates() {
        assert_eq!(lines(b"ok\rok\r"), vec![line("ok"), line("ok")]);
    }

    #[test]
    fn test_crlf_is_one_terminator() {
        assert_eq!(lines(b"ok\r\nok\r\n"), vec![line("ok"), line("ok")]);
    }

    #[test]
    fn test_cr_cr_gives_empty_line() {
        assert_eq!(lines(b"a\r\rb\n"), vec![line("a"), line(""), line("b")]);
    }

    #[test]
    fn test_lf_cr_is_two_terminators() {
        assert_eq!(lines(b"a\n\r"), vec![line("a"), line("")]);
    }

    #[test]
    fn test_cr_then_text_then_lf() {
        // The LF is not immediately after the CR, so it ends a second line
        assert_eq!(lines(b"a\rb\n"), vec![line("a"), line("b")]);
    }

    #[test]
    fn test_partial_line_is_held() {
        let mut framer = LineBuffer::new();
        assert!(framer.push_all(b"$22=").is_empty());
        assert_eq!(framer.pending(), b"$22=");
        assert_eq!(framer.push_all(b"1\n"), vec![line("$22=1")]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_realtime_hook_bypasses_line() {
        let mut framer = LineBuffer::with_realtime_hooks(b"?");
        let received = framer.push_all(b"G0 ?X1\n");
        assert_eq!(received, vec![Received::Realtime('?'), line("G0 X1")]);
    }

    #[test]
    fn test_hook_not_registered_is_plain_text() {
        assert_eq!(lines(b"$$?\n"), vec![line("$$?")]);
    }

    /// Hands out one queued chunk per poll
    #[derive(Default)]
    struct ScriptedPort {
        chunks: VecDeque<Vec<u8>>,
        written: Vec<u8>,
        closed: bool,
    }

    impl ScriptedPort {
        fn with_chunks(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
                ..Self::default()
            }
        }
    }

    impl Transport for ScriptedPort {
        fn open(&mut self) -> Result<(), ProtocolError> {
            self.closed = false;
            Ok(())
        }

        fn close(&mut self) {
            self.closed = true;
        }

        fn is_open(&self) -> bool {
            !self.closed
        }

        fn bytes_to_read(&mut self) -> Result<usize, ProtocolError> {
            if self.closed {
                return Err(ProtocolError::ConnectionClosed);
            }
            Ok(self.chunks.front().map_or(0, Vec::len))
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
            let Some(mut chunk) = self.chunks.pop_front() else {
                return Ok(0);
            };
            let n = buf.len().min(chunk.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.chunks.push_front(chunk.split_off(n));
            }
            Ok(n)
        }

        fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
            if self.closed {
                return Err(ProtocolError::ConnectionClosed);
            }
            self.written.extend_from_slice(data);
            Ok(())
        }

        fn set_dtr(&mut self, _level: bool) -> Result<(), ProtocolError> {
            Ok(())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    const SHORT: Duration = Duration::from_millis(20);
    const POLL: Duration = Duration::from_millis(1);

    fn link(chunks: &[&[u8]]) -> LineTransport<ScriptedPort> {
        LineTransport::new(ScriptedPort::with_chunks(chunks), "\n")
    }

    #[test]
    fn test_read_line_timeout_keeps_partial_line() {
        let mut link = link(&[b"$22="]);
        assert_eq!(link.read_line(SHORT, POLL).unwrap(), None);

        link.transport_mut().chunks.push_back(b"1\r\n".to_vec());
        assert_eq!(link.read_line(SHORT, POLL).unwrap(), Some(line("$22=1")));
        assert_eq!(link.read_line(SHORT, POLL).unwrap(), None);
    }

    #[test]
    fn test_crlf_split_across_polls() {
        let mut link = link(&[b"ok\r", b"\nerror:9\r", b"\n"]);
        assert_eq!(link.read_line(SHORT, POLL).unwrap(), Some(line("ok")));
        assert_eq!(link.read_line(SHORT, POLL).unwrap(), Some(line("error:9")));
        assert_eq!(link.read_line(SHORT, POLL).unwrap(), None);
    }

    #[test]
    fn test_closed_transport_is_not_a_timeout() {
        let mut link = link(&[]);
        link.transport_mut().close();
        assert!(matches!(
            link.read_line(SHORT, POLL),
            Err(ProtocolError::ConnectionClosed)
        ));
        assert!(matches!(
            link.read_until(b'>', 64, SHORT, POLL),
            Err(ProtocolError::ConnectionClosed)
        ));
        assert!(matches!(
            link.write_line("$$"),
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_read_until_terminator_leaves_rest() {
        let mut link = link(&[b"<Idle|MPos:0,0,0>\r\nok\r\n"]);
        assert_eq!(
            link.read_until(b'>', 64, SHORT, POLL).unwrap().as_deref(),
            Some("<Idle|MPos:0,0,0>")
        );
        assert_eq!(link.read_line(SHORT, POLL).unwrap(), Some(line("")));
        assert_eq!(link.read_line(SHORT, POLL).unwrap(), Some(line("ok")));
    }

    #[test]
    fn test_read_until_is_bounded() {
        let mut link = link(&[b"<Idle|MPos:", b"0.000,0.000,0.000|FS:0,0"]);
        assert!(matches!(
            link.read_until(b'>', 16, SHORT, POLL),
            Err(ProtocolError::MalformedStatus(frame)) if frame.len() == 16
        ));
    }

    #[test]
    fn test_read_until_timeout() {
        let mut link = link(&[b"<Idle"]);
        assert_eq!(link.read_until(b'>', 64, SHORT, POLL).unwrap(), None);
    }

    #[test]
    fn test_realtime_hook_mid_line() {
        let mut link =
            LineTransport::with_realtime_hooks(ScriptedPort::with_chunks(&[b"o?k\n"]), "\n", b"?");
        assert_eq!(
            link.read_line(SHORT, POLL).unwrap(),
            Some(Received::Realtime('?'))
        );
        assert_eq!(link.read_line(SHORT, POLL).unwrap(), Some(line("ok")));
    }

    #[test]
    fn test_send_realtime_without_eol() {
        let mut link = LineTransport::new(ScriptedPort::default(), "\r\n");
        link.send(&Command::StatusQuery).unwrap();
        link.send(&Command::Unlock).unwrap();
        assert_eq!(link.transport().written, b"?$X\r\n");
    }
}
