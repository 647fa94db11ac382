// ── MicroPython raw REPL ──
//
// Ctrl-A switches the REPL into raw mode: code is sent verbatim, ended by
// Ctrl-D, and answered with `OK`, stdout, `\x04`, stderr, `\x04`. File
// contents travel base64-encoded through stdout and source literals.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use sumo_core::{DeviceError, DeviceHandle, RemoteFileChannel};
use tracing::{debug, trace};

const RAW_PROMPT: &[u8] = b"raw REPL; CTRL-B to exit\r\n";
const RAW_PROMPT_READY: &[u8] = b"raw REPL; CTRL-B to exit\r\n>";
const SOFT_REBOOT: &[u8] = b"soft reboot\r\n";
const EOT: &[u8] = b"\x04";

/// Bytes per write while sending code; the device UART buffer is small.
const CODE_CHUNK: usize = 256;
const CODE_CHUNK_PAUSE: Duration = Duration::from_millis(10);
/// Raw bytes per `a2b_base64` call when uploading.
const UPLOAD_CHUNK: usize = 512;

const READ_FILE: &str = "\
import ubinascii
with open({name}, 'rb') as f:
    while True:
        b = f.read(48)
        if not b:
            break
        print(ubinascii.b2a_base64(b).decode().strip())
";

const SCAN_NETWORKS: &str = "\
import network
sta = network.WLAN(network.STA_IF)
sta.active(True)
for net in sta.scan():
    print(net[0].decode())
";

/// Output of one raw REPL execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Raw REPL framing over any byte stream.
///
/// Reads tolerate `TimedOut` from the stream and keep going until the
/// overall `timeout` passes.
#[derive(Debug)]
pub struct RawRepl<S> {
    stream: S,
    pending: Vec<u8>,
    timeout: Duration,
}

impl<S: Read + Write> RawRepl<S> {
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream,
            pending: Vec::new(),
            timeout,
        }
    }

    /// Interrupt any running program, enter raw mode, and soft reset.
    pub fn enter(&mut self, delay: Duration) -> Result<(), DeviceError> {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.stream.write_all(b"\r\x03\x03")?;
        self.stream.write_all(b"\r\x01")?;
        self.read_until(RAW_PROMPT_READY)?;
        self.stream.write_all(EOT)?;
        self.read_until(SOFT_REBOOT)?;
        self.read_until(RAW_PROMPT)?;
        debug!("raw REPL entered");
        Ok(())
    }

    pub fn exit(&mut self) -> Result<(), DeviceError> {
        self.stream.write_all(b"\r\x02")?;
        self.stream.flush()?;
        Ok(())
    }

    /// Run `code` and collect its output.
    pub fn exec(&mut self, code: &str) -> Result<ExecOutput, DeviceError> {
        self.read_until(b">")?;
        for chunk in code.as_bytes().chunks(CODE_CHUNK) {
            self.stream.write_all(chunk)?;
            std::thread::sleep(CODE_CHUNK_PAUSE);
        }
        self.stream.write_all(EOT)?;

        let ack = self.read_exact(2)?;
        if ack != b"OK" {
            return Err(DeviceError::Protocol(format!(
                "could not exec command, got {:?}",
                String::from_utf8_lossy(&ack)
            )));
        }
        let stdout = self.read_until(EOT)?;
        let stderr = self.read_until(EOT)?;
        trace!(stdout = stdout.len(), stderr = stderr.len(), "exec finished");
        Ok(ExecOutput { stdout, stderr })
    }

    /// Like [`exec`](Self::exec), failing on any stderr output.
    pub fn exec_ok(&mut self, code: &str) -> Result<Vec<u8>, DeviceError> {
        let out = self.exec(code)?;
        if out.stderr.is_empty() {
            Ok(out.stdout)
        } else {
            Err(DeviceError::Protocol(
                String::from_utf8_lossy(&out.stderr).trim().to_owned(),
            ))
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Everything up to `marker`; the marker itself is consumed.
    fn read_until(&mut self, marker: &[u8]) -> Result<Vec<u8>, DeviceError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(pos) = find(&self.pending, marker) {
                let rest = self.pending.split_off(pos + marker.len());
                let mut data = std::mem::replace(&mut self.pending, rest);
                data.truncate(pos);
                return Ok(data);
            }
            self.fill(deadline, marker)?;
        }
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, DeviceError> {
        let deadline = Instant::now() + self.timeout;
        while self.pending.len() < n {
            self.fill(deadline, b"")?;
        }
        let rest = self.pending.split_off(n);
        Ok(std::mem::replace(&mut self.pending, rest))
    }

    fn fill(&mut self, deadline: Instant, waiting_for: &[u8]) -> Result<(), DeviceError> {
        if Instant::now() >= deadline {
            return Err(DeviceError::Protocol(format!(
                "timed out waiting for {:?}",
                String::from_utf8_lossy(waiting_for)
            )));
        }
        let mut buf = [0u8; 256];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(DeviceError::Protocol("serial stream closed".into())),
            Ok(n) => {
                self.pending.extend_from_slice(&buf[..n]);
                Ok(())
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Python single-quoted string literal.
pub(crate) fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Remote file channel spoken through the raw REPL.
#[derive(Debug)]
pub struct RawReplChannel<S> {
    repl: Option<RawRepl<S>>,
}

impl<S: Read + Write> RawReplChannel<S> {
    /// Wrap a REPL already in raw mode.
    pub fn new(repl: RawRepl<S>) -> Self {
        Self { repl: Some(repl) }
    }

    fn repl(&mut self) -> Result<&mut RawRepl<S>, DeviceError> {
        self.repl
            .as_mut()
            .ok_or_else(|| DeviceError::Protocol("channel is closed".into()))
    }
}

impl<S: Read + Write + Send> DeviceHandle for RawReplChannel<S> {
    fn close(&mut self) -> Result<(), DeviceError> {
        match self.repl.take() {
            Some(mut repl) => repl.exit(),
            None => Ok(()),
        }
    }
}

impl<S: Read + Write + Send> RemoteFileChannel for RawReplChannel<S> {
    fn get(&mut self, name: &str) -> Result<Vec<u8>, DeviceError> {
        let code = READ_FILE.replace("{name}", &py_str(name));
        let out = self.repl()?.exec(&code)?;
        if !out.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if stderr.contains("ENOENT") || stderr.contains("Errno 2") {
                return Err(DeviceError::FileNotFound(name.to_owned()));
            }
            return Err(DeviceError::Protocol(stderr.trim().to_owned()));
        }

        let mut data = Vec::new();
        for line in String::from_utf8_lossy(&out.stdout).lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let chunk = BASE64_STANDARD
                .decode(line)
                .map_err(|e| DeviceError::Protocol(format!("bad base64 from device: {e}")))?;
            data.extend_from_slice(&chunk);
        }
        debug!(name, bytes = data.len(), "file read");
        Ok(data)
    }

    fn put(&mut self, name: &str, data: &[u8]) -> Result<(), DeviceError> {
        let repl = self.repl()?;
        repl.exec_ok(&format!("import ubinascii\nf = open({}, 'wb')", py_str(name)))?;
        for chunk in data.chunks(UPLOAD_CHUNK) {
            let encoded = BASE64_STANDARD.encode(chunk);
            repl.exec_ok(&format!("f.write(ubinascii.a2b_base64('{encoded}'))"))?;
        }
        repl.exec_ok("f.close()")?;
        debug!(name, bytes = data.len(), "file written");
        Ok(())
    }

    fn list_networks(&mut self) -> Result<Vec<String>, DeviceError> {
        let stdout = self.repl()?.exec_ok(SCAN_NETWORKS)?;
        let mut networks: Vec<String> = Vec::new();
        for ssid in String::from_utf8_lossy(&stdout).lines().map(str::trim) {
            if !ssid.is_empty() && !networks.iter().any(|n| n == ssid) {
                networks.push(ssid.to_owned());
            }
        }
        debug!(count = networks.len(), "networks scanned");
        Ok(networks)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Replays canned device output, records what was written.
    #[derive(Debug, Default)]
    struct Script {
        input: VecDeque<u8>,
        written: Vec<u8>,
    }

    impl Script {
        fn replying(parts: &[&[u8]]) -> Self {
            Self {
                input: parts.concat().into_iter().collect(),
                written: Vec::new(),
            }
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.input.is_empty() {
                std::thread::sleep(Duration::from_millis(1));
                return Err(io::Error::new(ErrorKind::TimedOut, "no data"));
            }
            // Short reads, like a real UART.
            let n = buf.len().min(self.input.len()).min(7);
            for slot in buf.iter_mut().take(n) {
                *slot = self.input.pop_front().unwrap_or_default();
            }
            Ok(n)
        }
    }

    impl Write for Script {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn exec_reply(stdout: &[u8], stderr: &[u8]) -> Vec<u8> {
        [b">OK".as_slice(), stdout, EOT, stderr, EOT].concat()
    }

    fn channel(replies: &[&[u8]]) -> RawReplChannel<Script> {
        RawReplChannel::new(RawRepl::new(
            Script::replying(replies),
            Duration::from_millis(200),
        ))
    }

    #[test]
    fn enter_waits_for_soft_reboot() {
        let mut repl = RawRepl::new(
            Script::replying(&[
                b"MicroPython v1.10\r\n>>> ",
                b"raw REPL; CTRL-B to exit\r\n>",
                b"OK\r\nMPY: soft reboot\r\n",
                b"raw REPL; CTRL-B to exit\r\n",
            ]),
            Duration::from_millis(200),
        );
        repl.enter(Duration::ZERO).expect("enter");
        assert_eq!(repl.into_inner().written, b"\r\x03\x03\r\x01\x04".to_vec());
    }

    #[test]
    fn enter_times_out_without_prompt() {
        let mut repl = RawRepl::new(
            Script::replying(&[b"garbage"]),
            Duration::from_millis(30),
        );
        let err = repl.enter(Duration::ZERO).expect_err("should time out");
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[test]
    fn get_decodes_base64_lines() {
        let payload = br#"{"wifis": {}}"#;
        let line = format!("{}\r\n", BASE64_STANDARD.encode(payload));
        let reply = exec_reply(line.as_bytes(), b"");
        let mut ch = channel(&[&reply]);
        assert_eq!(ch.get("config.json").expect("get"), payload.to_vec());
    }

    #[test]
    fn get_missing_file() {
        let reply = exec_reply(b"", b"Traceback...\r\nOSError: [Errno 2] ENOENT\r\n");
        let mut ch = channel(&[&reply]);
        let err = ch.get("nope.json").expect_err("should fail");
        assert!(matches!(err, DeviceError::FileNotFound(ref n) if n == "nope.json"));
    }

    #[test]
    fn put_sends_base64_chunks() {
        let data = vec![b'x'; UPLOAD_CHUNK + 10];
        let ok = exec_reply(b"", b"");
        let mut ch = channel(&[&ok, &ok, &ok, &ok]);
        ch.put("main.py", &data).expect("put");

        let written = String::from_utf8(ch.repl.take().expect("open").into_inner().written)
            .expect("utf8");
        assert!(written.contains("f = open('main.py', 'wb')"));
        assert_eq!(written.matches("a2b_base64").count(), 2);
        assert!(written.contains("f.close()"));
    }

    #[test]
    fn put_reports_device_error() {
        let reply = exec_reply(b"", b"OSError: 28\r\n");
        let mut ch = channel(&[&reply]);
        let err = ch.put("main.py", b"pass").expect_err("should fail");
        assert!(matches!(err, DeviceError::Protocol(ref m) if m.contains("OSError")));
    }

    #[test]
    fn networks_are_deduplicated() {
        let reply = exec_reply(b"Office\r\nHome\r\nOffice\r\n\r\n", b"");
        let mut ch = channel(&[&reply]);
        assert_eq!(
            ch.list_networks().expect("scan"),
            vec!["Office".to_owned(), "Home".to_owned()]
        );
    }

    #[test]
    fn close_leaves_raw_mode_once() {
        let mut ch = channel(&[]);
        ch.close().expect("close");
        ch.close().expect("second close");
        assert!(ch.get("config.json").is_err());
    }

    #[test]
    fn quoting() {
        assert_eq!(py_str("config.json"), "'config.json'");
        assert_eq!(py_str("it's"), "'it\\'s'");
    }
}
