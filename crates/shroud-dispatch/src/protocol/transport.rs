//! Concrete transports: helper subprocess stdio and local unix socket

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use shroud_core::{Error, Result};

use crate::protocol::Transport;

/// How often the subprocess exit status is polled while closing
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

fn read_one_line(reader: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    let bytes = reader.read_line(&mut line)?;
    if bytes == 0 {
        return Err(Error::protocol("transport closed unexpectedly"));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// Transport over a helper subprocess, speaking the protocol on the
/// child's standard input and output.
pub struct ChildTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
}

impl ChildTransport {
    /// Spawn `program` with piped stdio
    pub fn spawn(program: &str) -> Result<Self> {
        let mut child = Command::new(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::protocol("child stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::protocol("child stdout not captured"))?;
        Ok(Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
        })
    }
}

impl Transport for ChildTransport {
    fn write_line(&mut self, line: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::protocol("transport already closed"))?;
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        read_one_line(&mut self.reader)
    }

    fn close(&mut self, timeout: Duration) -> std::result::Result<(), String> {
        // dropping stdin signals EOF to the helper
        drop(self.stdin.take());

        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    return if status.success() {
                        Ok(())
                    } else {
                        Err(format!("exit code: {}", status.code().unwrap_or(-1)))
                    };
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = self.child.kill();
                        return Err(format!(
                            "helper did not exit within {} seconds",
                            timeout.as_secs()
                        ));
                    }
                    std::thread::sleep(EXIT_POLL_INTERVAL);
                }
                Err(e) => return Err(format!("failed to reap helper: {e}")),
            }
        }
    }
}

/// Transport over a local unix domain socket
#[cfg(unix)]
pub struct SocketTransport {
    reader: BufReader<std::os::unix::net::UnixStream>,
    stream: std::os::unix::net::UnixStream,
}

#[cfg(unix)]
impl SocketTransport {
    /// Connect to the socket at `path`
    pub fn connect(path: &std::path::Path) -> Result<Self> {
        let stream = std::os::unix::net::UnixStream::connect(path)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self { reader, stream })
    }
}

#[cfg(unix)]
impl Transport for SocketTransport {
    fn write_line(&mut self, line: &str) -> Result<()> {
        self.stream.write_all(line.as_bytes())?;
        self.stream.write_all(b"\n")?;
        self.stream.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        read_one_line(&mut self.reader)
    }

    fn close(&mut self, timeout: Duration) -> std::result::Result<(), String> {
        use std::net::Shutdown;

        if let Err(e) = self.stream.shutdown(Shutdown::Write) {
            return Err(format!("socket shutdown failed: {e}"));
        }
        if let Err(e) = self.stream.set_read_timeout(Some(timeout)) {
            return Err(format!("socket timeout not settable: {e}"));
        }
        // drain until the peer closes its side
        let mut sink = [0u8; 256];
        loop {
            match self.reader.read(&mut sink) {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    return Err(format!(
                        "agent did not close within {} seconds",
                        timeout.as_secs()
                    ));
                }
                Err(e) => return Err(format!("socket error while closing: {e}")),
            }
        }
    }
}
