//! Where the shell's own output goes.
//!
//! Every line is formatted first and then written with a single unbuffered
//! write, so it follows whatever fd 1 / fd 2 point at right now (including an
//! active redirection) and never leaves half a line behind.

use std::fmt::Display;
use std::io::{self, Write};
use std::os::fd::AsFd;
use std::sync::{Arc, Mutex};

/// Output and diagnostic sinks.
pub struct Console {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
}

impl Console {
    /// Direct writes to the process's stdout and stderr descriptors.
    pub fn stdio() -> Self {
        Self {
            out: Box::new(FdWriter::Stdout),
            err: Box::new(FdWriter::Stderr),
        }
    }

    /// In-memory sinks, plus a handle to read what was written.
    pub fn capture() -> (Self, Captured) {
        let captured = Captured::default();
        let console = Self {
            out: Box::new(SharedBuf(captured.out.clone())),
            err: Box::new(SharedBuf(captured.err.clone())),
        };
        (console, captured)
    }

    /// Print one line on stdout.
    pub fn line(&mut self, text: impl Display) {
        emit(&mut self.out, text);
    }

    /// Print one diagnostic line on stderr.
    pub fn error(&mut self, text: impl Display) {
        emit(&mut self.err, text);
    }
}

fn emit(sink: &mut Box<dyn Write + Send>, text: impl Display) {
    let line = format!("{}\n", text);
    if let Err(e) = sink.write_all(line.as_bytes()) {
        tracing::warn!("console write failed: {}", e);
    }
}

/// Unbuffered writer on fd 1 or fd 2.
enum FdWriter {
    Stdout,
    Stderr,
}

impl Write for FdWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = match self {
            FdWriter::Stdout => nix::unistd::write(io::stdout().as_fd(), buf),
            FdWriter::Stderr => nix::unistd::write(io::stderr().as_fd(), buf),
        };
        written.map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("capture buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read side of [`Console::capture`].
#[derive(Clone, Default)]
pub struct Captured {
    out: Arc<Mutex<Vec<u8>>>,
    err: Arc<Mutex<Vec<u8>>>,
}

impl Captured {
    /// Everything written to stdout so far.
    pub fn stdout(&self) -> String {
        read(&self.out)
    }

    /// Everything written to stderr so far.
    pub fn stderr(&self) -> String {
        read(&self.err)
    }

    /// Drain both buffers.
    pub fn clear(&self) {
        for buf in [&self.out, &self.err] {
            if let Ok(mut buf) = buf.lock() {
                buf.clear();
            }
        }
    }
}

fn read(buf: &Mutex<Vec<u8>>) -> String {
    buf.lock()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
