//! Standard stream redirection for a single command.
//!
//! [`Redirection::apply`] points fd 0 and/or fd 1 at files and puts the old
//! descriptors back when the returned value is dropped. Children spawned in
//! between inherit the redirected streams.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg};
use nix::unistd::dup2;
use thiserror::Error;

const STDIN: RawFd = 0;
const STDOUT: RawFd = 1;

/// Why a redirection could not be set up. The command is skipped.
#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("{}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("redirection failed: {0}")]
    Descriptor(Errno),
}

/// Active redirection; restores the original streams on drop.
#[must_use = "streams are restored as soon as the redirection is dropped"]
#[derive(Debug)]
pub struct Redirection {
    /// `(target fd, saved copy of the original)`, in application order.
    saved: Vec<(RawFd, OwnedFd)>,
}

impl Redirection {
    /// Redirect stdin from `input` and stdout to `output` (created or truncated,
    /// mode 0644). With neither given, no descriptor is touched.
    pub fn apply(input: Option<&Path>, output: Option<&Path>) -> Result<Self, RedirectError> {
        // Open everything first so a failure leaves the streams untouched.
        let input = input
            .map(|path| File::open(path).map_err(|source| open_error(path, source)))
            .transpose()?;
        let output = output
            .map(|path| {
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .mode(0o644)
                    .open(path)
                    .map_err(|source| open_error(path, source))
            })
            .transpose()?;

        let mut redirection = Self { saved: Vec::new() };
        if let Some(file) = input {
            redirection.rebind(STDIN, &file)?;
        }
        if let Some(file) = output {
            redirection.rebind(STDOUT, &file)?;
        }
        Ok(redirection)
    }

    /// Whether any stream is currently redirected.
    pub fn is_active(&self) -> bool {
        !self.saved.is_empty()
    }

    fn rebind(&mut self, target: RawFd, file: &File) -> Result<(), RedirectError> {
        // Saved copies are close-on-exec so children don't inherit them.
        let copy = fcntl(target, FcntlArg::F_DUPFD_CLOEXEC(0)).map_err(RedirectError::Descriptor)?;
        // SAFETY: fcntl just returned a fresh descriptor that nothing else owns.
        let saved = unsafe { OwnedFd::from_raw_fd(copy) };
        dup2(file.as_raw_fd(), target).map_err(RedirectError::Descriptor)?;
        self.saved.push((target, saved));
        Ok(())
    }
}

fn open_error(path: &Path, source: std::io::Error) -> RedirectError {
    RedirectError::Open {
        path: path.to_path_buf(),
        source,
    }
}

impl Drop for Redirection {
    fn drop(&mut self) {
        for (target, saved) in self.saved.drain(..).rev() {
            if let Err(e) = dup2(saved.as_raw_fd(), target) {
                tracing::warn!(fd = target, "failed to restore stream: {}", e);
            }
        }
    }
}
