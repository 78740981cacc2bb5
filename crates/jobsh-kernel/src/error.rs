//! Errors that end the shell.
//!
//! Recoverable conditions (bad job reference, unknown job, bg/fg on a job that
//! is not stopped, a redirection file that won't open) are handled where they
//! occur and never surface here.

use nix::errno::Errno;
use thiserror::Error;

/// Result type for engine operations.
pub type ShellResult<T> = Result<T, ShellError>;

/// Fatal engine errors.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("job table full ({capacity} jobs)")]
    TableFull { capacity: usize },
    #[error("fork failed: {0}")]
    Fork(Errno),
    #[error("signal mask update failed: {0}")]
    Signal(Errno),
    #[error("waitpid failed: {0}")]
    Wait(Errno),
    #[error("notification channel closed")]
    NotificationsClosed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
