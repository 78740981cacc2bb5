//! Signal blocking guard.
//!
//! While a [`SignalGuard`] is alive, SIGCHLD, SIGINT and SIGTSTP are blocked
//! on the current thread. Deliveries stay pending and are handled once the
//! previous mask is restored on drop. Guards nest: an inner guard restores the
//! still-blocked mask of the outer one.

use nix::sys::signal::{SigSet, SigmaskHow, Signal};

use crate::error::{ShellError, ShellResult};

/// Signals held back while the job table is being touched.
pub const GUARDED_SIGNALS: [Signal; 3] = [Signal::SIGCHLD, Signal::SIGINT, Signal::SIGTSTP];

/// The guarded signals as a set.
pub fn guarded_set() -> SigSet {
    let mut set = SigSet::empty();
    for signal in GUARDED_SIGNALS {
        set.add(signal);
    }
    set
}

/// Scoped block of [`GUARDED_SIGNALS`] on the calling thread.
#[must_use = "signals are unblocked as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SignalGuard {
    previous: SigSet,
}

impl SignalGuard {
    /// Block the guarded signals, remembering the current mask.
    pub fn block() -> ShellResult<Self> {
        let previous = guarded_set()
            .thread_swap_mask(SigmaskHow::SIG_BLOCK)
            .map_err(ShellError::Signal)?;
        Ok(Self { previous })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        if let Err(e) = self.previous.thread_set_mask() {
            tracing::warn!("failed to restore signal mask: {}", e);
        }
    }
}
