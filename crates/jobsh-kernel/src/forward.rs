//! SIGINT / SIGTSTP handlers: relay the signal to the foreground job.

use nix::sys::signal::Signal;

use crate::control::Blocked;

impl Blocked<'_> {
    /// Send `signal` to the foreground job's whole process group.
    ///
    /// Without a foreground job the signal is absorbed. It never reaches the
    /// shell's own group.
    pub fn forward(&mut self, signal: Signal) {
        let Some(pgid) = self.jobs().find_foreground().map(|job| job.pid) else {
            tracing::debug!(%signal, "no foreground job, signal absorbed");
            return;
        };
        tracing::debug!(%signal, %pgid, "forwarding to foreground group");
        if let Err(e) = self.backend().signal_group(pgid, signal) {
            tracing::warn!(%signal, %pgid, "failed to forward signal: {}", e);
        }
    }
}
