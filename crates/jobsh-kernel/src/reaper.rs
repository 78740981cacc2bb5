//! SIGCHLD handler: collect every changed child and update the job table.

use jobsh_types::{JobState, Notice};

use crate::backend::ChildEvent;
use crate::control::Blocked;
use crate::error::ShellResult;

impl Blocked<'_> {
    /// Drain all pending child state changes. Returns how many were collected.
    ///
    /// Terminated jobs are removed, stopped jobs marked `Stopped`. If the job
    /// that changed was the foreground job, the foreground wait is released.
    pub fn reap(&mut self) -> ShellResult<usize> {
        let mut collected = 0;
        while let Some(event) = self.backend().poll_changed()? {
            collected += 1;
            self.record(event);
        }
        Ok(collected)
    }

    fn record(&mut self, event: ChildEvent) {
        let pid = event.pid();
        let Some(job) = self.jobs().find_by_pid(pid) else {
            tracing::warn!(%pid, ?event, "state change for unknown child");
            return;
        };
        let (id, prior) = (job.id, job.state);
        let raw_pid = pid.as_raw() as u32;

        match event {
            ChildEvent::Exited { code, .. } => {
                self.jobs_mut().remove(pid);
                tracing::debug!(job = %id, %pid, code, "job exited");
            }
            ChildEvent::Signaled { signal, .. } => {
                self.jobs_mut().remove(pid);
                self.notice(Notice::Terminated {
                    id,
                    pid: raw_pid,
                    signal: signal as i32,
                });
            }
            ChildEvent::Stopped { signal, .. } => {
                self.jobs_mut().set_state(pid, JobState::Stopped);
                self.notice(Notice::Stopped {
                    id,
                    pid: raw_pid,
                    signal: signal as i32,
                });
            }
        }

        if prior == JobState::ForegroundRunning {
            self.release_foreground();
        }
    }
}
