//! Guarded access to the job-control state.
//!
//! [`JobControl`] owns the job table, the process backend, the console and
//! the foreground-released flag, but exposes none of them directly. The only
//! way in is [`JobControl::block`], which blocks the guarded signals and hands
//! back a [`Blocked`] view. Anything that reads or changes jobs, or signals a
//! process group, is a method on `Blocked`, so it can't happen unguarded.
//!
//! # Foreground wait
//!
//! [`Blocked::wait_foreground`] gives up the guard and waits on the
//! notification channel until the reaper reports that the foreground job
//! stopped or died:
//!
//! ```text
//! loop:
//!     fg_ready?          ── yes ─▶ return
//!     recv().await       (queued notifications are returned immediately)
//!     block → handle → unblock
//! ```
//!
//! A notification that arrives after the flag check is already sitting in the
//! channel when `recv` is polled, so the wait can't miss it.

use nix::sys::signal::Signal;

use jobsh_types::Notice;

use crate::backend::ProcessBackend;
use crate::console::Console;
use crate::error::ShellResult;
use crate::guard::SignalGuard;
use crate::notify::{Notification, Notifications};
use crate::table::JobTable;

/// What the read/eval loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Exit the shell with this status.
    Exit(i32),
}

/// Message printed before exiting on SIGQUIT.
pub const QUIT_MESSAGE: &str = "Terminating after receipt of SIGQUIT signal";

/// Job-control state, reachable only under the signal guard.
pub struct JobControl {
    table: JobTable,
    backend: Box<dyn ProcessBackend>,
    console: Console,
    /// Set by the reaper when the foreground job stops or terminates.
    fg_ready: bool,
}

impl JobControl {
    pub fn new(table: JobTable, backend: Box<dyn ProcessBackend>, console: Console) -> Self {
        Self {
            table,
            backend,
            console,
            fg_ready: false,
        }
    }

    /// Block the guarded signals and borrow the state.
    pub fn block(&mut self) -> ShellResult<Blocked<'_>> {
        let guard = SignalGuard::block()?;
        Ok(Blocked {
            guard,
            control: self,
        })
    }
}

/// Job-control state with SIGCHLD, SIGINT and SIGTSTP blocked.
///
/// Dropping it restores the signal mask.
pub struct Blocked<'a> {
    guard: SignalGuard,
    pub(crate) control: &'a mut JobControl,
}

impl<'a> Blocked<'a> {
    pub fn jobs(&self) -> &JobTable {
        &self.control.table
    }

    pub fn jobs_mut(&mut self) -> &mut JobTable {
        &mut self.control.table
    }

    pub fn backend(&mut self) -> &mut dyn ProcessBackend {
        self.control.backend.as_mut()
    }

    pub fn console(&mut self) -> &mut Console {
        &mut self.control.console
    }

    /// Print a job notice on stdout.
    pub fn notice(&mut self, notice: Notice) {
        self.control.console.line(notice);
    }

    /// Clear the foreground-released flag before a job becomes foreground.
    pub fn expect_foreground(&mut self) {
        self.control.fg_ready = false;
    }

    /// Whether the reaper has released the foreground wait.
    pub fn foreground_released(&self) -> bool {
        self.control.fg_ready
    }

    pub(crate) fn release_foreground(&mut self) {
        self.control.fg_ready = true;
    }

    /// Run the handler for one notification.
    pub fn handle(&mut self, notification: Notification) -> ShellResult<Flow> {
        tracing::debug!(?notification, "handling notification");
        match notification {
            Notification::ChildChanged => {
                self.reap()?;
            }
            Notification::Interrupt => self.forward(Signal::SIGINT),
            Notification::Stop => self.forward(Signal::SIGTSTP),
            Notification::Quit => {
                self.control.console.line(QUIT_MESSAGE);
                return Ok(Flow::Exit(1));
            }
        }
        Ok(Flow::Continue)
    }

    /// Release the guard and wait until the foreground job stops or terminates.
    ///
    /// Notifications that arrive meanwhile are handled in order, each under a
    /// fresh guard. Returns early with `Flow::Exit` if one of them ends the
    /// shell.
    pub async fn wait_foreground(self, notifications: &mut Notifications) -> ShellResult<Flow> {
        let Blocked { guard, control } = self;
        drop(guard);

        loop {
            if control.fg_ready {
                tracing::debug!("foreground wait released");
                return Ok(Flow::Continue);
            }
            let notification = notifications.recv().await?;
            if let Flow::Exit(code) = control.block()?.handle(notification)? {
                return Ok(Flow::Exit(code));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChildEvent, MockHandle, MockProcesses};
    use crate::console::Captured;
    use jobsh_types::JobState;
    use nix::unistd::Pid;

    fn control() -> (JobControl, MockHandle, Captured) {
        let (backend, handle) = MockProcesses::new();
        let (console, captured) = Console::capture();
        let control = JobControl::new(JobTable::default(), Box::new(backend), console);
        (control, handle, captured)
    }

    #[test]
    fn quit_notification_exits_with_message() {
        let (mut control, _handle, captured) = control();
        let flow = control.block().unwrap().handle(Notification::Quit).unwrap();
        assert_eq!(flow, Flow::Exit(1));
        assert_eq!(captured.stdout(), format!("{QUIT_MESSAGE}\n"));
    }

    #[tokio::test]
    async fn wait_returns_on_notification_queued_before_waiting() {
        let (mut control, handle, captured) = control();
        let (tx, mut notifications) = Notifications::channel();
        let pid = Pid::from_raw(1000);

        let mut blocked = control.block().unwrap();
        blocked.expect_foreground();
        blocked.jobs_mut().add(pid, JobState::ForegroundRunning, "sleep 9").unwrap();

        // The child stops before the wait even starts.
        handle.push_event(ChildEvent::Stopped { pid, signal: Signal::SIGTSTP });
        tx.send(Notification::ChildChanged).unwrap();

        let flow = blocked.wait_foreground(&mut notifications).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(
            captured.stdout(),
            format!("Job [1] (1000) stopped by signal {}\n", Signal::SIGTSTP as i32)
        );

        let blocked = control.block().unwrap();
        assert_eq!(blocked.jobs().find_by_pid(pid).unwrap().state, JobState::Stopped);
    }

    #[tokio::test]
    async fn wait_skips_unrelated_notifications() {
        let (mut control, handle, _captured) = control();
        let (tx, mut notifications) = Notifications::channel();
        let fg = Pid::from_raw(1000);
        let bg = Pid::from_raw(1001);

        let mut blocked = control.block().unwrap();
        blocked.jobs_mut().add(bg, JobState::BackgroundRunning, "sleep 1 &").unwrap();
        blocked.expect_foreground();
        blocked.jobs_mut().add(fg, JobState::ForegroundRunning, "sleep 9").unwrap();

        // A background exit does not release the wait; the foreground exit does.
        handle.push_event(ChildEvent::Exited { pid: bg, code: 0 });
        tx.send(Notification::ChildChanged).unwrap();
        tx.send(Notification::Interrupt).unwrap();
        tx.send(Notification::ChildChanged).unwrap();

        {
            let waiter = blocked.wait_foreground(&mut notifications);
            tokio::pin!(waiter);
            let early =
                tokio::time::timeout(std::time::Duration::from_millis(50), &mut waiter).await;
            assert!(early.is_err(), "wait must not return while the foreground job runs");

            handle.push_event(ChildEvent::Signaled { pid: fg, signal: Signal::SIGINT });
            tx.send(Notification::ChildChanged).unwrap();
            assert_eq!(waiter.await.unwrap(), Flow::Continue);
        }

        assert_eq!(handle.signals(), vec![(fg, Signal::SIGINT)]);
        assert!(control.block().unwrap().jobs().is_empty());
    }

    #[tokio::test]
    async fn quit_during_wait_exits() {
        let (mut control, _handle, _captured) = control();
        let (tx, mut notifications) = Notifications::channel();

        let mut blocked = control.block().unwrap();
        blocked.expect_foreground();
        blocked
            .jobs_mut()
            .add(Pid::from_raw(1000), JobState::ForegroundRunning, "cat")
            .unwrap();
        tx.send(Notification::Quit).unwrap();

        assert_eq!(blocked.wait_foreground(&mut notifications).await.unwrap(), Flow::Exit(1));
    }
}
