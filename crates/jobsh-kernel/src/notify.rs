//! Asynchronous notifications, delivered as messages to the control thread.
//!
//! Signal dispositions are owned by tokio's self-pipe handler: a delivery is
//! recorded the instant it arrives, even if nobody is waiting. A forwarding
//! task turns each observed delivery into a [`Notification`] on an unbounded
//! channel with a single consumer, the control thread.
//!
//! ```text
//!  SIGCHLD ─┐
//!  SIGINT  ─┼─▶ tokio signal streams ─▶ forwarder task ─▶ mpsc ─▶ Notifications::recv()
//!  SIGTSTP ─┤                                                         (control thread)
//!  SIGQUIT ─┘
//! ```
//!
//! Several deliveries of one kind may collapse into one message. That is fine
//! for SIGCHLD because the reaper drains every changed child per message.

use nix::sys::signal::{SigHandler, Signal};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::error::{ShellError, ShellResult};

/// Kind of asynchronous event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// A child terminated or stopped (SIGCHLD).
    ChildChanged,
    /// Keyboard interrupt (SIGINT).
    Interrupt,
    /// Keyboard stop (SIGTSTP).
    Stop,
    /// Quit request (SIGQUIT).
    Quit,
}

/// Producer side of a notification channel.
pub type NotificationSender = mpsc::UnboundedSender<Notification>;

/// Consumer side of the notification channel.
pub struct Notifications {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl Notifications {
    /// Take over SIGCHLD, SIGINT, SIGTSTP and SIGQUIT for this process.
    ///
    /// Must be called from inside a tokio runtime with signal support enabled.
    pub fn listen() -> std::io::Result<Self> {
        let mut child = signal(SignalKind::child())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut stop = signal(SignalKind::from_raw(Signal::SIGTSTP as i32))?;
        let mut quit = signal(SignalKind::quit())?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                let notification = tokio::select! {
                    Some(()) = child.recv() => Notification::ChildChanged,
                    Some(()) = interrupt.recv() => Notification::Interrupt,
                    Some(()) = stop.recv() => Notification::Stop,
                    Some(()) = quit.recv() => Notification::Quit,
                    else => break,
                };
                if tx.send(notification).is_err() {
                    break;
                }
            }
            tracing::debug!("notification forwarder stopped");
        });

        Ok(Self { rx })
    }

    /// A channel fed by hand instead of by signals.
    pub fn channel() -> (NotificationSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait for the next notification.
    ///
    /// Cancel safe: a notification is never lost if this future is dropped.
    pub async fn recv(&mut self) -> ShellResult<Notification> {
        self.rx.recv().await.ok_or(ShellError::NotificationsClosed)
    }
}

/// Ignore SIGTTIN and SIGTTOU so the shell is never stopped by terminal I/O.
pub fn ignore_terminal_stops() -> nix::Result<()> {
    for sig in [Signal::SIGTTIN, Signal::SIGTTOU] {
        // SAFETY: SIG_IGN installs no handler code.
        unsafe { nix::sys::signal::signal(sig, SigHandler::SigIgn) }?;
    }
    Ok(())
}
