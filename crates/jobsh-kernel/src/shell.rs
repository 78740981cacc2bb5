//! The command evaluator.
//!
//! [`Shell::eval`] takes one input line through parse, redirection and
//! dispatch. External commands are spawned and registered under one guard;
//! foreground ones are then waited for with [`Blocked::wait_foreground`].
//!
//! [`Blocked::wait_foreground`]: crate::control::Blocked::wait_foreground

use jobsh_types::{JobInfo, JobState, Notice};

use crate::backend::{Launch, ProcessBackend, SystemProcesses};
use crate::config::ShellConfig;
use crate::console::Console;
use crate::control::{Flow, JobControl};
use crate::error::{ShellError, ShellResult};
use crate::notify::{Notification, Notifications};
use crate::parser::{parse, Command, CommandKind};
use crate::redirect::Redirection;
use crate::resolve::{resume, Resume};
use crate::table::JobTable;

/// A job-control shell: job table, process backend and notification stream.
pub struct Shell {
    control: JobControl,
    notifications: Notifications,
}

impl Shell {
    /// Assemble a shell from its parts.
    pub fn new(
        config: ShellConfig,
        backend: Box<dyn ProcessBackend>,
        console: Console,
        notifications: Notifications,
    ) -> Self {
        let table = JobTable::new(config.max_jobs, config.max_job_id);
        Self {
            control: JobControl::new(table, backend, console),
            notifications,
        }
    }

    /// A shell running real processes, printing to stdio, and listening for
    /// signals. Must be created inside a tokio runtime.
    pub fn system(config: ShellConfig) -> ShellResult<Self> {
        let notifications = Notifications::listen()?;
        Ok(Self::new(
            config,
            Box::new(SystemProcesses::new()),
            Console::stdio(),
            notifications,
        ))
    }

    /// Evaluate one command line.
    ///
    /// Returns `Err` only for conditions that end the shell: the job table
    /// is full, fork failed, or the signal machinery broke.
    #[tracing::instrument(level = "debug", skip_all, fields(command = %line))]
    pub async fn eval(&mut self, line: &str) -> ShellResult<Flow> {
        let text = line.trim_end_matches(['\n', '\r']);
        let command = match parse(text) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                self.control.block()?.console().error(e);
                return Ok(Flow::Continue);
            }
        };

        let redirection =
            match Redirection::apply(command.input.as_deref(), command.output.as_deref()) {
                Ok(redirection) => redirection,
                Err(e) => {
                    self.control.block()?.console().error(e);
                    return Ok(Flow::Continue);
                }
            };

        match command.kind {
            CommandKind::Quit => Ok(Flow::Exit(0)),
            CommandKind::ListJobs => {
                let mut blocked = self.control.block()?;
                for info in blocked.jobs().snapshot() {
                    blocked.console().line(info);
                }
                Ok(Flow::Continue)
            }
            CommandKind::Background => {
                resume(&mut self.control, &mut self.notifications, Resume::Background, &command.argv)
                    .await
            }
            CommandKind::Foreground => {
                resume(&mut self.control, &mut self.notifications, Resume::Foreground, &command.argv)
                    .await
            }
            CommandKind::External => self.launch(&command, text, redirection).await,
        }
    }

    /// Spawn an external command. The redirection is only for the child: it
    /// is undone right after the fork, before any notice is printed.
    async fn launch(
        &mut self,
        command: &Command,
        text: &str,
        redirection: Redirection,
    ) -> ShellResult<Flow> {
        let launch = Launch::new(command.argv.clone());
        let mut blocked = self.control.block()?;

        // Checked before forking so a full table never leaves an untracked child.
        if blocked.jobs().is_full() {
            return Err(ShellError::TableFull {
                capacity: blocked.jobs().capacity(),
            });
        }

        let pid = blocked.backend().spawn(&launch)?;
        drop(redirection);
        let state = if command.background {
            JobState::BackgroundRunning
        } else {
            blocked.expect_foreground();
            JobState::ForegroundRunning
        };
        let id = blocked.jobs_mut().add(pid, state, text)?;

        if command.background {
            blocked.notice(Notice::Background {
                id,
                pid: pid.as_raw() as u32,
                command: text.to_string(),
            });
            return Ok(Flow::Continue);
        }
        blocked.wait_foreground(&mut self.notifications).await
    }

    /// Wait for the next asynchronous notification. Cancel safe.
    pub async fn next_notification(&mut self) -> ShellResult<Notification> {
        self.notifications.recv().await
    }

    /// Run the handler for a notification received while idle.
    pub fn handle(&mut self, notification: Notification) -> ShellResult<Flow> {
        self.control.block()?.handle(notification)
    }

    /// Current jobs, in creation order.
    pub fn jobs(&mut self) -> ShellResult<Vec<JobInfo>> {
        Ok(self.control.block()?.jobs().snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::FIRST_MOCK_PID;
    use crate::backend::{ChildEvent, MockHandle, MockProcesses};
    use crate::console::Captured;
    use crate::notify::NotificationSender;
    use jobsh_types::JobId;
    use nix::sys::signal::Signal;
    use nix::unistd::Pid;

    struct Harness {
        shell: Shell,
        processes: MockHandle,
        output: Captured,
        notify: NotificationSender,
    }

    fn harness_with(config: ShellConfig) -> Harness {
        let (backend, processes) = MockProcesses::new();
        let (console, output) = Console::capture();
        let (notify, notifications) = Notifications::channel();
        Harness {
            shell: Shell::new(config, Box::new(backend), console, notifications),
            processes,
            output,
            notify,
        }
    }

    fn harness() -> Harness {
        harness_with(ShellConfig::batch())
    }

    fn first_pid() -> Pid {
        Pid::from_raw(FIRST_MOCK_PID)
    }

    impl Harness {
        /// Queue a child event and the SIGCHLD that announces it.
        fn child_changed(&self, event: ChildEvent) {
            self.processes.push_event(event);
            self.notify.send(Notification::ChildChanged).unwrap();
        }

        async fn eval(&mut self, line: &str) -> Flow {
            self.shell.eval(line).await.unwrap()
        }

        fn states(&mut self) -> Vec<JobState> {
            self.shell.jobs().unwrap().into_iter().map(|j| j.state).collect()
        }
    }

    #[tokio::test]
    async fn background_launch_announces_and_returns() {
        let mut h = harness();
        assert_eq!(h.eval("sleep 5 &\n").await, Flow::Continue);

        assert_eq!(h.output.stdout(), "[1] (1000) sleep 5 &\n");
        assert_eq!(h.states(), vec![JobState::BackgroundRunning]);
        assert_eq!(h.processes.spawned(), vec![vec!["sleep".to_string(), "5".to_string()]]);
    }

    #[tokio::test]
    async fn foreground_stop_returns_to_prompt() {
        let mut h = harness();
        h.child_changed(ChildEvent::Stopped {
            pid: first_pid(),
            signal: Signal::SIGTSTP,
        });

        assert_eq!(h.eval("sleep 30").await, Flow::Continue);
        assert_eq!(
            h.output.stdout(),
            format!("Job [1] (1000) stopped by signal {}\n", Signal::SIGTSTP as i32)
        );
        assert_eq!(h.states(), vec![JobState::Stopped]);
    }

    #[tokio::test]
    async fn keyboard_stop_is_forwarded_then_reported() {
        let mut h = harness();
        h.notify.send(Notification::Stop).unwrap();
        h.child_changed(ChildEvent::Stopped {
            pid: first_pid(),
            signal: Signal::SIGTSTP,
        });

        h.eval("sleep 30").await;
        assert_eq!(h.processes.signals(), vec![(first_pid(), Signal::SIGTSTP)]);
        assert_eq!(h.states(), vec![JobState::Stopped]);
    }

    #[tokio::test]
    async fn bg_continues_stopped_job() {
        let mut h = harness();
        h.child_changed(ChildEvent::Stopped {
            pid: first_pid(),
            signal: Signal::SIGTSTP,
        });
        h.eval("sleep 30").await;
        h.output.clear();

        assert_eq!(h.eval("bg %1").await, Flow::Continue);
        assert_eq!(h.processes.signals(), vec![(first_pid(), Signal::SIGCONT)]);
        assert_eq!(h.states(), vec![JobState::BackgroundRunning]);
        assert_eq!(h.output.stdout(), "[1] (1000) sleep 30\n");
    }

    #[tokio::test]
    async fn fg_by_pid_waits_for_termination() {
        let mut h = harness();
        h.child_changed(ChildEvent::Stopped {
            pid: first_pid(),
            signal: Signal::SIGSTOP,
        });
        h.eval("cat").await;

        h.child_changed(ChildEvent::Exited {
            pid: first_pid(),
            code: 0,
        });
        assert_eq!(h.eval("fg 1000").await, Flow::Continue);
        assert_eq!(h.processes.signals(), vec![(first_pid(), Signal::SIGCONT)]);
        assert!(h.states().is_empty());
    }

    #[tokio::test]
    async fn foreground_killed_by_signal() {
        let mut h = harness();
        h.notify.send(Notification::Interrupt).unwrap();
        h.child_changed(ChildEvent::Signaled {
            pid: first_pid(),
            signal: Signal::SIGINT,
        });

        assert_eq!(h.eval("sleep 30").await, Flow::Continue);
        assert_eq!(h.processes.signals(), vec![(first_pid(), Signal::SIGINT)]);
        assert_eq!(
            h.output.stdout(),
            format!("Job [1] (1000) terminated by signal {}\n", Signal::SIGINT as i32)
        );
        assert!(h.states().is_empty());
    }

    #[tokio::test]
    async fn bg_and_fg_leave_running_jobs_alone() {
        let mut h = harness();
        h.eval("sleep 30 &").await;
        h.output.clear();

        assert_eq!(h.eval("bg %1").await, Flow::Continue);
        // Returns without waiting: nothing will ever stop this job.
        assert_eq!(h.eval("fg %1").await, Flow::Continue);

        assert!(h.processes.signals().is_empty());
        assert_eq!(h.states(), vec![JobState::BackgroundRunning]);
        assert_eq!(h.output.stdout(), "");
        assert_eq!(h.output.stderr(), "");
    }

    #[tokio::test]
    async fn bg_fg_diagnostics() {
        let mut h = harness();
        h.eval("sleep 30 &").await;
        h.output.clear();

        for line in ["bg", "fg", "fg abc", "bg %x", "fg %5", "bg 123"] {
            assert_eq!(h.eval(line).await, Flow::Continue);
        }
        assert_eq!(
            h.output.stderr(),
            "bg command requires PID or %jobid argument\n\
             fg command requires PID or %jobid argument\n\
             fg: argument must be a PID or %jobid\n\
             bg: argument must be a PID or %jobid\n\
             %5: No such job\n\
             (123): No such process\n"
        );
        assert_eq!(h.states(), vec![JobState::BackgroundRunning]);
        assert!(h.processes.signals().is_empty());
    }

    #[tokio::test]
    async fn jobs_lists_in_creation_order() {
        let mut h = harness();
        h.eval("sleep 10 &").await;
        h.child_changed(ChildEvent::Stopped {
            pid: Pid::from_raw(FIRST_MOCK_PID + 1),
            signal: Signal::SIGTSTP,
        });
        h.eval("vim notes.txt").await;
        h.output.clear();

        h.eval("jobs").await;
        assert_eq!(
            h.output.stdout(),
            "[1] (1000) Running sleep 10 &\n[2] (1001) Stopped vim notes.txt\n"
        );
    }

    #[tokio::test]
    async fn idle_notifications_reap_background_jobs() {
        let mut h = harness();
        h.eval("sleep 1 &").await;
        h.eval("sleep 2 &").await;
        h.output.clear();

        h.processes.push_event(ChildEvent::Exited {
            pid: first_pid(),
            code: 0,
        });
        h.processes.push_event(ChildEvent::Signaled {
            pid: Pid::from_raw(FIRST_MOCK_PID + 1),
            signal: Signal::SIGTERM,
        });
        h.notify.send(Notification::ChildChanged).unwrap();

        let notification = h.shell.next_notification().await.unwrap();
        assert_eq!(h.shell.handle(notification).unwrap(), Flow::Continue);
        assert!(h.states().is_empty());
        assert_eq!(
            h.output.stdout(),
            format!("Job [2] (1001) terminated by signal {}\n", Signal::SIGTERM as i32)
        );
    }

    #[tokio::test]
    async fn idle_interrupt_is_absorbed() {
        let mut h = harness();
        h.eval("sleep 10 &").await;
        assert_eq!(h.shell.handle(Notification::Interrupt).unwrap(), Flow::Continue);
        assert!(h.processes.signals().is_empty());
    }

    #[tokio::test]
    async fn ids_keep_counting_after_jobs_finish() {
        let mut h = harness();
        h.eval("a &").await;
        h.processes.push_event(ChildEvent::Exited {
            pid: first_pid(),
            code: 0,
        });
        h.shell.handle(Notification::ChildChanged).unwrap();
        h.eval("b &").await;

        let jobs = h.shell.jobs().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, JobId(2));
    }

    #[tokio::test]
    async fn quit_and_blank_lines() {
        let mut h = harness();
        assert_eq!(h.eval("").await, Flow::Continue);
        assert_eq!(h.eval("   \n").await, Flow::Continue);
        assert_eq!(h.eval("quit").await, Flow::Exit(0));
        assert!(h.processes.spawned().is_empty());
    }

    #[tokio::test]
    async fn parse_errors_are_reported() {
        let mut h = harness();
        assert_eq!(h.eval("echo 'oops").await, Flow::Continue);
        assert_eq!(h.output.stderr(), "unmatched ' quote\n");
        assert!(h.processes.spawned().is_empty());
    }

    #[tokio::test]
    async fn unopenable_redirect_skips_command() {
        let mut h = harness();
        let missing = std::env::temp_dir().join(format!("jobsh-missing-{}", std::process::id()));
        let line = format!("cat < {}", missing.display());

        assert_eq!(h.eval(&line).await, Flow::Continue);
        assert!(h.output.stderr().starts_with(&format!("{}: ", missing.display())));
        assert!(h.processes.spawned().is_empty());
    }

    #[tokio::test]
    async fn full_table_is_fatal_before_fork() {
        let mut h = harness_with(ShellConfig::batch().with_max_jobs(1));
        h.eval("sleep 10 &").await;

        let err = h.shell.eval("sleep 20 &").await.unwrap_err();
        assert!(matches!(err, ShellError::TableFull { capacity: 1 }));
        assert_eq!(h.processes.spawned().len(), 1);
    }

    #[tokio::test]
    async fn fork_failure_is_fatal() {
        let mut h = harness();
        h.processes.fail_next_spawn();
        let err = h.shell.eval("ls").await.unwrap_err();
        assert!(matches!(err, ShellError::Fork(_)));
        assert!(h.states().is_empty());
    }

    #[tokio::test]
    async fn sigquit_during_foreground_wait_exits() {
        let mut h = harness();
        h.notify.send(Notification::Quit).unwrap();
        assert_eq!(h.eval("sleep 30").await, Flow::Exit(1));
        assert_eq!(
            h.output.stdout(),
            "Terminating after receipt of SIGQUIT signal\n"
        );
    }
}
