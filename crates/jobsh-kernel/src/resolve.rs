//! `bg` and `fg`: resolve a job reference and continue a stopped job.
//!
//! A reference is `%<job id>` or a bare process id. Bad or unknown references
//! print a diagnostic and change nothing. A job that exists but isn't stopped
//! is left alone without a word, so repeating `bg`/`fg` is harmless.

use std::fmt;
use std::str::FromStr;

use nix::sys::signal::Signal;
use nix::unistd::Pid;

use jobsh_types::{JobId, JobState, Notice};

use crate::control::{Flow, JobControl};
use crate::error::ShellResult;
use crate::notify::Notifications;

/// Which builtin is continuing the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// `bg`: continue without waiting.
    Background,
    /// `fg`: continue and wait for it.
    Foreground,
}

impl fmt::Display for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resume::Background => "bg",
            Resume::Foreground => "fg",
        })
    }
}

/// A job named on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRef {
    /// `%<n>`
    Job(JobId),
    /// `<pid>`
    Process(Pid),
}

/// A token that is neither `%<digits>` nor `<digits>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadJobRef;

fn digits<T: FromStr>(text: &str) -> Result<T, BadJobRef> {
    // `str::parse` would also accept a leading '+'.
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BadJobRef);
    }
    text.parse().map_err(|_| BadJobRef)
}

impl FromStr for JobRef {
    type Err = BadJobRef;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.strip_prefix('%') {
            Some(id) => Ok(JobRef::Job(JobId(digits(id)?))),
            None => Ok(JobRef::Process(Pid::from_raw(digits(token)?))),
        }
    }
}

impl JobRef {
    fn not_found(self) -> String {
        match self {
            JobRef::Job(id) => format!("%{}: No such job", id),
            JobRef::Process(pid) => format!("({}): No such process", pid),
        }
    }
}

/// Run `bg` or `fg` with the builtin's argument vector.
pub async fn resume(
    control: &mut JobControl,
    notifications: &mut Notifications,
    resume: Resume,
    argv: &[String],
) -> ShellResult<Flow> {
    let mut blocked = control.block()?;

    let Some(token) = argv.get(1) else {
        blocked
            .console()
            .error(format_args!("{} command requires PID or %jobid argument", resume));
        return Ok(Flow::Continue);
    };
    let Ok(target) = token.parse::<JobRef>() else {
        blocked
            .console()
            .error(format_args!("{}: argument must be a PID or %jobid", resume));
        return Ok(Flow::Continue);
    };

    let found = match target {
        JobRef::Job(id) => blocked.jobs().find_by_job_id(id),
        JobRef::Process(pid) => blocked.jobs().find_by_pid(pid),
    };
    let Some(job) = found.cloned() else {
        blocked.console().error(target.not_found());
        return Ok(Flow::Continue);
    };

    if job.state != JobState::Stopped {
        tracing::debug!(job = %job.id, state = ?job.state, "{} ignored, job not stopped", resume);
        return Ok(Flow::Continue);
    }

    if let Err(e) = blocked.backend().signal_group(job.pid, Signal::SIGCONT) {
        tracing::warn!(job = %job.id, pid = %job.pid, "failed to continue job: {}", e);
    }

    match resume {
        Resume::Background => {
            blocked.jobs_mut().set_state(job.pid, JobState::BackgroundRunning);
            blocked.notice(Notice::Background {
                id: job.id,
                pid: job.pid.as_raw() as u32,
                command: job.command,
            });
            Ok(Flow::Continue)
        }
        Resume::Foreground => {
            blocked.expect_foreground();
            blocked.jobs_mut().set_state(job.pid, JobState::ForegroundRunning);
            blocked.wait_foreground(notifications).await
        }
    }
}
