//! The job table: authoritative record of every live child process.
//!
//! Plain data, no locking. Callers reach a mutable table only through
//! [`Blocked`](crate::control::Blocked), which holds the signal guard.

use nix::unistd::Pid;

use jobsh_types::{JobId, JobInfo, JobState};

use crate::config::{DEFAULT_MAX_JOBS, DEFAULT_MAX_JOB_ID};
use crate::error::{ShellError, ShellResult};

/// One live child process and its control metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Process ID; also the job's process group ID.
    pub pid: Pid,
    /// Shell-local job number.
    pub id: JobId,
    /// Current control state.
    pub state: JobState,
    /// Command line as typed, kept for display only.
    pub command: String,
}

impl Job {
    /// Snapshot for listing.
    pub fn info(&self) -> JobInfo {
        JobInfo {
            id: self.id,
            pid: self.pid.as_raw() as u32,
            state: self.state,
            command: self.command.clone(),
        }
    }
}

/// Bounded collection of jobs, in insertion order.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    capacity: usize,
    max_id: u32,
    /// Most recently assigned id (0 before the first add).
    last_id: u32,
}

impl JobTable {
    /// Create an empty table.
    ///
    /// `max_id` is raised to at least `capacity` so a free id always exists
    /// while the table has room.
    pub fn new(capacity: usize, max_id: u32) -> Self {
        let floor = u32::try_from(capacity).unwrap_or(u32::MAX).max(1);
        Self {
            jobs: Vec::with_capacity(capacity),
            capacity,
            max_id: max_id.max(floor),
            last_id: 0,
        }
    }

    /// Maximum number of live jobs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.capacity
    }

    /// Register a freshly created process and return its job id.
    pub fn add(&mut self, pid: Pid, state: JobState, command: &str) -> ShellResult<JobId> {
        if self.is_full() {
            return Err(ShellError::TableFull {
                capacity: self.capacity,
            });
        }
        debug_assert!(self.find_by_pid(pid).is_none(), "pid {pid} already in table");
        debug_assert!(
            state != JobState::ForegroundRunning || self.find_foreground().is_none(),
            "second foreground job"
        );

        let id = self.next_free_id();
        self.jobs.push(Job {
            pid,
            id,
            state,
            command: command.to_string(),
        });
        tracing::debug!(job = %id, %pid, ?state, command, "added job");
        Ok(id)
    }

    /// Advance past `last_id`, wrapping after `max_id` and skipping ids in use.
    fn next_free_id(&mut self) -> JobId {
        let mut candidate = self.last_id;
        loop {
            candidate = if candidate >= self.max_id { 1 } else { candidate + 1 };
            if self.find_by_job_id(JobId(candidate)).is_none() {
                break;
            }
        }
        self.last_id = candidate;
        JobId(candidate)
    }

    /// Remove the job for `pid`, keeping the order of the rest.
    pub fn remove(&mut self, pid: Pid) -> Option<Job> {
        let index = self.jobs.iter().position(|job| job.pid == pid)?;
        let job = self.jobs.remove(index);
        tracing::debug!(job = %job.id, %pid, "removed job");
        Some(job)
    }

    pub fn find_by_pid(&self, pid: Pid) -> Option<&Job> {
        self.jobs.iter().find(|job| job.pid == pid)
    }

    pub fn find_by_pid_mut(&mut self, pid: Pid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.pid == pid)
    }

    pub fn find_by_job_id(&self, id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    /// The job in `ForegroundRunning` state, if any.
    pub fn find_foreground(&self) -> Option<&Job> {
        self.jobs
            .iter()
            .find(|job| job.state == JobState::ForegroundRunning)
    }

    /// Change a job's state, returning the state it had before.
    pub fn set_state(&mut self, pid: Pid, state: JobState) -> Option<JobState> {
        debug_assert!(
            state != JobState::ForegroundRunning
                || self.find_foreground().is_none_or(|fg| fg.pid == pid),
            "second foreground job"
        );
        let job = self.find_by_pid_mut(pid)?;
        let prior = std::mem::replace(&mut job.state, state);
        tracing::debug!(job = %job.id, %pid, ?prior, ?state, "job state changed");
        Some(prior)
    }

    /// All live jobs in insertion order.
    pub fn snapshot(&self) -> Vec<JobInfo> {
        self.jobs.iter().map(Job::info).collect()
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_JOBS, DEFAULT_MAX_JOB_ID)
    }
}
