//! Job identification and control-state types.

/// Shell-local job number, distinct from the OS process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u32);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Control state of a live job.
///
/// Termination is not a state: a terminated job is removed from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Running, and the shell is waiting for it.
    ForegroundRunning,
    /// Running without the shell waiting.
    BackgroundRunning,
    /// Stopped by a signal (e.g., Ctrl-Z / SIGTSTP).
    Stopped,
}

impl JobState {
    /// Label used in the `jobs` listing.
    pub fn label(self) -> &'static str {
        match self {
            JobState::ForegroundRunning => "Foreground",
            JobState::BackgroundRunning => "Running",
            JobState::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Information about a job for listing.
///
/// Displays as one `jobs` line: `[<job_id>] (<pid>) <state-label> <command_text>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    /// Job ID.
    pub id: JobId,
    /// OS process ID (also the job's process group ID).
    pub pid: u32,
    /// Current state.
    pub state: JobState,
    /// Command line as the user typed it.
    pub command: String,
}

impl std::fmt::Display for JobInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] ({}) {} {}", self.id, self.pid, self.state, self.command)
    }
}
