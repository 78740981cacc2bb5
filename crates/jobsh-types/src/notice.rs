//! Lines the shell prints about job lifecycle events.

use crate::job::JobId;

/// A one-line, already-formatted message about a job.
///
/// Rendered without the trailing newline; the console appends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A job now runs in the background: `[<job_id>] (<pid>) <command_text>`.
    Background { id: JobId, pid: u32, command: String },
    /// A job died from an uncaught signal.
    Terminated { id: JobId, pid: u32, signal: i32 },
    /// A job was stopped by a signal.
    Stopped { id: JobId, pid: u32, signal: i32 },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Background { id, pid, command } => write!(f, "[{}] ({}) {}", id, pid, command),
            Notice::Terminated { id, pid, signal } => {
                write!(f, "Job [{}] ({}) terminated by signal {}", id, pid, signal)
            }
            Notice::Stopped { id, pid, signal } => {
                write!(f, "Job [{}] ({}) stopped by signal {}", id, pid, signal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_announcement() {
        let notice = Notice::Background {
            id: JobId(1),
            pid: 100,
            command: "sleep 5 &".to_string(),
        };
        assert_eq!(notice.to_string(), "[1] (100) sleep 5 &");
    }

    #[test]
    fn terminated_and_stopped() {
        let dead = Notice::Terminated { id: JobId(3), pid: 77, signal: 2 };
        let stopped = Notice::Stopped { id: JobId(3), pid: 77, signal: 20 };
        assert_eq!(dead.to_string(), "Job [3] (77) terminated by signal 2");
        assert_eq!(stopped.to_string(), "Job [3] (77) stopped by signal 20");
    }
}
