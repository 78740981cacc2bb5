//! ProcessBackend trait: the OS interactions the engine depends on.
//!
//! The engine never calls fork, waitpid or killpg directly. It goes through
//! this trait so the reaper, dispatcher and resolver can be driven by scripted
//! child events in tests.
//!
//! - `SystemProcesses`: real processes via nix
//! - `MockProcesses` (tests): sequential pids, recorded signals, scripted events

mod system;

pub use system::SystemProcesses;

#[cfg(test)]
pub mod testing;

#[cfg(test)]
pub use testing::{MockHandle, MockProcesses};

use std::ffi::OsString;
use std::path::Path;

use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::error::ShellResult;

/// A change in some child's state, as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildEvent {
    /// Exited normally with a status code.
    Exited { pid: Pid, code: i32 },
    /// Killed by an uncaught signal.
    Signaled { pid: Pid, signal: Signal },
    /// Stopped by a signal.
    Stopped { pid: Pid, signal: Signal },
}

impl ChildEvent {
    pub fn pid(&self) -> Pid {
        match *self {
            ChildEvent::Exited { pid, .. }
            | ChildEvent::Signaled { pid, .. }
            | ChildEvent::Stopped { pid, .. } => pid,
        }
    }
}

/// Everything needed to start an external program.
#[derive(Debug, Clone)]
pub struct Launch {
    /// Path handed to execve.
    pub program: String,
    /// Argument vector, `argv[0]` as typed.
    pub argv: Vec<String>,
    /// Environment passed to the new image.
    pub env: Vec<(OsString, OsString)>,
}

impl Launch {
    /// Prepare a launch of `argv` with the shell's current environment.
    ///
    /// A bare command name is looked up in `$PATH`; a name containing `/` is
    /// used as is. An unresolved name is kept unchanged so exec reports it.
    pub fn new(argv: Vec<String>) -> Self {
        let name = argv.first().cloned().unwrap_or_default();
        let program = if name.contains('/') {
            name
        } else {
            std::env::var("PATH")
                .ok()
                .and_then(|path| resolve_in_path(&name, &path))
                .unwrap_or(name)
        };
        Self {
            program,
            argv,
            env: std::env::vars_os().collect(),
        }
    }

    /// The command name as typed.
    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }
}

/// Search a `PATH`-style list for an executable file called `name`.
pub fn resolve_in_path(name: &str, path_var: &str) -> Option<String> {
    use std::os::unix::fs::PermissionsExt;

    if name.is_empty() {
        return None;
    }
    for dir in path_var.split(':') {
        if dir.is_empty() {
            continue;
        }

        let full_path = format!("{}/{}", dir, name);
        let path = Path::new(&full_path);
        if !path.is_file() {
            continue;
        }
        if let Ok(metadata) = path.metadata() {
            if metadata.permissions().mode() & 0o111 != 0 {
                return Some(full_path);
            }
        }
    }

    None
}

/// Process creation, status polling and group signalling.
pub trait ProcessBackend: Send {
    /// Start `launch` as the leader of a new process group.
    ///
    /// Called with the guarded signals blocked. The child resets its
    /// dispositions and mask before exec; exec failure only kills the child.
    fn spawn(&mut self, launch: &Launch) -> ShellResult<Pid>;

    /// Collect one changed child without blocking, or `None` if there is none.
    fn poll_changed(&mut self) -> ShellResult<Option<ChildEvent>>;

    /// Deliver `signal` to every process in group `pgid`.
    fn signal_group(&mut self, pgid: Pid, signal: Signal) -> nix::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_sh_in_path() {
        let resolved = resolve_in_path("sh", "/nonexistent:/bin:/usr/bin").unwrap();
        assert!(resolved.ends_with("/sh"), "got {resolved}");
    }

    #[test]
    fn unresolved_name_is_none() {
        assert!(resolve_in_path("definitely-not-a-command-xyz", "/bin:/usr/bin").is_none());
        assert!(resolve_in_path("sh", "").is_none());
    }

    #[test]
    fn launch_keeps_slashed_paths() {
        let launch = Launch::new(vec!["./a.out".to_string(), "x".to_string()]);
        assert_eq!(launch.program, "./a.out");
        assert_eq!(launch.name(), "./a.out");
    }

    #[test]
    fn launch_keeps_unknown_names() {
        let launch = Launch::new(vec!["definitely-not-a-command-xyz".to_string()]);
        assert_eq!(launch.program, "definitely-not-a-command-xyz");
    }

    #[test]
    fn event_pid() {
        let pid = Pid::from_raw(42);
        assert_eq!(ChildEvent::Exited { pid, code: 0 }.pid(), pid);
        assert_eq!(ChildEvent::Stopped { pid, signal: Signal::SIGTSTP }.pid(), pid);
    }
}
