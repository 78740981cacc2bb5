//! Real processes: fork/execve, waitpid and killpg through nix.

use std::ffi::{c_char, CString};
use std::os::fd::AsFd;
use std::os::unix::ffi::OsStrExt;

use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{self, SigHandler, SigSet, SigmaskHow, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, setpgid, write, ForkResult, Pid};

use super::{ChildEvent, Launch, ProcessBackend};
use crate::error::{ShellError, ShellResult};
use crate::guard::guarded_set;

/// Signals whose shell disposition must not leak into a new program.
const CHILD_DEFAULTS: [Signal; 7] = [
    Signal::SIGINT,
    Signal::SIGTSTP,
    Signal::SIGCHLD,
    Signal::SIGQUIT,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
    // Ignored by the Rust runtime at startup.
    Signal::SIGPIPE,
];

/// Backend that creates and controls real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl SystemProcesses {
    pub fn new() -> Self {
        Self
    }
}

/// A launch turned into C strings, built before fork so the child never allocates.
struct Prepared {
    program: CString,
    argv: Vec<CString>,
    env: Vec<CString>,
    not_found: Vec<u8>,
    failure_prefix: Vec<u8>,
}

impl Prepared {
    fn new(launch: &Launch) -> ShellResult<Self> {
        let argv = launch
            .argv
            .iter()
            .map(|arg| c_string(arg.as_bytes().to_vec()))
            .collect::<ShellResult<Vec<_>>>()?;

        // An environment entry can't hold NUL; skip any that somehow does.
        let env = launch
            .env
            .iter()
            .filter_map(|(key, value)| {
                let mut entry = key.as_bytes().to_vec();
                entry.push(b'=');
                entry.extend_from_slice(value.as_bytes());
                CString::new(entry).ok()
            })
            .collect();

        let name = launch.name();
        Ok(Self {
            program: c_string(launch.program.as_bytes().to_vec())?,
            argv,
            env,
            not_found: format!("{}: Command not found\n", name).into_bytes(),
            failure_prefix: format!("{}: ", name).into_bytes(),
        })
    }
}

fn c_string(bytes: Vec<u8>) -> ShellResult<CString> {
    CString::new(bytes).map_err(|e| ShellError::Io(e.into()))
}

fn null_terminated(strings: &[CString]) -> Vec<*const c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

/// Child side of spawn. Only async-signal-safe calls from here on.
fn exec_child(
    prepared: &Prepared,
    argv: &[*const c_char],
    envp: &[*const c_char],
    unblock: &SigSet,
) -> ! {
    let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
    for sig in CHILD_DEFAULTS {
        // SAFETY: SIG_DFL installs no handler code.
        let _ = unsafe { signal::signal(sig, SigHandler::SigDfl) };
    }
    let _ = signal::sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(unblock), None);

    // SAFETY: every pointer refers to a NUL-terminated string owned by
    // `prepared`, and both arrays end in a null pointer.
    unsafe { libc::execve(prepared.program.as_ptr(), argv.as_ptr(), envp.as_ptr()) };

    let errno = Errno::last();
    let stderr = std::io::stderr();
    let fd = stderr.as_fd();
    if errno == Errno::ENOENT {
        let _ = write(fd, &prepared.not_found);
    } else {
        let _ = write(fd, &prepared.failure_prefix);
        let _ = write(fd, errno.desc().as_bytes());
        let _ = write(fd, b"\n");
    }
    // SAFETY: _exit skips atexit handlers and stdio flushing, neither of
    // which is safe in a forked child.
    unsafe { libc::_exit(1) }
}

impl ProcessBackend for SystemProcesses {
    fn spawn(&mut self, launch: &Launch) -> ShellResult<Pid> {
        let prepared = Prepared::new(launch)?;
        let argv = null_terminated(&prepared.argv);
        let envp = null_terminated(&prepared.env);
        let unblock = guarded_set();

        // SAFETY: the child runs only async-signal-safe code (exec_child)
        // and never returns into Rust code that might allocate or lock.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => exec_child(&prepared, &argv, &envp, &unblock),
            Ok(ForkResult::Parent { child }) => {
                // Both sides set the group; whichever runs second is a no-op.
                // EACCES means the child already exec'd with its group set.
                if let Err(e) = setpgid(child, child) {
                    if e != Errno::EACCES {
                        tracing::debug!(%child, "setpgid in parent failed: {}", e);
                    }
                }
                tracing::debug!(%child, program = %launch.program, "spawned");
                Ok(child)
            }
            Err(e) => Err(ShellError::Fork(e)),
        }
    }

    fn poll_changed(&mut self) -> ShellResult<Option<ChildEvent>> {
        let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED;
        loop {
            match waitpid(Pid::from_raw(-1), Some(flags)) {
                Ok(WaitStatus::Exited(pid, code)) => {
                    return Ok(Some(ChildEvent::Exited { pid, code }));
                }
                Ok(WaitStatus::Signaled(pid, signal, _)) => {
                    return Ok(Some(ChildEvent::Signaled { pid, signal }));
                }
                Ok(WaitStatus::Stopped(pid, signal)) => {
                    return Ok(Some(ChildEvent::Stopped { pid, signal }));
                }
                Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => return Ok(None),
                Ok(other) => {
                    tracing::debug!(?other, "ignoring wait status");
                }
                Err(Errno::EINTR) => {
                    tracing::warn!("waitpid interrupted, retrying");
                }
                Err(e) => return Err(ShellError::Wait(e)),
            }
        }
    }

    fn signal_group(&mut self, pgid: Pid, signal: Signal) -> nix::Result<()> {
        signal::killpg(pgid, signal)
    }
}
