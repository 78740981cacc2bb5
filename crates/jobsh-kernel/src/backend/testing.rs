//! Test utilities for the backend module.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use nix::sys::signal::Signal;
use nix::unistd::Pid;

use super::{ChildEvent, Launch, ProcessBackend};
use crate::error::{ShellError, ShellResult};

/// First pid handed out by the mock.
pub const FIRST_MOCK_PID: i32 = 1000;

#[derive(Debug, Default)]
struct MockState {
    next_pid: i32,
    spawned: Vec<Vec<String>>,
    signals: Vec<(Pid, Signal)>,
    events: VecDeque<ChildEvent>,
    fail_spawn: bool,
}

/// Backend that never touches the OS.
///
/// Spawned children get pids 1000, 1001, ... and never change state on
/// their own; tests push the events the reaper should see.
pub struct MockProcesses {
    state: Arc<Mutex<MockState>>,
}

/// Test-side view of a [`MockProcesses`].
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockProcesses {
    pub fn new() -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState {
            next_pid: FIRST_MOCK_PID,
            ..MockState::default()
        }));
        (
            Self {
                state: state.clone(),
            },
            MockHandle { state },
        )
    }
}

impl MockHandle {
    /// Queue a child event for the next `poll_changed` calls.
    pub fn push_event(&self, event: ChildEvent) {
        self.state.lock().unwrap().events.push_back(event);
    }

    /// Events not yet collected.
    pub fn pending_events(&self) -> usize {
        self.state.lock().unwrap().events.len()
    }

    /// Argument vectors of every spawn, in order.
    pub fn spawned(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().spawned.clone()
    }

    /// Every group signal sent, in order.
    pub fn signals(&self) -> Vec<(Pid, Signal)> {
        self.state.lock().unwrap().signals.clone()
    }

    /// Make the next spawn fail like a failed fork.
    pub fn fail_next_spawn(&self) {
        self.state.lock().unwrap().fail_spawn = true;
    }
}

impl ProcessBackend for MockProcesses {
    fn spawn(&mut self, launch: &Launch) -> ShellResult<Pid> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_spawn) {
            return Err(ShellError::Fork(nix::errno::Errno::EAGAIN));
        }
        let pid = Pid::from_raw(state.next_pid);
        state.next_pid += 1;
        state.spawned.push(launch.argv.clone());
        Ok(pid)
    }

    fn poll_changed(&mut self) -> ShellResult<Option<ChildEvent>> {
        Ok(self.state.lock().unwrap().events.pop_front())
    }

    fn signal_group(&mut self, pgid: Pid, signal: Signal) -> nix::Result<()> {
        self.state.lock().unwrap().signals.push((pgid, signal));
        Ok(())
    }
}
