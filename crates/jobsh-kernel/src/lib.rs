//! jobsh-kernel: the job-control engine of jobsh.
//!
//! This crate provides:
//!
//! - **Table**: the bounded job table and job id allocation
//! - **Guard**: scoped blocking of SIGCHLD, SIGINT and SIGTSTP
//! - **Notify**: signals turned into messages for the control thread
//! - **Control**: guarded access to jobs and the foreground wait
//! - **Reaper / Forward**: the SIGCHLD and SIGINT/SIGTSTP handlers
//! - **Resolve**: the `bg` and `fg` builtins
//! - **Shell**: the command evaluator tying it together
//! - **Parser / Redirect / Backend / Console**: command lines, stream
//!   redirection, process creation, and output

pub mod backend;
pub mod config;
pub mod console;
pub mod control;
pub mod error;
mod forward;
pub mod guard;
pub mod notify;
pub mod parser;
mod reaper;
pub mod redirect;
pub mod resolve;
pub mod shell;
pub mod table;

pub use backend::{ChildEvent, Launch, ProcessBackend, SystemProcesses};
pub use config::ShellConfig;
pub use console::Console;
pub use control::{Blocked, Flow, JobControl};
pub use error::{ShellError, ShellResult};
pub use notify::{ignore_terminal_stops, Notification, Notifications};
pub use shell::Shell;
pub use table::JobTable;
