//! Pure data types for jobsh: job identity, control state and notice lines.
//!
//! This crate is a leaf dependency with no async runtime, no OS calls, no I/O.
//! Every line the shell prints about a job is a `Display` impl in here, so the
//! exact output formats live in one place and can be tested without processes.

pub mod job;
pub mod notice;

// Flat re-exports for convenience
pub use job::*;
pub use notice::*;
