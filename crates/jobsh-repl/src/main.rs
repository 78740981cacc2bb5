//! jobsh CLI entry point.
//!
//! Usage:
//!   jobsh            # Interactive shell
//!   jobsh -p         # No prompt (for scripted input)
//!   jobsh -v         # Verbose job bookkeeping on stderr

use std::env;
use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jobsh_kernel::ShellConfig;

/// Flags accepted on the command line.
#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    help: bool,
    version: bool,
    verbose: bool,
    no_prompt: bool,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    for arg in args {
        match arg.as_str() {
            "--help" => options.help = true,
            "--version" => options.version = true,
            flags if flags.starts_with('-') && flags.len() > 1 && !flags.starts_with("--") => {
                for flag in flags[1..].chars() {
                    match flag {
                        'h' => options.help = true,
                        'v' => options.verbose = true,
                        'p' => options.no_prompt = true,
                        'V' => options.version = true,
                        _ => return Err(format!("-{flag}")),
                    }
                }
            }
            other => return Err(other.to_string()),
        }
    }
    Ok(options)
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(unknown) => {
            eprintln!("Unknown option: {unknown}");
            eprint!("{}", usage());
            return ExitCode::FAILURE;
        }
    };

    if options.help {
        print!("{}", usage());
        return ExitCode::SUCCESS;
    }
    if options.version {
        println!(
            "jobsh {} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("JOBSH_GIT_HASH"),
            env!("JOBSH_BUILD_DATE")
        );
        return ExitCode::SUCCESS;
    }

    // RUST_LOG wins; otherwise -v turns on job bookkeeping traces.
    let default_level = if options.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(&options) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(options: &Options) -> Result<i32> {
    let base = if std::io::stdin().is_terminal() {
        ShellConfig::interactive()
    } else {
        ShellConfig::default()
    };
    jobsh_repl::run(base.with_emit_prompt(!options.no_prompt))
}

fn usage() -> String {
    format!(
        r#"jobsh v{} - a job-control shell

Usage: jobsh [-hvp]

Options:
  -h, --help       Show this help
  -v               Print job bookkeeping diagnostics on stderr
  -p               Do not print a prompt
  -V, --version    Show version

Builtins:
  quit             Exit the shell
  jobs             List running and stopped jobs
  bg <job>         Continue a stopped job in the background
  fg <job>         Continue a stopped job in the foreground
                   <job> is %<job id> or a process id

Append & to run a command in the background; use < and > to redirect.
"#,
        env!("CARGO_PKG_VERSION")
    )
}
