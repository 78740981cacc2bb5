//! Interactive read/eval loop for jobsh.
//!
//! Lines are read on a dedicated input thread, one line per request, so
//! nothing touches stdin while a command runs. The control thread is a
//! current-thread tokio runtime that waits on whichever comes first: the
//! requested line or an asynchronous notification. Background jobs are thus
//! reported while the shell sits at the prompt.
//!
//! On a terminal, lines come from rustyline with persistent history; otherwise
//! they are read from buffered stdin, printing the prompt unless disabled.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tokio::sync::mpsc;

use jobsh_kernel::{ignore_terminal_stops, Flow, Notification, Shell, ShellConfig, ShellResult};

/// What the input side produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A command line, possibly still ending in a newline.
    Line(String),
    /// Ctrl-C while editing a line.
    Interrupted,
    /// End of input.
    Eof,
}

/// The line source, owned by the input thread.
enum LineReader {
    Editor {
        editor: Editor<(), DefaultHistory>,
        prompt: String,
        history: Option<PathBuf>,
    },
    Plain {
        prompt: Option<String>,
    },
}

impl LineReader {
    fn open(config: &ShellConfig, terminal: bool) -> Result<Self> {
        if !terminal {
            return Ok(LineReader::Plain {
                prompt: config.emit_prompt.then(|| config.prompt.clone()),
            });
        }

        let mut editor: Editor<(), DefaultHistory> =
            Editor::new().context("Failed to create editor")?;
        let history = if config.history { history_path() } else { None };
        if let Some(ref path) = history {
            if let Err(e) = editor.load_history(path) {
                // Expected on first run
                let is_not_found = matches!(&e, ReadlineError::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound);
                if !is_not_found {
                    tracing::warn!("Failed to load history: {}", e);
                }
            }
        }

        let prompt = if config.emit_prompt {
            config.prompt.clone()
        } else {
            String::new()
        };
        Ok(LineReader::Editor {
            editor,
            prompt,
            history,
        })
    }

    fn read(&mut self) -> Result<Input> {
        match self {
            LineReader::Editor { editor, prompt, .. } => match editor.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        if let Err(e) = editor.add_history_entry(line.as_str()) {
                            tracing::warn!("Failed to add history entry: {}", e);
                        }
                    }
                    Ok(Input::Line(line))
                }
                Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
                Err(ReadlineError::Eof) => Ok(Input::Eof),
                Err(e) => Err(e).context("Failed to read line"),
            },
            LineReader::Plain { prompt } => {
                if let Some(prompt) = prompt {
                    let mut out = io::stdout().lock();
                    out.write_all(prompt.as_bytes())?;
                    out.flush()?;
                }
                let mut line = String::new();
                let read = io::stdin()
                    .lock()
                    .read_line(&mut line)
                    .context("Failed to read line")?;
                Ok(if read == 0 { Input::Eof } else { Input::Line(line) })
            }
        }
    }

    fn save_history(&mut self) {
        let LineReader::Editor {
            editor,
            history: Some(path),
            ..
        } = self
        else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create history directory: {}", e);
            }
        }
        if let Err(e) = editor.save_history(&*path) {
            tracing::warn!("Failed to save history: {}", e);
        }
    }
}

/// `$XDG_DATA_HOME/jobsh/history.txt` or the platform equivalent.
fn history_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.data_dir().join("jobsh").join("history.txt"))
}

/// Handle to the input thread.
pub struct Lines {
    requests: Option<std_mpsc::Sender<()>>,
    lines: mpsc::UnboundedReceiver<Result<Input>>,
    thread: Option<JoinHandle<()>>,
    /// A line was requested and not yet received.
    pending: bool,
}

impl Lines {
    /// Start the input thread reading from stdin.
    pub fn spawn(config: &ShellConfig) -> Result<Self> {
        let config = config.clone();
        let terminal = io::stdin().is_terminal();
        let (request_tx, request_rx) = std_mpsc::channel::<()>();
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<()>>();

        let thread = std::thread::Builder::new()
            .name("jobsh-input".to_string())
            .spawn(move || {
                let mut reader = match LineReader::open(&config, terminal) {
                    Ok(reader) => {
                        let _ = ready_tx.send(Ok(()));
                        reader
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                while request_rx.recv().is_ok() {
                    if line_tx.send(reader.read()).is_err() {
                        break;
                    }
                }
                reader.save_history();
            })
            .context("Failed to start input thread")?;

        ready_rx
            .recv()
            .context("Input thread exited during startup")??;

        Ok(Self {
            requests: Some(request_tx),
            lines: line_rx,
            thread: Some(thread),
            pending: false,
        })
    }

    /// Wait for the next line, requesting one if none is in flight.
    ///
    /// Cancel safe: if this future is dropped, the line still arrives on the
    /// next call.
    pub async fn next(&mut self) -> Result<Input> {
        if !self.pending {
            self.requests
                .as_ref()
                .context("Input already closed")?
                .send(())
                .context("Input thread is gone")?;
            self.pending = true;
        }
        let input = self.lines.recv().await.context("Input thread is gone")?;
        self.pending = false;
        input
    }

    /// Stop the input thread, saving history if it is idle.
    ///
    /// A thread blocked in a read is left behind; it dies with the process.
    pub fn close(mut self) {
        self.requests.take();
        if self.pending {
            return;
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("input thread panicked");
            }
        }
    }
}

#[derive(Debug)]
enum Event {
    Input(Result<Input>),
    Notification(ShellResult<Notification>),
}

/// Wait for a notification or the next line, notifications first.
///
/// A queued keyboard signal belongs to the idle shell, not to the command
/// on a line that is ready at the same time.
async fn next_event(shell: &mut Shell, input: impl Future<Output = Result<Input>>) -> Event {
    tokio::select! {
        biased;
        notification = shell.next_notification() => Event::Notification(notification),
        input = input => Event::Input(input),
    }
}

/// Run the shell until `quit`, end of input, or SIGQUIT. Returns the exit status.
pub fn run(config: ShellConfig) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create runtime")?;
    runtime.block_on(repl(config))
}

async fn repl(config: ShellConfig) -> Result<i32> {
    ignore_terminal_stops().context("Failed to ignore terminal stop signals")?;
    // Take over the signals before the input thread exists.
    let mut shell = Shell::system(config.clone()).context("Failed to start shell")?;
    let mut lines = Lines::spawn(&config)?;

    let code = loop {
        let event = next_event(&mut shell, lines.next()).await;

        let flow = match event {
            Event::Notification(notification) => shell.handle(notification?)?,
            Event::Input(input) => match input? {
                Input::Line(line) => shell.eval(&line).await?,
                Input::Interrupted => {
                    println!("^C");
                    Flow::Continue
                }
                Input::Eof => {
                    println!();
                    Flow::Exit(0)
                }
            },
        };

        if let Flow::Exit(code) = flow {
            break code;
        }
    };

    io::stdout().flush()?;
    lines.close();
    Ok(code)
}
