//! Shell configuration.

/// Default prompt.
pub const DEFAULT_PROMPT: &str = "jobsh> ";

/// Default job table capacity.
pub const DEFAULT_MAX_JOBS: usize = 16;

/// Default largest job id before ids wrap back to 1.
pub const DEFAULT_MAX_JOB_ID: u32 = 1 << 16;

/// Configuration for a shell instance.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Prompt printed before each command line.
    pub prompt: String,

    /// Whether to print the prompt at all (`-p` turns it off).
    pub emit_prompt: bool,

    /// Job table capacity. Launching past it is fatal.
    pub max_jobs: usize,

    /// Largest job id handed out before wrapping back to 1.
    pub max_job_id: u32,

    /// Persist line-editor history between sessions.
    ///
    /// Only meaningful when input is a terminal.
    pub history: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            emit_prompt: true,
            max_jobs: DEFAULT_MAX_JOBS,
            max_job_id: DEFAULT_MAX_JOB_ID,
            history: false,
        }
    }
}

impl ShellConfig {
    /// Config for a human at a terminal: prompt and history on.
    pub fn interactive() -> Self {
        Self {
            history: true,
            ..Self::default()
        }
    }

    /// Config for scripted input: no prompt, no history.
    pub fn batch() -> Self {
        Self {
            emit_prompt: false,
            ..Self::default()
        }
    }

    /// Enable or disable prompt printing.
    pub fn with_emit_prompt(mut self, emit: bool) -> Self {
        self.emit_prompt = emit;
        self
    }

    /// Set the job table capacity.
    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }
}
