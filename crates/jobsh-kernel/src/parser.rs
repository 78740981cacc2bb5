//! Command-line parser.
//!
//! A line is one simple command: words separated by whitespace, optionally
//! grouped with `'...'` or `"..."`, at most one `< file` and one `> file`, and
//! an optional trailing `&`. The first word decides the command kind.
//!
//! ```text
//! sort < in.txt > "out file" &
//! └─┬┘ └───┬──┘ └─────┬────┘ └ background
//!  argv  input     output
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// What the dispatcher should do with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `quit`
    Quit,
    /// `jobs`
    ListJobs,
    /// `bg <job>`
    Background,
    /// `fg <job>`
    Foreground,
    /// Anything else: run a program.
    External,
}

impl CommandKind {
    fn classify(name: &str) -> Self {
        match name {
            "quit" => CommandKind::Quit,
            "jobs" => CommandKind::ListJobs,
            "bg" => CommandKind::Background,
            "fg" => CommandKind::Foreground,
            _ => CommandKind::External,
        }
    }
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    /// Argument vector; never empty.
    pub argv: Vec<String>,
    /// File to read stdin from.
    pub input: Option<PathBuf>,
    /// File to write stdout to.
    pub output: Option<PathBuf>,
    /// Trailing `&`.
    pub background: bool,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unmatched {0} quote")]
    UnmatchedQuote(char),
    #[error("missing file name after '{0}'")]
    MissingRedirectTarget(char),
    #[error("ambiguous redirection: more than one '{0}'")]
    AmbiguousRedirect(char),
    #[error("missing command")]
    MissingCommand,
    #[error("command line contains a NUL byte")]
    NulByte,
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    Less,
    Greater,
    Amp,
}

fn tokenize(line: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    // `Some` once a word has started, even if it is an empty quoted string.
    let mut word: Option<String> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\0' => return Err(ParseError::NulByte),
            '\'' | '"' => {
                let current = word.get_or_insert_with(String::new);
                loop {
                    match chars.next() {
                        Some(q) if q == c => break,
                        Some('\0') => return Err(ParseError::NulByte),
                        Some(other) => current.push(other),
                        None => return Err(ParseError::UnmatchedQuote(c)),
                    }
                }
            }
            '<' | '>' | '&' => {
                tokens.extend(word.take().map(Token::Word));
                tokens.push(match c {
                    '<' => Token::Less,
                    '>' => Token::Greater,
                    _ => Token::Amp,
                });
            }
            c if c.is_whitespace() => tokens.extend(word.take().map(Token::Word)),
            c => word.get_or_insert_with(String::new).push(c),
        }
    }
    tokens.extend(word.take().map(Token::Word));
    Ok(tokens)
}

/// Parse one command line. Blank lines give `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let mut tokens = tokenize(line)?;
    if tokens.is_empty() {
        return Ok(None);
    }

    let background = tokens.last() == Some(&Token::Amp);
    if background {
        tokens.pop();
    }

    let mut argv = Vec::new();
    let mut input = None;
    let mut output = None;
    let mut tokens = tokens.into_iter();
    while let Some(token) = tokens.next() {
        let (slot, symbol) = match token {
            Token::Word(word) => {
                argv.push(word);
                continue;
            }
            // Only a trailing `&` means background; elsewhere it is literal.
            Token::Amp => {
                argv.push("&".to_string());
                continue;
            }
            Token::Less => (&mut input, '<'),
            Token::Greater => (&mut output, '>'),
        };
        let target = match tokens.next() {
            Some(Token::Word(path)) => PathBuf::from(path),
            _ => return Err(ParseError::MissingRedirectTarget(symbol)),
        };
        if slot.replace(target).is_some() {
            return Err(ParseError::AmbiguousRedirect(symbol));
        }
    }

    let kind = match argv.first() {
        Some(name) => CommandKind::classify(name),
        None => return Err(ParseError::MissingCommand),
    };
    Ok(Some(Command {
        kind,
        argv,
        input,
        output,
        background,
    }))
}
