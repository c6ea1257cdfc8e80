//! Decoding of `MONITOR` output lines.
//!
//! A line is split into its top-level fields by [`fields::split`], then the
//! argument blob is unescaped by [`args::tokenize`]. Both stages are pure;
//! the compiled line grammar is the only shared state and is read-only.

pub mod args;
pub mod fields;

use crate::config::ParserConfig;

/// Why a line could not be decoded.
///
/// Callers that only need "record or nothing" use [`Parser::parse`], which
/// folds every variant into `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The line does not match the monitor line grammar.
    Unrecognized,
    /// The argument blob ends in a backslash with nothing to escape.
    MalformedEscape { offset: usize },
    /// An argument token does not open with a quote.
    UnquotedArgument { offset: usize },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unrecognized => f.write_str("not a monitor line"),
            Self::MalformedEscape { offset } => {
                write!(f, "dangling escape at argument offset {offset}")
            }
            Self::UnquotedArgument { offset } => {
                write!(f, "unquoted argument at argument offset {offset}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// One decoded monitor line. Built only by a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    raw_line: String,
    timestamp: String,
    db_index: String,
    command: String,
    args: Vec<String>,
}

impl ParsedLine {
    /// The input line exactly as given, before trimming.
    pub fn raw_line(&self) -> &str {
        &self.raw_line
    }

    /// `seconds.microseconds`, as written by the server.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn db_index(&self) -> &str {
        &self.db_index
    }

    /// Command name without quotes.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Unescaped arguments in source order. Empty when the command had none.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Raw bytes of argument `index`, with `\xHH` escapes as single bytes.
    pub fn arg_bytes(&self, index: usize) -> Option<Vec<u8>> {
        self.args.get(index).map(|a| args::to_raw_bytes(a))
    }

    /// Split the timestamp into whole seconds and microseconds.
    ///
    /// The fraction is read as a decimal fraction of a second, so `.5` is
    /// 500000 microseconds. Returns `None` if the timestamp has more than one
    /// dot, more than six fractional digits, or a part that does not fit.
    pub fn timestamp_parts(&self) -> Option<(u64, u32)> {
        let Some((secs, frac)) = self.timestamp.split_once('.') else {
            return Some((self.timestamp.parse().ok()?, 0));
        };
        if frac.len() > 6 || frac.contains('.') {
            return None;
        }
        let micros = if frac.is_empty() {
            0
        } else {
            let scale = 10u32.pow(6 - u32::try_from(frac.len()).ok()?);
            frac.parse::<u32>().ok()? * scale
        };
        Some((secs.parse().ok()?, micros))
    }
}

/// Line decoder with its configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    pub const fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Decode `line`, or `None` if it is not a well-formed monitor line.
    pub fn parse(&self, line: &str) -> Option<ParsedLine> {
        self.decode(line).ok()
    }

    /// Decode `line`, reporting why it was rejected.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the line does not match the grammar or its
    /// argument blob cannot be tokenized under the configured policy.
    pub fn decode(&self, line: &str) -> Result<ParsedLine, DecodeError> {
        let fields = fields::split(line).ok_or(DecodeError::Unrecognized)?;
        let args = args::tokenize(fields.args, self.config.unquoted_args)?
            .into_iter()
            .map(|a| self.config.args_case.apply(a))
            .collect();
        Ok(ParsedLine {
            raw_line: line.to_string(),
            timestamp: fields.timestamp.to_string(),
            db_index: fields.db.to_string(),
            command: self
                .config
                .command_case
                .apply(fields.command_unquoted().to_string()),
            args,
        })
    }
}

/// Decode `line` with the default configuration.
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    Parser::default().parse(line)
}
