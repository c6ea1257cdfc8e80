//! Top-level grammar of a monitor line.
//!
//! ```text
//! 1424186956.633238 [0 127.0.0.1:60475] "MGET" "KEY1" "KEY2"
//! └─ timestamp ───┘  │ └─ address ───┘  └cmd┘ └─ args ────┘
//!                    db
//! ```

use std::sync::LazyLock;

use regex::Regex;

/// Whole-line grammar. The command must be a quoted run of word characters;
/// the address is any non-space token, so `[::]:6379` style IPv6 clients match.
const LINE_PATTERN: &str =
    r#"^(?P<timestamp>[0-9.]+)\s\[(?P<db>[0-9]+)\s\S+\]\s(?P<command>"\w+")(?:\s(?P<args>.*))?$"#;

static LINE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(LINE_PATTERN).ok());

/// Raw substrings of a recognized line, borrowed from the trimmed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields<'a> {
    pub timestamp: &'a str,
    pub db: &'a str,
    /// Command token including its surrounding quotes.
    pub command: &'a str,
    /// Everything after the command; empty when the command has no arguments.
    pub args: &'a str,
}

impl<'a> Fields<'a> {
    /// Command token without its surrounding quotes.
    pub fn command_unquoted(&self) -> &'a str {
        self.command.trim_matches('"')
    }
}

/// Split `line` into its top-level fields. Leading and trailing whitespace is
/// ignored. Returns `None` if the line does not match the grammar as a whole.
pub fn split(line: &str) -> Option<Fields<'_>> {
    let re = LINE_RE.as_ref()?;
    let caps = re.captures(line.trim())?;
    Some(Fields {
        timestamp: caps.name("timestamp")?.as_str(),
        db: caps.name("db")?.as_str(),
        command: caps.name("command")?.as_str(),
        args: caps.name("args").map_or("", |m| m.as_str()),
    })
}
