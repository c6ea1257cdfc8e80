//! Rendering of decoded lines, one record per output line.

use serde::Serialize;

use crate::monitor::ParsedLine;
use crate::monitor::args::to_raw_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Tab-separated fields with control bytes escaped
    Tsv,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    timestamp: &'a str,
    db: &'a str,
    command: &'a str,
    args: Vec<String>,
    /// Indices of `args` that were not valid UTF-8 and are written escaped.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    escaped_args: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<&'a str>,
}

/// Render `line` in `format`. With `include_raw` the input line is added as a
/// `raw` field (JSON) or a last column (TSV).
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render(
    line: &ParsedLine,
    format: OutputFormat,
    include_raw: bool,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let mut escaped_args = Vec::new();
            let args = line
                .args()
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    utf8_value(a).unwrap_or_else(|| {
                        escaped_args.push(i);
                        escape_field(a)
                    })
                })
                .collect();
            let record = JsonRecord {
                timestamp: line.timestamp(),
                db: line.db_index(),
                command: line.command(),
                args,
                escaped_args,
                raw: include_raw.then(|| line.raw_line()),
            };
            Ok(serde_json::to_string(&record)?)
        }
        OutputFormat::Tsv => {
            let mut cols = vec![
                escape_field(line.timestamp()),
                escape_field(line.db_index()),
                escape_field(line.command()),
            ];
            cols.extend(line.args().iter().map(|a| escape_field(a)));
            if include_raw {
                cols.push(escape_field(line.raw_line().trim()));
            }
            Ok(cols.join("\t"))
        }
    }
}

/// The raw bytes behind a decoded value read as UTF-8, so `"caf\xc3\xa9"`
/// becomes `café`. `None` if the bytes are not valid UTF-8.
pub fn utf8_value(decoded: &str) -> Option<String> {
    if decoded.is_ascii() {
        return Some(decoded.to_string());
    }
    String::from_utf8(to_raw_bytes(decoded)).ok()
}

/// [`utf8_value`], falling back to the [`escape_field`] form.
pub fn text_value(decoded: &str) -> String {
    utf8_value(decoded).unwrap_or_else(|| escape_field(decoded))
}

/// Escape a decoded value so it fits in one TSV cell: backslash, tab and line
/// breaks get C-style escapes, other control chars and `\xHH`-range chars are
/// written back as `\xHH`.
pub fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if c.is_ascii_control() || ('\u{80}'..='\u{ff}').contains(&c) => {
                out.push_str(&format!("\\x{:02x}", u32::from(c)));
            }
            c => out.push(c),
        }
    }
    out
}
