//! Tokenizer for the argument blob that follows the command.
//!
//! The server renders every argument as a double-quoted string with
//! non-printable bytes escaped (`\"`, `\\`, `\n`, `\r`, `\t`, `\a`, `\b`,
//! `\xHH`). Decoding reverses that rendering one token at a time.

use crate::config::UnquotedArgs;

use super::DecodeError;

const QUOTE: char = '"';
const ESCAPE: char = '\\';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BetweenTokens,
    InToken,
}

/// Split `blob` into its unescaped arguments, in source order.
///
/// An empty blob yields an empty vector. A token left open at the end of the
/// blob is kept if it has content.
///
/// # Errors
///
/// - [`DecodeError::MalformedEscape`] if the blob ends in a lone backslash.
/// - [`DecodeError::UnquotedArgument`] if a token does not open with a quote
///   and `policy` is [`UnquotedArgs::Reject`].
pub fn tokenize(blob: &str, policy: UnquotedArgs) -> Result<Vec<String>, DecodeError> {
    let mut args = Vec::new();
    let mut buf = String::new();
    let mut state = State::BetweenTokens;
    let mut chars = blob.chars();

    while let Some(c) = chars.next() {
        if state == State::BetweenTokens {
            if c.is_whitespace() {
                continue;
            }
            if c == QUOTE {
                state = State::InToken;
                continue;
            }
            if c == ESCAPE && chars.as_str().is_empty() {
                return Err(DecodeError::MalformedEscape {
                    offset: blob.len() - 1,
                });
            }
            match policy {
                UnquotedArgs::Reject => {
                    let offset = blob.len() - chars.as_str().len() - c.len_utf8();
                    return Err(DecodeError::UnquotedArgument { offset });
                }
                UnquotedArgs::Lenient => state = State::InToken,
            }
        }

        match c {
            ESCAPE => {
                let rest = chars.as_str();
                let Some((decoded, used)) = decode_escape(rest) else {
                    return Err(DecodeError::MalformedEscape {
                        offset: blob.len() - rest.len() - 1,
                    });
                };
                buf.push(decoded);
                chars = rest.get(used..).unwrap_or_default().chars();
            }
            QUOTE => {
                args.push(std::mem::take(&mut buf));
                state = State::BetweenTokens;
            }
            other => buf.push(other),
        }
    }

    if state == State::InToken && !buf.is_empty() {
        args.push(buf);
    }
    Ok(args)
}

/// Decode the escape whose body starts at `rest` (the backslash is already
/// consumed). Returns the decoded char and how many bytes of `rest` it used,
/// or `None` if there is nothing left to escape.
///
/// `\xHH` takes precedence and always consumes exactly three bytes; a `\x`
/// without two hex digits after it decodes to a plain `x`.
fn decode_escape(rest: &str) -> Option<(char, usize)> {
    let c = rest.chars().next()?;
    if c == 'x'
        && let Some(byte) = rest.get(1..3).and_then(hex_byte)
    {
        return Some((char::from(byte), 3));
    }
    let decoded = match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'a' => '\u{07}',
        'b' => '\u{08}',
        other => other,
    };
    Some((decoded, c.len_utf8()))
}

fn hex_byte(digits: &str) -> Option<u8> {
    if digits.len() == 2 && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        u8::from_str_radix(digits, 16).ok()
    } else {
        None
    }
}

/// Raw bytes a decoded argument stands for.
///
/// Chars up to `U+00FF` (which is where `\xHH` escapes land) become one byte
/// each; anything wider is kept as its UTF-8 encoding.
pub fn to_raw_bytes(decoded: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(decoded.len());
    for c in decoded.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(b) => out.push(b),
            Err(_) => {
                let mut tmp = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
            }
        }
    }
    out
}
