//! Command-line tokenizer for the interactive shell.
//!
//! Splits one input line into arguments the way `redis-cli` does:
//!
//! - Arguments are separated by whitespace.
//! - Double quotes group an argument that may contain spaces; inside them
//!   `\n`, `\r`, `\t`, `\\`, `\"` and `\xHH` escapes are understood.
//! - Single quotes group verbatim text; only `\'` is an escape.
//! - A closing quote must be followed by whitespace or the end of the line.
//!
//! Arguments come back as [`Bytes`] since `\xHH` can produce any byte.

use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while tokenizing a line.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// A quoted argument was not closed before the end of the line
    #[error("unbalanced quotes")]
    UnbalancedQuotes,

    /// A closing quote was immediately followed by another character
    #[error("closing quote must be followed by a space")]
    TrailingAfterQuote,

    /// `\x` not followed by two hex digits
    #[error("invalid hex escape")]
    InvalidHexEscape,
}

/// Result type for tokenizing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Splits `line` into arguments.
///
/// # Example
/// ```
/// use shelfkv::protocol::tokenize;
///
/// let args = tokenize(r#"hset user:1 name "Ariz K""#).unwrap();
/// assert_eq!(args.len(), 4);
/// assert_eq!(&args[3][..], b"Ariz K");
/// ```
pub fn tokenize(line: &str) -> ParseResult<Vec<Bytes>> {
    let mut args = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            return Ok(args);
        };

        let mut arg = Vec::new();
        match first {
            '"' => {
                chars.next();
                read_double_quoted(&mut chars, &mut arg)?;
                expect_separator(&mut chars)?;
            }
            '\'' => {
                chars.next();
                read_single_quoted(&mut chars, &mut arg)?;
                expect_separator(&mut chars)?;
            }
            _ => {
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    push_char(&mut arg, c);
                }
            }
        }
        args.push(Bytes::from(arg));
    }
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

fn push_char(buf: &mut Vec<u8>, c: char) {
    let mut tmp = [0u8; 4];
    buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
}

fn read_double_quoted(chars: &mut Chars<'_>, arg: &mut Vec<u8>) -> ParseResult<()> {
    loop {
        match chars.next().ok_or(ParseError::UnbalancedQuotes)? {
            '"' => return Ok(()),
            '\\' => match chars.next().ok_or(ParseError::UnbalancedQuotes)? {
                'n' => arg.push(b'\n'),
                'r' => arg.push(b'\r'),
                't' => arg.push(b'\t'),
                'b' => arg.push(0x08),
                'a' => arg.push(0x07),
                'x' => arg.push(read_hex_byte(chars)?),
                other => push_char(arg, other),
            },
            c => push_char(arg, c),
        }
    }
}

fn read_single_quoted(chars: &mut Chars<'_>, arg: &mut Vec<u8>) -> ParseResult<()> {
    loop {
        match chars.next().ok_or(ParseError::UnbalancedQuotes)? {
            '\'' => return Ok(()),
            '\\' if chars.peek() == Some(&'\'') => {
                chars.next();
                arg.push(b'\'');
            }
            c => push_char(arg, c),
        }
    }
}

fn read_hex_byte(chars: &mut Chars<'_>) -> ParseResult<u8> {
    let high = chars.next().and_then(|c| c.to_digit(16));
    let low = chars.next().and_then(|c| c.to_digit(16));
    match (high, low) {
        (Some(high), Some(low)) => Ok((high * 16 + low) as u8),
        _ => Err(ParseError::InvalidHexEscape),
    }
}

fn expect_separator(chars: &mut Chars<'_>) -> ParseResult<()> {
    match chars.peek() {
        None => Ok(()),
        Some(c) if c.is_whitespace() => Ok(()),
        Some(_) => Err(ParseError::TrailingAfterQuote),
    }
}
