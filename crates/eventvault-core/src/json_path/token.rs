//! Path expression tokens.

use std::fmt;

use crate::error::PathError;

/// One traversal step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// Step into an object member.
    Key(String),
    /// Step into an array element.
    Index(usize),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Parses `user.address[0].city` into `[Key(user), Key(address), Index(0),
/// Key(city)]`.
///
/// A path may start with an index (`[2].name`). Keys are any run of
/// characters other than `.`, `[` and `]`.
///
/// # Errors
///
/// Returns [`PathError::Malformed`] for empty paths, empty key segments, a
/// trailing `.`, unclosed or stray brackets, non-numeric indexes, and a key
/// that follows an index without a `.`.
pub fn extract_tokens(path: &str) -> Result<Vec<Token>, PathError> {
    let malformed = |reason: String| PathError::Malformed {
        path: path.to_owned(),
        reason,
    };
    if path.is_empty() {
        return Err(malformed("path is empty".to_owned()));
    }

    let mut tokens = Vec::new();
    let mut chars = path.char_indices().peekable();
    // True at the start of the path and right after a '.'.
    let mut expecting_key = true;

    while let Some((offset, c)) = chars.next() {
        match c {
            '.' => {
                if expecting_key {
                    return Err(malformed(format!("empty key at offset {offset}")));
                }
                expecting_key = true;
            }
            '[' => {
                if expecting_key && offset != 0 {
                    return Err(malformed(format!("missing key before '[' at offset {offset}")));
                }
                let mut digits = String::new();
                let mut closed = false;
                for (_, d) in chars.by_ref() {
                    if d == ']' {
                        closed = true;
                        break;
                    }
                    digits.push(d);
                }
                if !closed {
                    return Err(malformed(format!("unclosed '[' at offset {offset}")));
                }
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed(format!(
                        "invalid array index '{digits}' at offset {offset}"
                    )));
                }
                let index = digits.parse().map_err(|_| {
                    malformed(format!("array index '{digits}' at offset {offset} is too large"))
                })?;
                tokens.push(Token::Index(index));
                expecting_key = false;
            }
            ']' => return Err(malformed(format!("unexpected ']' at offset {offset}"))),
            _ => {
                if !expecting_key {
                    return Err(malformed(format!("expected '.' or '[' at offset {offset}")));
                }
                let mut key = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if matches!(next, '.' | '[' | ']') {
                        break;
                    }
                    key.push(next);
                    chars.next();
                }
                tokens.push(Token::Key(key));
                expecting_key = false;
            }
        }
    }

    if expecting_key {
        return Err(malformed("path ends with '.'".to_owned()));
    }
    Ok(tokens)
}
