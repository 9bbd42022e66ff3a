//! Find statement separators outside of literals.
//!
//! The scanner understands the PostgreSQL lexical forms that may legitimately contain a `;`:
//! standard strings (`'it''s'`), escape strings (`E'\''`), quoted identifiers (`"a;b"`) and
//! dollar-quoted strings (`$tag$...$tag$`). Comments are tracked so that quotes inside them do
//! not open a literal, but a `;` inside a comment is still a separator.

use super::error::ValidationError;

/// Trim surrounding whitespace and drop a single trailing `;`.
pub fn strip_trailing_separator(sql: &str) -> &str {
    let trimmed = sql.trim();
    match trimmed.strip_suffix(';') {
        Some(stripped) => stripped.trim_end(),
        None => trimmed,
    }
}

/// Reject text containing a `;` anywhere except inside a string literal or quoted identifier,
/// or containing an unterminated literal.
pub fn check_separators(sql: &str) -> Result<(), ValidationError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ';' => return Err(ValidationError::StatementSeparator),
            '\'' => {
                let escapes = is_escape_string_prefix(&chars, i);
                i = skip_single_quoted(&chars, i + 1, escapes)?;
            }
            '"' => i = skip_double_quoted(&chars, i + 1)?,
            '$' => match dollar_tag(&chars, i) {
                Some(tag) => i = skip_dollar_quoted(&chars, i + tag.len(), &tag)?,
                None => i += 1,
            },
            '-' if chars.get(i + 1) == Some(&'-') => i = scan_line_comment(&chars, i + 2)?,
            '/' if chars.get(i + 1) == Some(&'*') => i = scan_block_comment(&chars, i + 2)?,
            _ => i += 1,
        }
    }
    Ok(())
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// `E'...'` (or `e'...'`) as a standalone token.
fn is_escape_string_prefix(chars: &[char], quote: usize) -> bool {
    quote >= 1
        && matches!(chars[quote - 1], 'E' | 'e')
        && (quote < 2 || !is_identifier_char(chars[quote - 2]))
}

/// Returns the index just past the closing quote.
fn skip_single_quoted(chars: &[char], mut i: usize, escapes: bool) -> Result<usize, ValidationError> {
    while i < chars.len() {
        match chars[i] {
            '\\' if escapes => i += 2,
            '\'' if chars.get(i + 1) == Some(&'\'') => i += 2,
            '\'' => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(ValidationError::UnterminatedLiteral)
}

fn skip_double_quoted(chars: &[char], mut i: usize) -> Result<usize, ValidationError> {
    while i < chars.len() {
        match chars[i] {
            '"' if chars.get(i + 1) == Some(&'"') => i += 2,
            '"' => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(ValidationError::UnterminatedLiteral)
}

/// Recognise an opening dollar-quote tag (`$$` or `$name$`) starting at `start`.
/// Positional parameters such as `$1` and identifiers containing `$` are not tags.
fn dollar_tag(chars: &[char], start: usize) -> Option<String> {
    if start > 0 && is_identifier_char(chars[start - 1]) {
        return None;
    }
    let mut end = start + 1;
    while end < chars.len() && chars[end] != '$' {
        let c = chars[end];
        let valid = if end == start + 1 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !valid {
            return None;
        }
        end += 1;
    }
    if end < chars.len() {
        Some(chars[start..=end].iter().collect())
    } else {
        None
    }
}

fn skip_dollar_quoted(chars: &[char], mut i: usize, tag: &str) -> Result<usize, ValidationError> {
    let tag: Vec<char> = tag.chars().collect();
    while i + tag.len() <= chars.len() {
        if chars[i..i + tag.len()] == tag[..] {
            return Ok(i + tag.len());
        }
        i += 1;
    }
    Err(ValidationError::UnterminatedLiteral)
}

fn scan_line_comment(chars: &[char], mut i: usize) -> Result<usize, ValidationError> {
    while i < chars.len() && chars[i] != '\n' {
        if chars[i] == ';' {
            return Err(ValidationError::StatementSeparator);
        }
        i += 1;
    }
    Ok(i)
}

fn scan_block_comment(chars: &[char], mut i: usize) -> Result<usize, ValidationError> {
    let mut depth = 1;
    while i < chars.len() {
        match (chars[i], chars.get(i + 1)) {
            (';', _) => return Err(ValidationError::StatementSeparator),
            ('/', Some('*')) => {
                depth += 1;
                i += 2;
            }
            ('*', Some('/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => i += 1,
        }
    }
    Err(ValidationError::UnterminatedLiteral)
}
