//! Interpret the text a model answered with.

use super::prompt::REFUSAL_SENTINEL;

/// Leading words that mark an answer as a SQL statement rather than prose. Statement kinds the
/// pipeline refuses to run are listed too, so they reach the validator and get rejected there.
const SQL_LEADING_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "INSERT", "UPDATE", "DELETE", "VALUES", "TABLE", "CREATE", "DROP", "ALTER",
    "TRUNCATE", "GRANT", "REVOKE", "COPY", "MERGE", "CALL", "DO", "EXPLAIN", "VACUUM", "ANALYZE",
    "SET", "RESET", "BEGIN", "START", "COMMIT", "ROLLBACK", "LOCK", "REINDEX", "CLUSTER",
    "COMMENT", "REFRESH", "DISCARD", "EXECUTE", "PREPARE", "DEALLOCATE", "DECLARE", "FETCH",
    "LISTEN", "NOTIFY", "SHOW", "CHECKPOINT", "REASSIGN", "SECURITY", "IMPORT", "LOAD",
];

/// Info strings that may follow an opening code fence.
const FENCE_INFO_STRINGS: &[&str] = &["sql", "postgresql", "postgres", "pgsql", "psql"];

/// Strip the wrapping models tend to add around a statement: whitespace, Markdown code fences,
/// surrounding double quotes and backslash-escaped quotes.
pub fn clean_response(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        text = strip_info_string(rest).trim_end();
        text = text.strip_suffix("```").unwrap_or(text).trim();
    }

    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = text[1..text.len() - 1].trim();
    }

    text.replace("\\\"", "\"").trim().to_string()
}

/// Drop the info string of an opening fence, e.g. the `sql` of ```` ```sql ````. Anything else on
/// the fence line is kept as part of the statement.
fn strip_info_string(fenced: &str) -> &str {
    let fenced = fenced.trim_start_matches([' ', '\t']);
    let word_end = fenced
        .find(char::is_whitespace)
        .unwrap_or(fenced.len());
    let (word, rest) = fenced.split_at(word_end);
    if FENCE_INFO_STRINGS
        .iter()
        .any(|info| info.eq_ignore_ascii_case(word))
    {
        rest.trim_start()
    } else {
        fenced.trim_start()
    }
}

/// Whether a cleaned answer is the refusal sentinel: `X` alone, or followed by something that
/// cannot continue an identifier.
pub fn is_refusal(cleaned: &str) -> bool {
    match cleaned.strip_prefix(REFUSAL_SENTINEL) {
        Some(rest) => rest
            .chars()
            .next()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_')),
        None => false,
    }
}

/// Whether a cleaned answer starts like a SQL statement.
pub fn looks_like_sql(cleaned: &str) -> bool {
    if cleaned.starts_with('(') {
        return true;
    }
    let first_word: String = cleaned
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_uppercase();
    let next = cleaned[first_word.len()..].chars().next();
    SQL_LEADING_KEYWORDS.contains(&first_word.as_str())
        && next.map_or(true, |c| c.is_whitespace() || c == '(' || c == '*')
}
