//! SQL helper functions for search.
//!
//! User text is never spliced into SQL. It reaches the engine either as an
//! FTS5 query string built here (with every term quoted) or as an escaped
//! LIKE pattern, both bound as parameters.

/// Escapes SQL LIKE wildcards in a string to make them literal.
///
/// Pair with `ESCAPE '\'` in the query.
///
/// # Examples
///
/// ```
/// use minmo::storage::sqlite::escape_like_wildcards;
///
/// assert_eq!(escape_like_wildcards("100%"), "100\\%");
/// assert_eq!(escape_like_wildcards("user_name"), "user\\_name");
/// assert_eq!(escape_like_wildcards("path\\file"), "path\\\\file");
/// ```
#[must_use]
pub fn escape_like_wildcards(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' | '_' | '\\' => {
                result.push('\\');
                result.push(c);
            },
            _ => result.push(c),
        }
    }
    result
}

/// Builds a case-insensitive substring pattern for `query`.
#[must_use]
pub fn like_pattern(query: &str) -> String {
    format!("%{}%", escape_like_wildcards(&query.to_lowercase()))
}

/// Quotes `s` as an FTS5 string, doubling embedded quotes.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Builds the FTS5 MATCH expression for a trimmed, non-empty query.
///
/// The expression matches the exact phrase, or every word as a prefix:
///
/// ```text
/// brave heart  =>  "brave heart" OR "brave"* "heart"*
/// ```
///
/// Words without any alphanumeric character are dropped since the FTS
/// tokenizer would discard them anyway. Returns `None` when nothing
/// searchable remains.
///
/// # Examples
///
/// ```
/// use minmo::storage::sqlite::build_fts_query;
///
/// assert_eq!(build_fts_query("brave").as_deref(), Some(r#""brave" OR "brave"*"#));
/// assert_eq!(build_fts_query("?!"), None);
/// ```
#[must_use]
pub fn build_fts_query(query: &str) -> Option<String> {
    let words: Vec<&str> = query
        .split_whitespace()
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .collect();

    if words.is_empty() {
        return None;
    }

    let phrase = quote(&words.join(" "));
    let prefixes = words
        .iter()
        .map(|word| format!("{}*", quote(word)))
        .collect::<Vec<_>>()
        .join(" ");

    Some(format!("{phrase} OR {prefixes}"))
}
