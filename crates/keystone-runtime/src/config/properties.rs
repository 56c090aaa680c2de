//! `.properties` documents.
//!
//! Parsing is delegated to the `java-properties` crate, reading UTF-8:
//!
//! ```text
//! # comment            ! also a comment
//! token = abc          status:online          activity playing:Celeste
//! long.value = first \
//!              second
//! escaped = tab\there \u00e9
//! ```
//!
//! Later duplicates of a key win once the pairs are collected into a
//! section.

use java_properties::PropertiesIter;
use thiserror::Error;

/// A syntax error in a `.properties` document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct PropertiesError {
    /// 1-based line where the offending logical line starts; `0` when the
    /// parser could not tell.
    pub line: usize,
    /// What went wrong.
    pub reason: String,
}

impl From<java_properties::PropertiesError> for PropertiesError {
    fn from(e: java_properties::PropertiesError) -> Self {
        Self {
            line: e.line_number().unwrap_or(0),
            reason: e.to_string(),
        }
    }
}

/// Parses a document into `(key, value)` pairs in file order.
pub fn parse(input: &str) -> Result<Vec<(String, String)>, PropertiesError> {
    let mut entries = Vec::new();
    PropertiesIter::new_with_encoding(input.as_bytes(), encoding_rs::UTF_8)
        .read_into(|key, value| entries.push((key, value)))?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(input: &str) -> Vec<(String, String)> {
        parse(input).unwrap()
    }

    fn entry(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_separators_and_comments() {
        let input = "\
# bot settings
! legacy comment
token = abc
status:online
activity playing:Celeste

  rest.timeout_seconds=30
";
        assert_eq!(
            pairs(input),
            vec![
                entry("token", "abc"),
                entry("status", "online"),
                entry("activity", "playing:Celeste"),
                entry("rest.timeout_seconds", "30"),
            ]
        );
    }

    #[test]
    fn test_value_keeps_later_separators() {
        assert_eq!(
            pairs("activity = streaming:https://twitch.tv/x:Live"),
            vec![entry("activity", "streaming:https://twitch.tv/x:Live")]
        );
        assert_eq!(pairs("empty="), vec![entry("empty", "")]);
    }

    #[test]
    fn test_line_continuation() {
        let input = "greeting = hello \\\n          world\nnext = 1\n";
        assert_eq!(
            pairs(input),
            vec![entry("greeting", "hello world"), entry("next", "1")]
        );
    }

    #[test]
    fn test_utf8_and_escapes() {
        assert_eq!(
            pairs("name = Célestin\nescaped = tab\\there \\u00e9\n"),
            vec![entry("name", "Célestin"), entry("escaped", "tab\there é")]
        );
    }

    #[test]
    fn test_duplicates_kept_in_order() {
        assert_eq!(
            pairs("a = 1\nb = 2\na = 3\n"),
            vec![entry("a", "1"), entry("b", "2"), entry("a", "3")]
        );
    }

    #[test]
    fn test_malformed_unicode_reports_line() {
        let err = parse("ok = 1\nbad = \\u12G4\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(!err.reason.is_empty());
    }
}
