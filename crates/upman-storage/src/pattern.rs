//! Finder-style mask compilation.
//!
//! A set of glob masks compiles into one case-insensitive regex that is matched against
//! `/{key}`. A mask matches when it covers a trailing part of the key that starts right
//! after a `/`:
//!
//! | mask        | regex      |
//! |-------------|------------|
//! | `**`        | `.*`       |
//! | `*`         | `[^/]*`    |
//! | `?`         | `[^/]`     |
//! | `[!`        | `[^`       |
//! | `[...]`     | character class |
//!
//! Everything else is matched literally, as is everything inside a class except its
//! closing `]` and `-` ranges. A mask starting with `/` is anchored to the
//! start of the key instead of any segment boundary.

use crate::traits::{StorageError, StorageResult};
use regex::{Regex, RegexBuilder};

/// Compiled mask set
#[derive(Debug, Clone)]
pub struct MatchPattern {
    regex: Regex,
}

impl MatchPattern {
    /// Match against a path of the form `/{key}`
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match against a storage key. Backslashes in the key count as separators.
    pub fn matches_key(&self, key: &str) -> bool {
        self.is_match(&format!("/{}", key.replace('\\', "/")))
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Whether `key` is kept by an optional pattern; `None` keeps everything.
pub fn key_matches(pattern: Option<&MatchPattern>, key: &str) -> bool {
    pattern.map_or(true, |p| p.matches_key(key))
}

/// Compile masks into a single pattern.
///
/// Returns `Ok(None)` when every key should match: either a mask is exactly `*`, or no
/// non-empty mask is left after normalization. Masks that do not form a valid expression
/// (for example an unclosed `[`) yield [`StorageError::InvalidPattern`].
pub fn compile<I, S>(masks: I) -> StorageResult<Option<MatchPattern>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut alternatives = Vec::new();

    for mask in masks {
        let mask = mask.as_ref().replace('\\', "/");
        let mask = mask.trim_end_matches('/');

        if mask.is_empty() {
            continue;
        }
        if mask == "*" {
            return Ok(None);
        }

        match mask.strip_prefix('/') {
            Some(absolute) => {
                alternatives.push(format!("^/{}", translate(absolute.trim_start_matches('/'))))
            }
            None => alternatives.push(format!("/{}", translate(mask))),
        }
    }

    if alternatives.is_empty() {
        return Ok(None);
    }

    let source = format!("(?:{})\\z", alternatives.join("|"));
    let regex = RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|e| StorageError::InvalidPattern(e.to_string()))?;

    Ok(Some(MatchPattern { regex }))
}

/// Translate one normalized mask into a regex fragment.
///
/// Inside `[...]` everything but `]` and ranges is literal, including `[`, `*` and `?`.
/// A `]` right after the opening bracket belongs to the class, and a `]` outside any
/// class is literal.
pub fn translate(mask: &str) -> String {
    let mut out = String::with_capacity(mask.len() * 2);
    let mut chars = mask.chars().peekable();
    let mut in_class = false;
    let mut class_start = false;

    while let Some(c) = chars.next() {
        let first_in_class = std::mem::take(&mut class_start);

        if in_class {
            match c {
                ']' if first_in_class => out.push_str("\\]"),
                ']' => {
                    in_class = false;
                    out.push(']');
                }
                // `--` is a set operator for `regex`; keep the second dash a plain range end
                '-' if out.ends_with('-') && !out.ends_with("\\-") => out.push_str("\\-"),
                '-' => out.push('-'),
                other => push_literal(&mut out, other),
            }
            continue;
        }

        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                in_class = true;
                class_start = true;
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
            }
            other => push_literal(&mut out, other),
        }
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}
