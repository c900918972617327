//! MQTT topic filter matching.
//!
//! `+` matches exactly one level, `#` matches the parent level and every level
//! below it and may only appear as the final level. Empty levels are legal,
//! as in MQTT. Topics starting with `$` are never matched by a filter whose
//! first level is a wildcard.

use crate::utils::{Error, Result};

const SEPARATOR: char = '/';

/// Returns whether `topic` is covered by `filter`.
///
/// Fails with [`Error::Protocol`] when the filter is malformed or the topic
/// name contains wildcards; a plain mismatch is `Ok(false)`.
pub fn matches(filter: &str, topic: &str) -> Result<bool> {
    if !is_valid_filter(filter) {
        return Err(Error::Protocol(format!("invalid topic filter {filter:?}")));
    }
    if !is_valid_topic(topic) {
        return Err(Error::Protocol(format!("invalid topic name {topic:?}")));
    }

    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return Ok(false);
    }

    Ok(match_levels(filter.split(SEPARATOR), topic.split(SEPARATOR)))
}

fn match_levels<'a>(
    mut filter: impl Iterator<Item = &'a str>,
    mut topic: impl Iterator<Item = &'a str>,
) -> bool {
    loop {
        match (filter.next(), topic.next()) {
            // `#` also covers its parent level, so "a/#" matches "a"
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// A filter is valid when it is non-empty, `+` and `#` each occupy a whole
/// level and `#` is the last level.
pub fn is_valid_filter(filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }

    let mut levels = filter.split(SEPARATOR).peekable();
    while let Some(level) = levels.next() {
        if level.contains('#') && (level != "#" || levels.peek().is_some()) {
            return false;
        }
        if level.contains('+') && level != "+" {
            return false;
        }
    }
    true
}

/// A topic name is valid when it is non-empty and carries no wildcard.
pub fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(['+', '#'])
}
