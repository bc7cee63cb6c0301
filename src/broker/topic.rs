//! Topic matching
//!
//! Topics are `/`-separated strings such as `local/time/tick`. A subscriber
//! registers a filter, which is a topic prefix aligned on segment boundaries:
//! the filter `local/time` covers `local/time` and `local/time/tick` but not
//! `local/timer`. The empty filter covers every topic.

/// Returns true when `topic` falls under `filter`.
///
/// `filter` matches iff it is empty, equal to `topic`, or `topic` starts with
/// `filter` followed by `/`.
pub fn matches(filter: &str, topic: &str) -> bool {
    if filter.is_empty() {
        return true;
    }
    match topic.strip_prefix(filter) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Normalizes a requested filter by dropping empty segments, so that
/// `/local/time/`, `local//time` and `local/time` select the same topics.
pub fn normalize_filter(raw: &str) -> String {
    raw.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
