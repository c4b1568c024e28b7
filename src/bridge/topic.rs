//! Topic matching for inbound broker messages.

/// Exact length-and-content comparison of a delivered topic against the
/// subscription.
///
/// A missing topic (continuation chunk of a split message) never matches,
/// and neither does a topic that merely shares a prefix with the
/// subscription.
pub fn topic_matches(delivered: Option<&str>, subscribed: &str) -> bool {
    match delivered {
        Some(topic) => topic.len() == subscribed.len() && topic.as_bytes() == subscribed.as_bytes(),
        None => false,
    }
}

/// Publish topics must be concrete; `+` and `#` are subscription wildcards.
pub fn is_concrete_topic(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(['+', '#', '\0'])
}
