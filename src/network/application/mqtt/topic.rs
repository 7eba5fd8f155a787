//! Topic filter matching.
//!
//! Topics are `/`-separated levels. A filter level is either a literal, `+`
//! (exactly one level of any content) or `#` (the rest of the topic,
//! including nothing at all). Empty levels produced by leading, trailing or
//! doubled slashes are compared literally.
//!
//! ```rust
//! use libmqtt::network::application::mqtt::topic::matches;
//!
//! assert!(matches("sport/tennis/+", "sport/tennis/player1"));
//! assert!(matches("sport/tennis/#", "sport/tennis/player1/ranking"));
//! assert!(!matches("sport/+/player1", "sport/tennis/player2"));
//! ```

use super::error::TopicError;

/// Single-level wildcard.
pub const SINGLE_LEVEL_WILDCARD: &str = "+";
/// Multi-level wildcard.
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// Returns `true` if `topic` is selected by `filter`.
///
/// The first `#` level ends the comparison with a match, whatever follows it
/// in the filter. [`validate_topic_filter`] only accepts `#` as the last
/// level, so subscribed filters never rely on this.
pub fn matches(filter: &str, topic: &str) -> bool {
    if filter == topic {
        return true;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            // Also reached when the topic has run out: "a/#" selects "a".
            (Some(MULTI_LEVEL_WILDCARD), _) => return true,
            (Some(SINGLE_LEVEL_WILDCARD), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (Some(_), _) | (None, Some(_)) => return false,
            (None, None) => return true,
        }
    }
}

/// Check a topic name used for publishing.
pub fn validate_topic_name(topic: &str) -> Result<(), TopicError> {
    check_length(topic)?;
    if topic.contains(['+', '#']) {
        return Err(TopicError::WildcardInName);
    }
    Ok(())
}

/// Check a topic filter used for subscribing.
pub fn validate_topic_filter(filter: &str) -> Result<(), TopicError> {
    check_length(filter)?;
    let mut levels = filter.split('/').peekable();
    while let Some(level) = levels.next() {
        match level {
            MULTI_LEVEL_WILDCARD if levels.peek().is_some() => {
                return Err(TopicError::InvalidWildcard);
            }
            MULTI_LEVEL_WILDCARD | SINGLE_LEVEL_WILDCARD => {}
            literal if literal.contains(['+', '#']) => return Err(TopicError::InvalidWildcard),
            _ => {}
        }
    }
    Ok(())
}

fn check_length(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    if topic.len() > usize::from(u16::MAX) {
        return Err(TopicError::TooLong);
    }
    Ok(())
}
