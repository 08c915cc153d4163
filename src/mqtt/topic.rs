//! Topic construction and parsing for the bridge.

use crate::error::{BridgeError, Result};
use crate::knx::GroupAddress;

/// Longest accepted base topic.
pub const MAX_TOPIC_LEN: usize = 64;

/// Reject base topics longer than [`MAX_TOPIC_LEN`].
pub fn validate_base_topic(base: &str) -> Result<()> {
    if base.len() > MAX_TOPIC_LEN {
        return Err(BridgeError::TopicTooLong {
            len: base.len(),
            max: MAX_TOPIC_LEN,
        });
    }
    Ok(())
}

/// Per-address topic: `{base}/{main}/{middle}/{sub}`.
pub fn address_topic(base: &str, dest: GroupAddress) -> Result<String> {
    validate_base_topic(base)?;
    Ok(format!("{}/{}", base, dest))
}

/// Return the last three `/`-separated segments of `topic`.
///
/// `"foo/bar/1/2/3"` yields `"1/2/3"`. A topic with exactly two slashes is
/// returned whole; one with fewer yields `None`.
pub fn extract_trailing_triple(topic: &str) -> Option<&str> {
    let slashes = topic.matches('/').count();
    if slashes < 2 {
        return None;
    }

    match topic.rmatch_indices('/').nth(2) {
        Some((idx, _)) => Some(&topic[idx + 1..]),
        None => Some(topic),
    }
}

/// MQTT topic filter matching with `+` and `#` wildcards, as the broker
/// client does it. Topics starting with `$` never match.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    rumqttc::matches(topic, filter)
}
