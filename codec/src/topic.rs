// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Topic names and topic filters.
//!
//! A topic name is the slash-delimited hierarchical name carried by a
//! PUBLISH packet, like `sensors/room1/temp`. A topic filter is the
//! pattern carried by SUBSCRIBE and UNSUBSCRIBE packets; it may contain
//! the single-level wildcard `+` and the trailing multi-level wildcard
//! `#` [MQTT-4.7].

use std::fmt;

use crate::string_data::StringData;
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};

/// Multi-level wildcard segment.
pub const MULTI_WILDCARD: &str = "#";

/// Single-level wildcard segment.
pub const SINGLE_WILDCARD: &str = "+";

/// Check that `topic` is a valid topic name for a PUBLISH packet.
///
/// The topic name MUST be at least one character long [MQTT-4.7.3-1] and
/// MUST NOT contain wildcard characters [MQTT-3.3.2-2]. Empty segments
/// are allowed by the protocol for topic names, but this broker treats
/// them like any other literal segment.
#[must_use]
pub fn is_valid_pub_topic(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(['+', '#'])
}

/// Check that `filter` is a valid topic filter.
///
/// Rejected when the filter is empty, contains an empty segment
/// (`"a//b"`), places `#` anywhere but the final segment, or mixes a
/// wildcard with other characters inside one segment [MQTT-4.7.1].
#[must_use]
pub fn is_valid_sub_topic(filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }
    let segments: Vec<&str> = filter.split('/').collect();
    let last = segments.len() - 1;
    for (index, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return false;
        }
        if segment.contains('#') && (*segment != MULTI_WILDCARD || index != last) {
            return false;
        }
        if segment.contains('+') && *segment != SINGLE_WILDCARD {
            return false;
        }
    }
    true
}

/// Check whether the concrete `topic` matches `filter`.
///
/// `+` consumes exactly one segment, a trailing `#` consumes zero or
/// more segments. Topics starting with `$` are only matched by filters
/// that name the first segment literally [MQTT-4.7.2-1], so `#` does not
/// capture `$SYS` traffic.
#[must_use]
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let filter_segments: Vec<&str> = filter.split('/').collect();
    let topic_segments: Vec<&str> = topic.split('/').collect();

    // The Server MUST NOT match Topic Filters starting with a wildcard
    // character with Topic Names beginning with a $ character [MQTT-4.7.2-1].
    if topic.starts_with('$')
        && (filter_segments[0] == MULTI_WILDCARD || filter_segments[0] == SINGLE_WILDCARD)
    {
        return false;
    }

    let mut fi = 0;
    let mut ti = 0;
    while fi < filter_segments.len() {
        let segment = filter_segments[fi];
        if segment == MULTI_WILDCARD {
            return true;
        }
        if ti >= topic_segments.len() {
            return false;
        }
        if segment != SINGLE_WILDCARD && segment != topic_segments[ti] {
            return false;
        }
        fi += 1;
        ti += 1;
    }

    // `a/b/#` also matches `a/b`; that case returned above. Here the
    // filter is exhausted, so the topic must be too.
    ti == topic_segments.len()
}

/// Topic name of a PUBLISH packet. Wildcard free.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PubTopic(StringData);

impl PubTopic {
    /// Create a topic name after validating it.
    ///
    /// # Errors
    ///
    /// Returns error if `topic` is empty or contains wildcards.
    pub fn new(topic: &str) -> Result<Self, EncodeError> {
        if !is_valid_pub_topic(topic) {
            return Err(EncodeError::InvalidTopic);
        }
        let inner = StringData::from(topic).map_err(|_err| EncodeError::InvalidTopic)?;
        Ok(Self(inner))
    }

    /// Get byte length in packet.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.0.bytes()
    }
}

impl AsRef<str> for PubTopic {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl fmt::Display for PubTopic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DecodePacket for PubTopic {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let inner = StringData::decode(ba)?;
        if !is_valid_pub_topic(inner.as_ref()) {
            return Err(DecodeError::InvalidTopicName);
        }
        Ok(Self(inner))
    }
}

impl EncodePacket for PubTopic {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        self.0.encode(buf)
    }
}

/// Topic filter of a SUBSCRIBE or UNSUBSCRIBE packet.
///
/// Construction through [`SubTopic::new`] validates the wildcard
/// placement rules. Decoding keeps the raw string so that the broker can
/// answer an invalid filter with a SUBACK failure code instead of
/// dropping the connection; call [`SubTopic::is_valid`] before inserting
/// the filter anywhere.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubTopic(StringData);

impl SubTopic {
    /// Create a validated topic filter.
    ///
    /// # Errors
    ///
    /// Returns error if `filter` violates the wildcard placement rules.
    pub fn new(filter: &str) -> Result<Self, EncodeError> {
        if !is_valid_sub_topic(filter) {
            return Err(EncodeError::InvalidTopic);
        }
        let inner = StringData::from(filter).map_err(|_err| EncodeError::InvalidTopic)?;
        Ok(Self(inner))
    }

    /// Returns true if the filter satisfies the wildcard placement rules.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_valid_sub_topic(self.0.as_ref())
    }

    /// Check whether the concrete `topic` matches this filter.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        topic_matches(self.0.as_ref(), topic)
    }

    /// Get byte length in packet.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.0.bytes()
    }
}

impl AsRef<str> for SubTopic {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl fmt::Display for SubTopic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DecodePacket for SubTopic {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let inner = StringData::decode(ba)?;
        if inner.is_empty() {
            return Err(DecodeError::InvalidTopicFilter);
        }
        Ok(Self(inner))
    }
}

impl EncodePacket for SubTopic {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        self.0.encode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pub_topic_validation() {
        assert!(is_valid_pub_topic("sensors/room1/temp"));
        assert!(is_valid_pub_topic("status"));
        assert!(!is_valid_pub_topic(""));
        assert!(!is_valid_pub_topic("sensors/+/temp"));
        assert!(!is_valid_pub_topic("sensors/#"));
    }

    #[test]
    fn test_sub_topic_validation() {
        assert!(is_valid_sub_topic("sensors/#"));
        assert!(is_valid_sub_topic("#"));
        assert!(is_valid_sub_topic("+"));
        assert!(is_valid_sub_topic("a/+/b"));
        assert!(is_valid_sub_topic("a/+/#"));

        assert!(!is_valid_sub_topic(""));
        assert!(!is_valid_sub_topic("a//b"));
        assert!(!is_valid_sub_topic("a+/b"));
        assert!(!is_valid_sub_topic("a/b+"));
        assert!(!is_valid_sub_topic("a/#/b"));
        assert!(!is_valid_sub_topic("a/b#"));
        assert!(!is_valid_sub_topic("#/a"));
    }

    #[test]
    fn test_multi_wildcard_matching() {
        assert!(topic_matches("#", "a"));
        assert!(topic_matches("#", "a/b/c"));
        assert!(topic_matches("a/b/#", "a/b"));
        assert!(topic_matches("a/b/#", "a/b/c"));
        assert!(topic_matches("a/b/#", "a/b/c/d"));
        assert!(!topic_matches("a/b/#", "a/c"));
    }

    #[test]
    fn test_single_wildcard_matching() {
        assert!(topic_matches("a/+", "a/b"));
        assert!(topic_matches("a/+/c", "a/b/c"));
        assert!(!topic_matches("a/+", "a"));
        assert!(!topic_matches("a/+", "a/b/c"));
        assert!(!topic_matches("+", "a/b"));
    }

    #[test]
    fn test_literal_matching() {
        assert!(topic_matches("a/b", "a/b"));
        assert!(!topic_matches("a/b", "a/b/c"));
        assert!(!topic_matches("a/b/c", "a/b"));
    }

    #[test]
    fn test_dollar_topics_not_matched_by_wildcards() {
        assert!(!topic_matches("#", "$SYS/uptime"));
        assert!(!topic_matches("+/uptime", "$SYS/uptime"));
        assert!(topic_matches("$SYS/#", "$SYS/uptime"));
        assert!(topic_matches("$SYS/+", "$SYS/uptime"));
    }
}
