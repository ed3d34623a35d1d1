// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Retained message store.
//!
//! Each concrete topic holds at most one retained message, replayed to
//! every new matching subscription [MQTT-3.3.1-6].

use bytes::Bytes;
use std::collections::HashMap;
use std::time::SystemTime;

use codec::topic::topic_matches;
use codec::QoS;

/// The last message published on a topic with RETAIN set.
#[derive(Debug, Clone, PartialEq)]
pub struct RetainedMessage {
    topic: String,
    payload: Bytes,
    qos: QoS,
    stored_at: SystemTime,
}

impl RetainedMessage {
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    #[must_use]
    pub const fn qos(&self) -> QoS {
        self.qos
    }

    #[must_use]
    pub const fn stored_at(&self) -> SystemTime {
        self.stored_at
    }
}

/// Map from concrete topic to its retained message.
#[derive(Debug, Default)]
pub struct RetainedStore {
    messages: HashMap<String, RetainedMessage>,
}

impl RetainedStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of topics with a retained message.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Store, replace or delete the retained message of `topic`.
    ///
    /// A zero-byte payload removes the entry; new subscribers then see
    /// nothing for this topic [MQTT-3.3.1-10] [MQTT-3.3.1-11].
    pub fn set(&mut self, topic: &str, payload: Bytes, qos: QoS) {
        if payload.is_empty() {
            self.messages.remove(topic);
            return;
        }
        self.messages.insert(
            topic.to_string(),
            RetainedMessage {
                topic: topic.to_string(),
                payload,
                qos,
                stored_at: SystemTime::now(),
            },
        );
    }

    /// All retained messages whose topic matches `filter`, sorted by
    /// topic for deterministic replay order.
    #[must_use]
    pub fn matching(&self, filter: &str) -> Vec<&RetainedMessage> {
        let mut matches: Vec<&RetainedMessage> = self
            .messages
            .values()
            .filter(|message| topic_matches(filter, &message.topic))
            .collect();
        matches.sort_by(|a, b| a.topic.cmp(&b.topic));
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_replace() {
        let mut store = RetainedStore::new();
        store.set("status", Bytes::from_static(b"on"), QoS::AtLeastOnce);
        store.set("status", Bytes::from_static(b"off"), QoS::AtMostOnce);

        assert_eq!(store.len(), 1);
        let matches = store.matching("status");
        assert_eq!(matches[0].payload().as_ref(), b"off");
        assert_eq!(matches[0].qos(), QoS::AtMostOnce);
    }

    #[test]
    fn test_empty_payload_deletes() {
        let mut store = RetainedStore::new();
        store.set("status", Bytes::from_static(b"on"), QoS::AtMostOnce);
        store.set("status", Bytes::new(), QoS::AtMostOnce);

        assert!(store.is_empty());
        assert!(store.matching("status").is_empty());
        assert!(store.matching("#").is_empty());
    }

    #[test]
    fn test_qos0_messages_are_retained() {
        let mut store = RetainedStore::new();
        store.set("status", Bytes::from_static(b"on"), QoS::AtMostOnce);
        assert_eq!(store.matching("status").len(), 1);
    }

    #[test]
    fn test_wildcard_filter_collects_sorted() {
        let mut store = RetainedStore::new();
        store.set("sensors/b/temp", Bytes::from_static(b"2"), QoS::AtMostOnce);
        store.set("sensors/a/temp", Bytes::from_static(b"1"), QoS::AtMostOnce);
        store.set("other", Bytes::from_static(b"x"), QoS::AtMostOnce);

        let matches = store.matching("sensors/#");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].topic(), "sensors/a/temp");
        assert_eq!(matches[1].topic(), "sensors/b/temp");

        let matches = store.matching("sensors/+/temp");
        assert_eq!(matches.len(), 2);
    }
}
