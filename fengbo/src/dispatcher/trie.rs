// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Subscription trie.
//!
//! Filters are stored segment by segment; the wildcard segments `+` and
//! `#` stay literal in the tree and get their meaning during matching.
//! Terminal nodes carry the subscribed client ids with their granted
//! QoS.

use std::collections::HashMap;

use codec::topic::{is_valid_sub_topic, MULTI_WILDCARD, SINGLE_WILDCARD};
use codec::QoS;

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    subscribers: HashMap<String, QoS>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.subscribers.is_empty()
    }
}

/// Trie over all subscriptions in the broker.
///
/// The dispatcher task is the only writer; matching is a pure read.
#[derive(Debug, Default)]
pub struct SubTrie {
    root: TrieNode,
    subscription_count: usize,
}

impl SubTrie {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscription entries across all nodes.
    #[must_use]
    pub const fn subscription_count(&self) -> usize {
        self.subscription_count
    }

    /// Insert a subscription. Returns false and stores nothing when the
    /// filter violates the wildcard placement rules; the caller answers
    /// that entry with the SUBACK failure code.
    ///
    /// Re-subscribing to an identical filter replaces the granted QoS
    /// [MQTT-3.8.4].
    pub fn subscribe(&mut self, client_id: &str, filter: &str, qos: QoS) -> bool {
        if !is_valid_sub_topic(filter) {
            log::error!("trie: invalid topic filter: {filter:?}");
            return false;
        }
        let mut node = &mut self.root;
        for segment in filter.split('/') {
            node = node.children.entry(segment.to_string()).or_default();
        }
        if node
            .subscribers
            .insert(client_id.to_string(), qos)
            .is_none()
        {
            self.subscription_count += 1;
        }
        true
    }

    /// Remove one subscription, comparing the filter byte for byte
    /// [MQTT-3.10.4-1]. Empty interior nodes are pruned.
    pub fn unsubscribe(&mut self, client_id: &str, filter: &str) -> bool {
        let segments: Vec<&str> = filter.split('/').collect();
        let removed = Self::remove_at(&mut self.root, &segments, client_id);
        if removed {
            self.subscription_count -= 1;
        }
        removed
    }

    fn remove_at(node: &mut TrieNode, segments: &[&str], client_id: &str) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return node.subscribers.remove(client_id).is_some();
        };
        let Some(child) = node.children.get_mut(*first) else {
            return false;
        };
        let removed = Self::remove_at(child, rest, client_id);
        if child.is_empty() {
            node.children.remove(*first);
        }
        removed
    }

    /// Drop every subscription of `client_id`, walking the whole trie.
    /// Used when a clean session ends or is superseded.
    pub fn remove_client(&mut self, client_id: &str) {
        let removed = Self::remove_client_at(&mut self.root, client_id);
        self.subscription_count -= removed;
    }

    fn remove_client_at(node: &mut TrieNode, client_id: &str) -> usize {
        let mut removed = usize::from(node.subscribers.remove(client_id).is_some());
        node.children.retain(|_segment, child| {
            removed += Self::remove_client_at(child, client_id);
            !child.is_empty()
        });
        removed
    }

    /// All clients whose filters match the concrete `topic`, each with
    /// the highest QoS among its matching filters [MQTT-3.8.4].
    #[must_use]
    pub fn matches(&self, topic: &str) -> HashMap<String, QoS> {
        let segments: Vec<&str> = topic.split('/').collect();
        let mut result = HashMap::new();
        // Topics starting with '$' are not matched by wildcards at the
        // first level [MQTT-4.7.2-1].
        let skip_root_wildcards = topic.starts_with('$');
        Self::collect(&self.root, &segments, 0, skip_root_wildcards, &mut result);
        result
    }

    fn collect(
        node: &TrieNode,
        segments: &[&str],
        depth: usize,
        skip_wildcards: bool,
        result: &mut HashMap<String, QoS>,
    ) {
        // A '#' child matches the remainder, including zero further
        // segments, so `a/b/#` also matches `a/b`.
        if !skip_wildcards {
            if let Some(hash_child) = node.children.get(MULTI_WILDCARD) {
                Self::merge(result, &hash_child.subscribers);
            }
        }

        if depth == segments.len() {
            Self::merge(result, &node.subscribers);
            return;
        }

        if let Some(literal_child) = node.children.get(segments[depth]) {
            Self::collect(literal_child, segments, depth + 1, false, result);
        }
        if !skip_wildcards {
            if let Some(plus_child) = node.children.get(SINGLE_WILDCARD) {
                Self::collect(plus_child, segments, depth + 1, false, result);
            }
        }
    }

    fn merge(result: &mut HashMap<String, QoS>, subscribers: &HashMap<String, QoS>) {
        for (client_id, qos) in subscribers {
            result
                .entry(client_id.clone())
                .and_modify(|existing| *existing = (*existing).max(*qos))
                .or_insert(*qos);
        }
    }
}
