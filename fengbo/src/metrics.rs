// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Observable broker state, queried from the dispatcher.

/// Snapshot of one known session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub client_id: String,

    /// True while an attachment for this client id is live.
    pub online: bool,

    /// Messages queued for a detached persistent session. Live sessions
    /// track their window inside the session actor and report 0 here.
    pub pending_messages: usize,
}

/// Snapshot of the dispatcher-owned state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub sessions: Vec<SessionStats>,

    /// Number of topics with a retained message.
    pub retained_topics: usize,

    /// Total subscription entries across the trie.
    pub subscription_count: usize,
}

impl BrokerStats {
    /// Client ids with a live attachment.
    #[must_use]
    pub fn active_client_ids(&self) -> Vec<&str> {
        self.sessions
            .iter()
            .filter(|session| session.online)
            .map(|session| session.client_id.as_str())
            .collect()
    }
}
