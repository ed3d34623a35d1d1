// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Session store.
//!
//! The single owner of per-client session state: which client ids have
//! a live attachment, and the cached state of detached persistent
//! sessions. The in-memory maps are the default backend; a persistent
//! implementation would replace this type behind the dispatcher.

use std::collections::HashMap;

use codec::QoS;

use crate::session::CachedSession;
use crate::types::{PublishMessage, SessionGid};

/// Bookkeeping for one known client id.
#[derive(Debug)]
struct StoredSession {
    clean_session: bool,

    /// Filter string to granted QoS. The trie is authoritative for
    /// routing; this map exists so a session's footprint can be listed
    /// and carried across reconnects.
    subscriptions: HashMap<String, QoS>,

    /// Present while the client is offline with a persistent session.
    detached: Option<CachedSession>,
}

impl StoredSession {
    fn new(clean_session: bool) -> Self {
        Self {
            clean_session,
            subscriptions: HashMap::new(),
            detached: None,
        }
    }
}

/// Result of admitting a CONNECT.
#[derive(Debug)]
pub struct ConnectOutcome {
    /// Value of the CONNACK session-present flag [MQTT-3.2.2-2].
    pub session_present: bool,

    /// Cached state to load into the new attachment, when the prior
    /// persistent session was detached.
    pub resumed: Option<CachedSession>,

    /// Prior live attachment for the same client id, to be closed
    /// [MQTT-3.1.4-2].
    pub taken_over: Option<SessionGid>,
}

/// Result of a session termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The closing attachment is no longer the live one; a takeover
    /// already handled cleanup. Nothing to do.
    Stale,

    /// Clean session: state erased, subscriptions must leave the trie.
    Removed,

    /// Persistent session: state cached until the next attachment.
    Cached,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    /// Live attachments by client id.
    live: HashMap<String, SessionGid>,

    /// Reverse map, to resolve commands that only carry a session gid.
    attachments: HashMap<SessionGid, String>,

    sessions: HashMap<String, StoredSession>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a CONNECT for `client_id`.
    ///
    /// With `clean_session` any prior state is discarded and a fresh
    /// session installed; otherwise a prior persistent session is
    /// resumed unchanged and reported through `session_present`.
    pub fn connect(
        &mut self,
        client_id: &str,
        clean_session: bool,
        gid: SessionGid,
    ) -> ConnectOutcome {
        let taken_over = self.live.insert(client_id.to_string(), gid);
        if let Some(old_gid) = taken_over {
            self.attachments.remove(&old_gid);
        }
        self.attachments.insert(gid, client_id.to_string());

        if clean_session {
            self.sessions
                .insert(client_id.to_string(), StoredSession::new(true));
            return ConnectOutcome {
                session_present: false,
                resumed: None,
                taken_over,
            };
        }

        match self.sessions.get_mut(client_id) {
            // Resume only state left behind by a persistent session; a
            // prior clean session is discarded.
            Some(record) if !record.clean_session => {
                let resumed = record.detached.take();
                ConnectOutcome {
                    session_present: true,
                    resumed,
                    taken_over,
                }
            }
            _ => {
                self.sessions
                    .insert(client_id.to_string(), StoredSession::new(false));
                ConnectOutcome {
                    session_present: false,
                    resumed: None,
                    taken_over,
                }
            }
        }
    }

    /// Record a session termination. Stale notifications from an
    /// attachment that was already superseded are reported as such and
    /// must not touch any state.
    pub fn disconnect(
        &mut self,
        client_id: &str,
        gid: SessionGid,
        snapshot: Option<CachedSession>,
    ) -> DisconnectOutcome {
        if self.live.get(client_id) != Some(&gid) {
            return DisconnectOutcome::Stale;
        }
        self.live.remove(client_id);
        self.attachments.remove(&gid);

        let Some(record) = self.sessions.get_mut(client_id) else {
            return DisconnectOutcome::Removed;
        };
        if record.clean_session {
            self.sessions.remove(client_id);
            DisconnectOutcome::Removed
        } else {
            record.detached =
                Some(snapshot.unwrap_or_else(|| CachedSession::empty(client_id.to_string())));
            DisconnectOutcome::Cached
        }
    }

    /// Live attachment of `client_id`, if any.
    #[must_use]
    pub fn live(&self, client_id: &str) -> Option<SessionGid> {
        self.live.get(client_id).copied()
    }

    /// Client id behind a live attachment.
    #[must_use]
    pub fn client_of(&self, gid: SessionGid) -> Option<&str> {
        self.attachments.get(&gid).map(String::as_str)
    }

    pub fn record_subscription(&mut self, client_id: &str, filter: &str, qos: QoS) {
        if let Some(record) = self.sessions.get_mut(client_id) {
            record.subscriptions.insert(filter.to_string(), qos);
        }
    }

    pub fn remove_subscription(&mut self, client_id: &str, filter: &str) {
        if let Some(record) = self.sessions.get_mut(client_id) {
            record.subscriptions.remove(filter);
        }
    }

    /// Queue a routed message for a detached persistent session.
    /// Returns false when there is no such session to hold it.
    pub fn queue_offline(&mut self, client_id: &str, message: PublishMessage) -> bool {
        match self.sessions.get_mut(client_id) {
            Some(record) => match record.detached.as_mut() {
                Some(cached) => {
                    cached.queue_message(message);
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Iterate all known sessions as (client id, online, queued count).
    pub fn iter_stats(&self) -> impl Iterator<Item = (&str, bool, usize)> {
        self.sessions.iter().map(|(client_id, record)| {
            let online = self.live.contains_key(client_id);
            let pending = record
                .detached
                .as_ref()
                .map_or(0, CachedSession::pending_count);
            (client_id.as_str(), online, pending)
        })
    }
}
