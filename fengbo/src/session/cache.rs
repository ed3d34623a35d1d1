// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::collections::{HashSet, VecDeque};

use codec::PacketId;

use crate::session::inflight::InflightMessage;
use crate::types::PublishMessage;

/// State of a persistent session between two attachments.
///
/// Built by the session actor when a `clean_session=0` connection ends,
/// held by the dispatcher's session store, and loaded back into the next
/// actor for the same client id. While the client is offline the store
/// appends routed QoS 1/2 messages to `backlog`.
#[derive(Debug, Clone)]
pub struct CachedSession {
    client_id: String,

    /// Allocator cursor, so the resumed session does not reuse ids that
    /// are still in flight.
    next_packet_id: u16,

    /// Outbound messages whose delivery handshake was cut short. Re-sent
    /// on resume, PUBLISH phases with DUP=1 [MQTT-4.4.0-1].
    inflight: Vec<InflightMessage>,

    /// Deliveries that never made it into the window.
    backlog: VecDeque<PublishMessage>,

    /// Packet ids of inbound QoS 2 publishes not yet released by their
    /// sender.
    pub_recv_ids: HashSet<PacketId>,
}

impl CachedSession {
    #[must_use]
    pub fn new(
        client_id: String,
        next_packet_id: u16,
        inflight: Vec<InflightMessage>,
        backlog: VecDeque<PublishMessage>,
        pub_recv_ids: HashSet<PacketId>,
    ) -> Self {
        Self {
            client_id,
            next_packet_id,
            inflight,
            backlog,
            pub_recv_ids,
        }
    }

    /// Fresh state for a client that has no prior session.
    #[must_use]
    pub fn empty(client_id: String) -> Self {
        Self {
            client_id,
            next_packet_id: 1,
            inflight: Vec::new(),
            backlog: VecDeque::new(),
            pub_recv_ids: HashSet::new(),
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Queue a message routed while the client is offline.
    pub fn queue_message(&mut self, message: PublishMessage) {
        self.backlog.push_back(message);
    }

    /// Messages awaiting delivery, both cut-short and never-sent.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inflight.len() + self.backlog.len()
    }

    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        u16,
        Vec<InflightMessage>,
        VecDeque<PublishMessage>,
        HashSet<PacketId>,
    ) {
        (
            self.next_packet_id,
            self.inflight,
            self.backlog,
            self.pub_recv_ids,
        )
    }
}
