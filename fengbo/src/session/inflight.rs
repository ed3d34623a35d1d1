// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Outbound delivery state machines.
//!
//! Every QoS 1/2 message on its way to the client lives here from the
//! moment the router hands it over until the terminal acknowledgement
//! arrives, the retry budget runs out, or the session ends. QoS 0
//! messages never enter the queue.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use codec::{PacketId, QoS};

use crate::error::{Error, ErrorKind};
use crate::types::PublishMessage;

/// Delivery state of one outbound in-flight message.
///
/// Transitions are strictly forward:
/// `Pending -> Acked` for QoS 1,
/// `Pending -> PubrecReceived -> PubrelSent -> Completed` for QoS 2,
/// and any state may end in `Expired` when the retry budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// PUBLISH written, terminal acknowledgement outstanding.
    Pending,

    /// QoS 2 only: PUBREC received, PUBREL not yet written.
    PubrecReceived,

    /// QoS 2 only: PUBREL written, PUBCOMP outstanding.
    PubrelSent,

    /// Terminal acknowledgement received. The entry is removed right
    /// after entering this state.
    Completed,

    /// Retry budget exhausted without a terminal acknowledgement.
    Expired,
}

/// One message in the outbound window.
#[derive(Debug, Clone)]
pub struct InflightMessage {
    packet_id: PacketId,
    message: PublishMessage,
    state: DeliveryState,
    dup: bool,
    retry_count: u32,
    next_retry_at: Instant,
}

impl InflightMessage {
    #[must_use]
    pub const fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    #[must_use]
    pub const fn message(&self) -> &PublishMessage {
        &self.message
    }

    #[must_use]
    pub const fn state(&self) -> DeliveryState {
        self.state
    }

    #[must_use]
    pub const fn dup(&self) -> bool {
        self.dup
    }

    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }
}

/// What the session has to put on the wire after a queue operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendAction {
    /// Write the PUBLISH for this entry (DUP as recorded on the entry).
    Publish(PacketId),

    /// Write a PUBREL carrying the same id as the original PUBLISH.
    Pubrel(PacketId),
}

/// Outbound table of one session: active window, overflow backlog and
/// the packet id allocator.
#[derive(Debug, Clone)]
pub struct InflightQueue {
    /// Allocator cursor. The next allocation starts probing here.
    next_packet_id: u16,

    /// Active in-flight entries, keyed by packet id. A `BTreeMap` keeps
    /// iteration in packet id order, which resume relies on.
    active: BTreeMap<u16, InflightMessage>,

    /// Deliveries waiting for a free slot in the window.
    backlog: VecDeque<PublishMessage>,

    max_inflight: usize,
    retry_interval: Duration,
    max_retries: u32,
}

impl InflightQueue {
    #[must_use]
    pub fn new(max_inflight: usize, retry_interval: Duration, max_retries: u32) -> Self {
        Self {
            next_packet_id: 1,
            active: BTreeMap::new(),
            backlog: VecDeque::new(),
            max_inflight,
            retry_interval,
            max_retries,
        }
    }

    /// Number of active in-flight entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active entries plus backlogged deliveries.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.active.len() + self.backlog.len()
    }

    #[must_use]
    pub fn get(&self, packet_id: PacketId) -> Option<&InflightMessage> {
        self.active.get(&packet_id.value())
    }

    /// Pick the next free packet id, starting at the cursor, skipping 0
    /// and ids currently in flight, wrapping modulo 65536.
    ///
    /// # Errors
    ///
    /// Returns `NoFreePacketId` if all 65535 ids are in use.
    fn allocate_packet_id(&mut self) -> Result<PacketId, Error> {
        let mut candidate = self.next_packet_id;
        for _ in 0..=u16::MAX {
            if candidate == 0 {
                candidate = 1;
            }
            if !self.active.contains_key(&candidate) {
                self.next_packet_id = candidate.wrapping_add(1);
                return Ok(PacketId::new(candidate));
            }
            candidate = candidate.wrapping_add(1);
        }
        Err(Error::new(
            ErrorKind::NoFreePacketId,
            "All packet identifiers are in flight",
        ))
    }

    /// Accept a routed delivery.
    ///
    /// Returns the packet id to send now, or `None` when the window is
    /// saturated and the message went to the backlog.
    ///
    /// # Errors
    ///
    /// Returns `NoFreePacketId` when no identifier can be allocated;
    /// the delivery is dropped in that case.
    pub fn push(&mut self, message: PublishMessage, now: Instant) -> Result<Option<PacketId>, Error> {
        debug_assert!(message.qos() != QoS::AtMostOnce);
        if self.active.len() >= self.max_inflight {
            self.backlog.push_back(message);
            return Ok(None);
        }
        let packet_id = self.allocate_packet_id()?;
        self.insert_entry(packet_id, message, false, now);
        Ok(Some(packet_id))
    }

    fn insert_entry(&mut self, packet_id: PacketId, message: PublishMessage, dup: bool, now: Instant) {
        let entry = InflightMessage {
            packet_id,
            message,
            state: DeliveryState::Pending,
            dup,
            retry_count: 0,
            next_retry_at: now + self.retry_interval,
        };
        self.active.insert(packet_id.value(), entry);
    }

    /// Handle PUBACK. Returns true if a QoS 1 entry completed; duplicate
    /// or unknown acknowledgements are ignored.
    pub fn ack_publish(&mut self, packet_id: PacketId) -> bool {
        match self.active.get(&packet_id.value()) {
            Some(entry)
                if entry.message.qos() == QoS::AtLeastOnce
                    && entry.state == DeliveryState::Pending =>
            {
                self.active.remove(&packet_id.value());
                true
            }
            _ => false,
        }
    }

    /// Handle PUBREC. Returns true if the caller must write a PUBREL.
    /// Duplicate or unknown PUBRECs are ignored, so the state never
    /// moves backward.
    pub fn on_pubrec(&mut self, packet_id: PacketId) -> bool {
        match self.active.get_mut(&packet_id.value()) {
            Some(entry)
                if entry.message.qos() == QoS::ExactOnce
                    && entry.state == DeliveryState::Pending =>
            {
                entry.state = DeliveryState::PubrecReceived;
                true
            }
            _ => false,
        }
    }

    /// Record that the PUBREL for this entry hit the wire. The retry
    /// schedule restarts for the PUBREL phase.
    pub fn pubrel_written(&mut self, packet_id: PacketId, now: Instant) {
        if let Some(entry) = self.active.get_mut(&packet_id.value()) {
            if entry.state == DeliveryState::PubrecReceived {
                entry.state = DeliveryState::PubrelSent;
                entry.retry_count = 0;
                entry.next_retry_at = now + self.retry_interval;
            }
        }
    }

    /// Handle PUBCOMP. Returns true if a QoS 2 entry completed. A
    /// PUBCOMP arriving before the PUBREL went out is ignored.
    pub fn on_pubcomp(&mut self, packet_id: PacketId) -> bool {
        match self.active.get(&packet_id.value()) {
            Some(entry) if entry.state == DeliveryState::PubrelSent => {
                self.active.remove(&packet_id.value());
                true
            }
            _ => false,
        }
    }

    /// Move backlogged deliveries into freed window slots.
    ///
    /// Returns the ids to send now. A delivery that cannot get an id is
    /// dropped and reported in the second list as expired.
    pub fn promote_backlog(&mut self, now: Instant) -> (Vec<PacketId>, Vec<PublishMessage>) {
        let mut to_send = Vec::new();
        let mut dropped = Vec::new();
        while self.active.len() < self.max_inflight {
            let Some(message) = self.backlog.pop_front() else {
                break;
            };
            match self.allocate_packet_id() {
                Ok(packet_id) => {
                    self.insert_entry(packet_id, message, false, now);
                    to_send.push(packet_id);
                }
                Err(_err) => {
                    dropped.push(message);
                }
            }
        }
        (to_send, dropped)
    }

    /// Scan for entries past their retry deadline.
    ///
    /// Entries still under budget get their counter bumped, a linearly
    /// grown deadline, and a resend action. Entries over budget are
    /// removed and returned as expired.
    pub fn due_retransmits(&mut self, now: Instant) -> (Vec<ResendAction>, Vec<InflightMessage>) {
        let mut resend = Vec::new();
        let mut expired_ids = Vec::new();

        for entry in self.active.values_mut() {
            if entry.next_retry_at > now {
                continue;
            }
            if entry.retry_count >= self.max_retries {
                entry.state = DeliveryState::Expired;
                expired_ids.push(entry.packet_id.value());
                continue;
            }
            entry.retry_count += 1;
            entry.next_retry_at =
                now + self.retry_interval * (entry.retry_count + 1);
            match entry.state {
                DeliveryState::Pending => {
                    entry.dup = true;
                    resend.push(ResendAction::Publish(entry.packet_id));
                }
                DeliveryState::PubrecReceived | DeliveryState::PubrelSent => {
                    resend.push(ResendAction::Pubrel(entry.packet_id));
                }
                DeliveryState::Completed | DeliveryState::Expired => {}
            }
        }

        let mut expired = Vec::new();
        for id in expired_ids {
            if let Some(entry) = self.active.remove(&id) {
                expired.push(entry);
            }
        }
        (resend, expired)
    }

    /// Deadline of the earliest pending retransmission, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.active.values().map(|entry| entry.next_retry_at).min()
    }

    /// Tear the queue apart for session caching.
    #[must_use]
    pub fn into_parts(self) -> (u16, Vec<InflightMessage>, VecDeque<PublishMessage>) {
        (
            self.next_packet_id,
            self.active.into_values().collect(),
            self.backlog,
        )
    }

    /// Rebuild the queue from a cached snapshot and compute what must be
    /// retransmitted, in packet id order.
    ///
    /// Unfinished PUBLISH phases are re-sent with DUP=1 [MQTT-4.4.0-1],
    /// unfinished PUBREL phases re-send the PUBREL. Backlogged messages
    /// are then promoted into the remaining window slots as fresh
    /// transmissions.
    pub fn resume(
        &mut self,
        next_packet_id: u16,
        entries: Vec<InflightMessage>,
        backlog: VecDeque<PublishMessage>,
        now: Instant,
    ) -> Vec<ResendAction> {
        self.next_packet_id = if next_packet_id == 0 { 1 } else { next_packet_id };
        self.backlog = backlog;

        let mut actions = Vec::new();
        for mut entry in entries {
            entry.retry_count = 0;
            entry.next_retry_at = now + self.retry_interval;
            match entry.state {
                DeliveryState::Pending => {
                    entry.dup = true;
                    actions.push(ResendAction::Publish(entry.packet_id));
                }
                DeliveryState::PubrecReceived | DeliveryState::PubrelSent => {
                    entry.state = DeliveryState::PubrelSent;
                    actions.push(ResendAction::Pubrel(entry.packet_id));
                }
                DeliveryState::Completed | DeliveryState::Expired => continue,
            }
            self.active.insert(entry.packet_id.value(), entry);
        }

        let (promoted, _dropped) = self.promote_backlog(now);
        actions.extend(promoted.into_iter().map(ResendAction::Publish));
        actions
    }
}
