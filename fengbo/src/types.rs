// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use bytes::Bytes;
use codec::v3::PublishPacket;
use codec::{EncodeError, PacketId, QoS};

pub type ListenerId = u32;
pub type SessionId = u64;

/// Global session id, a (listener id, session id) pair.
///
/// Session ids are allocated per listener, so the pair is what uniquely
/// names an attachment across the whole broker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionGid {
    listener_id: ListenerId,
    session_id: SessionId,
}

impl SessionGid {
    #[must_use]
    pub const fn new(listener_id: ListenerId, session_id: SessionId) -> Self {
        Self {
            listener_id,
            session_id,
        }
    }

    #[must_use]
    pub const fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }
}

/// An application message on its way to one subscriber.
///
/// The router produces one of these per matching subscription, with
/// `qos` already downgraded to `min(publish_qos, subscribe_qos)`. The
/// packet identifier is assigned later, by the session that owns the
/// delivery, because identifiers are scoped per client connection.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishMessage {
    topic: String,
    payload: Bytes,
    qos: QoS,

    /// Kept set only on retained snapshots replayed in response to a
    /// new subscription [MQTT-3.3.1-8]; regular routed deliveries have
    /// it cleared [MQTT-3.3.1-9].
    retain: bool,
}

impl PublishMessage {
    #[must_use]
    pub const fn new(topic: String, payload: Bytes, qos: QoS, retain: bool) -> Self {
        Self {
            topic,
            payload,
            qos,
            retain,
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub const fn qos(&self) -> QoS {
        self.qos
    }

    #[must_use]
    pub const fn retain(&self) -> bool {
        self.retain
    }

    /// Build the wire packet for this delivery.
    ///
    /// # Errors
    ///
    /// Returns error if the topic is no longer a valid topic name.
    pub fn to_packet(&self, packet_id: PacketId) -> Result<PublishPacket, EncodeError> {
        let mut packet = PublishPacket::new(&self.topic, self.qos, &self.payload)?;
        packet.set_retain(self.retain);
        if self.qos != QoS::AtMostOnce {
            packet.set_packet_id(packet_id);
        }
        Ok(packet)
    }
}
