// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use bytes::Bytes;
use std::io::Write;

use crate::{
    ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, FixedHeader, Packet, PacketId,
    PacketType, PubTopic, QoS, VarIntError,
};

/// Application message, sent from client to broker or broker to client.
///
/// ```txt
///  7                     0
/// +-----------------------+
/// | Fixed header          |
/// |                       |
/// +-----------------------+
/// | Topic name            |
/// |                       |
/// +-----------------------+
/// | Packet identifier     |
/// |                       |
/// +-----------------------+
/// | Payload ...           |
/// +-----------------------+
/// ```
///
/// The packet identifier is only present when QoS is 1 or 2. The
/// expected response is nothing for QoS 0, PUBACK for QoS 1 and PUBREC
/// for QoS 2.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PublishPacket {
    /// False on the first delivery attempt of this packet, true on
    /// re-deliveries. Always false when QoS is 0 [MQTT-3.3.1-2].
    dup: bool,

    qos: QoS,

    /// When true on an inbound publish, the broker stores the message
    /// as the retained message of the topic; an empty payload deletes
    /// the retained entry [MQTT-3.3.1-10]. When true on an outbound
    /// publish, the message is a retained snapshot replayed because of
    /// a new subscription [MQTT-3.3.1-8].
    retain: bool,

    topic: PubTopic,

    packet_id: PacketId,

    payload: Bytes,
}

impl PublishPacket {
    /// Create a publish packet.
    ///
    /// # Errors
    ///
    /// Returns error if `topic` is empty or contains wildcards.
    pub fn new(topic: &str, qos: QoS, payload: &[u8]) -> Result<Self, EncodeError> {
        let topic = PubTopic::new(topic)?;
        Ok(Self {
            dup: false,
            qos,
            retain: false,
            topic,
            packet_id: PacketId::new(0),
            payload: Bytes::copy_from_slice(payload),
        })
    }

    pub fn set_retain(&mut self, retain: bool) -> &mut Self {
        self.retain = retain;
        self
    }

    #[must_use]
    pub const fn retain(&self) -> bool {
        self.retain
    }

    /// Update the `dup` flag.
    ///
    /// # Errors
    ///
    /// Returns error when setting `dup` on a QoS 0 packet [MQTT-3.3.1-2].
    pub fn set_dup(&mut self, dup: bool) -> Result<&mut Self, EncodeError> {
        if dup && self.qos == QoS::AtMostOnce {
            return Err(EncodeError::InvalidData);
        }
        self.dup = dup;
        Ok(self)
    }

    #[must_use]
    pub const fn dup(&self) -> bool {
        self.dup
    }

    pub fn set_qos(&mut self, qos: QoS) -> &mut Self {
        if qos == QoS::AtMostOnce {
            self.packet_id = PacketId::new(0);
            self.dup = false;
        }
        self.qos = qos;
        self
    }

    #[must_use]
    pub const fn qos(&self) -> QoS {
        self.qos
    }

    pub fn set_packet_id(&mut self, packet_id: PacketId) -> &mut Self {
        self.packet_id = packet_id;
        self
    }

    #[must_use]
    pub const fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        self.topic.as_ref()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get a cheap reference-counted handle on the payload.
    #[must_use]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    fn get_fixed_header(&self) -> Result<FixedHeader, VarIntError> {
        let mut remaining_length = self.topic.bytes() + self.payload.len();
        if self.qos != QoS::AtMostOnce {
            remaining_length += PacketId::bytes();
        }
        let packet_type = PacketType::Publish {
            dup: self.dup,
            qos: self.qos,
            retain: self.retain,
        };
        FixedHeader::new(packet_type, remaining_length)
    }
}

impl DecodePacket for PublishPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let PacketType::Publish { dup, qos, retain } = fixed_header.packet_type() else {
            return Err(DecodeError::InvalidPacketType);
        };

        let topic = PubTopic::decode(ba)?;

        let packet_id = if qos == QoS::AtMostOnce {
            PacketId::new(0)
        } else {
            let packet_id = PacketId::decode(ba)?;
            // PUBLISH (in cases where QoS > 0) MUST contain a non-zero
            // Packet Identifier [MQTT-2.3.1-1].
            if packet_id.value() == 0 {
                return Err(DecodeError::InvalidPacketId);
            }
            packet_id
        };

        // Zero length payloads are valid.
        let mut payload_len = fixed_header
            .remaining_length()
            .checked_sub(topic.bytes())
            .ok_or(DecodeError::InvalidRemainingLength)?;
        if qos != QoS::AtMostOnce {
            payload_len = payload_len
                .checked_sub(PacketId::bytes())
                .ok_or(DecodeError::InvalidRemainingLength)?;
        }

        let payload = Bytes::copy_from_slice(ba.read_bytes(payload_len)?);
        Ok(Self {
            dup,
            qos,
            retain,
            topic,
            packet_id,
            payload,
        })
    }
}

impl EncodePacket for PublishPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let old_len = buf.len();

        let fixed_header = self.get_fixed_header()?;
        fixed_header.encode(buf)?;

        self.topic.encode(buf)?;
        if self.qos != QoS::AtMostOnce {
            self.packet_id.encode(buf)?;
        }
        buf.write_all(&self.payload)?;

        Ok(buf.len() - old_len)
    }
}

impl Packet for PublishPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Publish {
            dup: self.dup,
            qos: self.qos,
            retain: self.retain,
        }
    }

    fn bytes(&self) -> Result<usize, VarIntError> {
        let fixed_header = self.get_fixed_header()?;
        Ok(fixed_header.bytes() + fixed_header.remaining_length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos0_round_trip() {
        let mut packet = PublishPacket::new("sensors/temp", QoS::AtMostOnce, b"23").unwrap();
        packet.set_retain(true);

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        assert_eq!(buf[0], 0x31);

        let mut ba = ByteArray::new(&buf);
        let decoded = PublishPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.packet_id(), PacketId::new(0));
    }

    #[test]
    fn test_qos2_round_trip() {
        let mut packet = PublishPacket::new("sensors/temp", QoS::ExactOnce, b"23").unwrap();
        packet.set_packet_id(PacketId::new(7));
        packet.set_dup(true).unwrap();

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded = PublishPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
        assert!(decoded.dup());
        assert_eq!(decoded.packet_id(), PacketId::new(7));
    }

    #[test]
    fn test_zero_packet_id_rejected() {
        let buf = [
            0x32, 0x0a, 0x00, 0x04, b't', b'e', b's', b't', 0x00, 0x00, b'h', b'i',
        ];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            PublishPacket::decode(&mut ba),
            Err(DecodeError::InvalidPacketId)
        );
    }

    #[test]
    fn test_wildcard_topic_rejected() {
        let buf = [0x30, 0x06, 0x00, 0x03, b'a', b'/', b'#', b'x'];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            PublishPacket::decode(&mut ba),
            Err(DecodeError::InvalidTopicName)
        );
    }

    #[test]
    fn test_empty_payload() {
        let packet = PublishPacket::new("status", QoS::AtMostOnce, b"").unwrap();
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded = PublishPacket::decode(&mut ba).unwrap();
        assert!(decoded.payload().is_empty());
    }
}
