// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::{
    ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, FixedHeader, Packet, PacketId,
    PacketType, QoS, VarIntError,
};

/// Per-filter result code in a SUBACK payload.
///
/// 0x00, 0x01 and 0x02 grant the corresponding maximum QoS; 0x80 marks
/// the subscription as failed [MQTT-3.9.3].
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeAck {
    QoS(QoS),
    Failed,
}

impl SubscribeAck {
    #[must_use]
    pub const fn value(&self) -> u8 {
        match self {
            Self::QoS(qos) => *qos as u8,
            Self::Failed => 0x80,
        }
    }
}

impl TryFrom<u8> for SubscribeAck {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::QoS(QoS::AtMostOnce)),
            1 => Ok(Self::QoS(QoS::AtLeastOnce)),
            2 => Ok(Self::QoS(QoS::ExactOnce)),
            0x80 => Ok(Self::Failed),
            _ => Err(DecodeError::InvalidQoS),
        }
    }
}

/// Broker response to a SUBSCRIBE packet, carrying one return code per
/// requested filter, in the same order [MQTT-3.8.4-2] [MQTT-3.9.3-1].
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscribeAckPacket {
    packet_id: PacketId,
    acknowledgements: Vec<SubscribeAck>,
}

impl SubscribeAckPacket {
    #[must_use]
    pub fn new(packet_id: PacketId, ack: SubscribeAck) -> Self {
        Self {
            packet_id,
            acknowledgements: vec![ack],
        }
    }

    #[must_use]
    pub fn with_vec(packet_id: PacketId, acknowledgements: Vec<SubscribeAck>) -> Self {
        Self {
            packet_id,
            acknowledgements,
        }
    }

    #[must_use]
    pub const fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    #[must_use]
    pub fn acknowledgements(&self) -> &[SubscribeAck] {
        &self.acknowledgements
    }

    fn get_fixed_header(&self) -> Result<FixedHeader, VarIntError> {
        FixedHeader::new(
            PacketType::SubscribeAck,
            PacketId::bytes() + self.acknowledgements.len(),
        )
    }
}

impl DecodePacket for SubscribeAckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::SubscribeAck {
            return Err(DecodeError::InvalidPacketType);
        }
        if fixed_header.remaining_length() <= PacketId::bytes() {
            return Err(DecodeError::InvalidRemainingLength);
        }

        let packet_id = PacketId::decode(ba)?;
        let count = fixed_header.remaining_length() - PacketId::bytes();
        let mut acknowledgements = Vec::with_capacity(count);
        for _ in 0..count {
            acknowledgements.push(SubscribeAck::try_from(ba.read_byte()?)?);
        }

        Ok(Self {
            packet_id,
            acknowledgements,
        })
    }
}

impl EncodePacket for SubscribeAckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let old_len = buf.len();
        let fixed_header = self.get_fixed_header()?;
        fixed_header.encode(buf)?;
        self.packet_id.encode(buf)?;
        for ack in &self.acknowledgements {
            buf.push(ack.value());
        }
        Ok(buf.len() - old_len)
    }
}

impl Packet for SubscribeAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::SubscribeAck
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
    fn test_round_trip() {
        let packet = SubscribeAckPacket::with_vec(
            PacketId::new(1),
            vec![
                SubscribeAck::QoS(QoS::AtLeastOnce),
                SubscribeAck::Failed,
                SubscribeAck::QoS(QoS::ExactOnce),
            ],
        );
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        assert_eq!(&buf, &[0x90, 0x05, 0x00, 0x01, 0x01, 0x80, 0x02]);

        let mut ba = ByteArray::new(&buf);
        assert_eq!(SubscribeAckPacket::decode(&mut ba).unwrap(), packet);
    }
}
