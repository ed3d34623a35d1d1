// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;
use std::fmt;

use crate::{
    ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, QoS, VarInt, VarIntError,
};

/// Common interface of all control packets.
pub trait Packet: Send + fmt::Debug {
    fn packet_type(&self) -> PacketType;

    /// Total byte length of the encoded packet.
    ///
    /// # Errors
    ///
    /// Returns error if the packet exceeds the remaining-length limit.
    fn bytes(&self) -> Result<usize, VarIntError>;
}

/// Control packet type with its flag bits.
///
/// PUBLISH is the only type whose low nibble carries data; for every
/// other type the flags are reserved and checked against their required
/// values on decode [MQTT-2.2.2-1].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Client request to connect to the broker.
    #[default]
    Connect,

    /// Broker reply to a connect request.
    ConnectAck,

    /// Application message, in either direction.
    Publish { dup: bool, qos: QoS, retain: bool },

    /// QoS 1 publish acknowledgement.
    PublishAck,

    /// QoS 2 delivery, part one.
    PublishReceived,

    /// QoS 2 delivery, part two.
    PublishRelease,

    /// QoS 2 delivery, part three.
    PublishComplete,

    /// Client subscribe request.
    Subscribe,

    /// Subscribe acknowledgement.
    SubscribeAck,

    /// Client unsubscribe request.
    Unsubscribe,

    /// Unsubscribe acknowledgement.
    UnsubscribeAck,

    /// Client ping request.
    PingRequest,

    /// Broker ping response.
    PingResponse,

    /// Client is disconnecting cleanly.
    Disconnect,
}

impl PacketType {
    /// Get byte length in packet.
    #[must_use]
    pub const fn bytes() -> usize {
        1
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        let type_bits: u8 = match packet_type {
            PacketType::Connect => 1,
            PacketType::ConnectAck => 2,
            PacketType::Publish { .. } => 3,
            PacketType::PublishAck => 4,
            PacketType::PublishReceived => 5,
            PacketType::PublishRelease => 6,
            PacketType::PublishComplete => 7,
            PacketType::Subscribe => 8,
            PacketType::SubscribeAck => 9,
            PacketType::Unsubscribe => 10,
            PacketType::UnsubscribeAck => 11,
            PacketType::PingRequest => 12,
            PacketType::PingResponse => 13,
            PacketType::Disconnect => 14,
        };

        let flag_bits: u8 = match packet_type {
            PacketType::Publish { dup, qos, retain } => {
                let dup = if dup { 0b0000_1000 } else { 0 };
                let retain = u8::from(retain);
                dup | ((qos as u8) << 1) | retain
            }
            // Bits 3,2,1,0 of PUBREL, SUBSCRIBE and UNSUBSCRIBE are
            // reserved and MUST be set to 0,0,1,0 [MQTT-3.6.1-1]
            // [MQTT-3.8.1-1] [MQTT-3.10.1-1].
            PacketType::PublishRelease | PacketType::Subscribe | PacketType::Unsubscribe => {
                0b0000_0010
            }
            _ => 0,
        };

        (type_bits << 4) | flag_bits
    }
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    /// Parse the type/flags byte.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPacketType` for unknown type bits and
    /// `InvalidPacketFlags` when reserved flags do not hold their
    /// required values; the receiver MUST close the connection in that
    /// case [MQTT-2.2.2-2].
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        let type_bits = (v & 0b1111_0000) >> 4;
        let flag = v & 0b0000_1111;

        if type_bits == 3 {
            let dup = flag & 0b0000_1000 != 0;
            let retain = flag & 0b0000_0001 != 0;
            let qos = match flag & 0b0000_0110 {
                0b0000_0000 => QoS::AtMostOnce,
                0b0000_0010 => QoS::AtLeastOnce,
                0b0000_0100 => QoS::ExactOnce,
                _ => return Err(DecodeError::InvalidPacketFlags),
            };
            // The DUP flag MUST be set to 0 for all QoS 0 messages
            // [MQTT-3.3.1-2].
            if dup && qos == QoS::AtMostOnce {
                return Err(DecodeError::InvalidPacketFlags);
            }
            return Ok(Self::Publish { dup, qos, retain });
        }

        let (packet_type, expected_flag) = match type_bits {
            1 => (Self::Connect, 0),
            2 => (Self::ConnectAck, 0),
            4 => (Self::PublishAck, 0),
            5 => (Self::PublishReceived, 0),
            6 => (Self::PublishRelease, 0b0000_0010),
            7 => (Self::PublishComplete, 0),
            8 => (Self::Subscribe, 0b0000_0010),
            9 => (Self::SubscribeAck, 0),
            10 => (Self::Unsubscribe, 0b0000_0010),
            11 => (Self::UnsubscribeAck, 0),
            12 => (Self::PingRequest, 0),
            13 => (Self::PingResponse, 0),
            14 => (Self::Disconnect, 0),
            _ => return Err(DecodeError::InvalidPacketType),
        };

        if flag != expected_flag {
            log::error!("header: invalid flags {flag:#06b} for {packet_type:?}");
            return Err(DecodeError::InvalidPacketFlags);
        }
        Ok(packet_type)
    }
}

/// Fixed header of a control packet, at least two bytes:
///
/// ```txt
///  7 6 5 4 3 2 1 0
/// +-------+-------+
/// | Type  | Flags |
/// +-------+-------+
/// | Remaining Len |
/// +-------+-------+
/// ```
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    packet_type: PacketType,
    remaining_length: VarInt,
}

impl FixedHeader {
    /// Create a new fixed header.
    ///
    /// # Errors
    ///
    /// Returns error if `remaining_length` exceeds the four byte limit.
    pub const fn new(packet_type: PacketType, remaining_length: usize) -> Result<Self, VarIntError> {
        let remaining_length = match VarInt::from(remaining_length) {
            Ok(v) => v,
            Err(err) => return Err(err),
        };
        Ok(Self {
            packet_type,
            remaining_length,
        })
    }

    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    #[must_use]
    pub const fn remaining_length(&self) -> usize {
        self.remaining_length.value()
    }

    /// Get byte length in packet.
    #[must_use]
    pub const fn bytes(&self) -> usize {
        PacketType::bytes() + self.remaining_length.bytes()
    }
}

impl DecodePacket for FixedHeader {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let flag = ba.read_byte()?;
        let packet_type = PacketType::try_from(flag)?;
        let remaining_length = VarInt::decode(ba)?;
        Ok(Self {
            packet_type,
            remaining_length,
        })
    }
}

impl EncodePacket for FixedHeader {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.push(self.packet_type.into());
        self.remaining_length.encode(buf)?;
        Ok(self.bytes())
    }
}
