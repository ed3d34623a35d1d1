// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use byteorder::{BigEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::cmp;
use std::convert::TryFrom;
use std::fmt;

use crate::{ByteArray, DecodeError, EncodeError};

/// Protocol name is fixed in the CONNECT variable header [MQTT-3.1.2-1].
pub const PROTOCOL_NAME: &str = "MQTT";

/// Convert a packet or packet field into its network byte representation.
pub trait EncodePacket {
    /// Append the encoded form of `self` to `buf`, returning the number of
    /// bytes written.
    ///
    /// # Errors
    ///
    /// Returns error if a field exceeds its wire-format limits.
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError>;
}

/// Parse a packet or packet field from a byte stream.
pub trait DecodePacket: Sized {
    /// Read one value from `ba`, advancing its cursor.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are malformed or truncated.
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError>;
}

/// Packet identifier used to correlate PUBLISH/SUBSCRIBE/UNSUBSCRIBE packets
/// with their acknowledgements.
///
/// SUBSCRIBE, UNSUBSCRIBE, and PUBLISH (in cases where QoS > 0) Control
/// Packets MUST contain a non-zero 16-bit Packet Identifier [MQTT-2.3.1-1].
/// The reserved value 0 is only used internally for QoS 0 publishes, which
/// carry no identifier on the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketId(u16);

impl PacketId {
    /// Create a new packet identifier.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get inner u16 value.
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.0
    }

    /// Get byte length in packet.
    #[must_use]
    #[inline]
    pub const fn bytes() -> usize {
        2
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for PacketId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl cmp::PartialEq<u16> for PacketId {
    fn eq(&self, value: &u16) -> bool {
        self.0 == *value
    }
}

impl DecodePacket for PacketId {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let value = ba.read_u16()?;
        Ok(Self(value))
    }
}

impl EncodePacket for PacketId {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.write_u16::<BigEndian>(self.0)?;
        Ok(Self::bytes())
    }
}

/// Quality of service level of message delivery.
///
/// The ordering of variants follows the numeric level, so
/// `publish_qos.min(subscribe_qos)` yields the effective QoS directly.
#[repr(u8)]
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum QoS {
    /// At most once delivery. No acknowledgement, no retry.
    #[default]
    AtMostOnce = 0,

    /// At least once delivery, acknowledged with PUBACK.
    AtLeastOnce = 1,

    /// Exactly once delivery, via the PUBREC/PUBREL/PUBCOMP handshake.
    ExactOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactOnce),
            _ => Err(DecodeError::InvalidQoS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_ordering() {
        assert!(QoS::AtMostOnce < QoS::AtLeastOnce);
        assert!(QoS::AtLeastOnce < QoS::ExactOnce);
        assert_eq!(QoS::ExactOnce.min(QoS::AtLeastOnce), QoS::AtLeastOnce);
    }

    #[test]
    fn test_qos_from_u8() {
        assert_eq!(QoS::try_from(1).unwrap(), QoS::AtLeastOnce);
        assert!(QoS::try_from(3).is_err());
    }

    #[test]
    fn test_packet_id_round_trip() {
        let mut buf = Vec::new();
        let packet_id = PacketId::new(0x1234);
        packet_id.encode(&mut buf).unwrap();
        assert_eq!(&buf, &[0x12, 0x34]);

        let mut ba = ByteArray::new(&buf);
        assert_eq!(PacketId::decode(&mut ba).unwrap(), packet_id);
    }
}
