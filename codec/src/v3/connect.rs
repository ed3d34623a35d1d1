// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;

use crate::utils::validate_client_id;
use crate::{
    BinaryData, ByteArray, ConnectFlags, DecodeError, DecodePacket, EncodeError, EncodePacket,
    FixedHeader, Packet, PacketId, PacketType, ProtocolLevel, PubTopic, QoS, StringData,
    VarIntError, PROTOCOL_NAME,
};

/// First packet sent from the client after the network connection is
/// established [MQTT-3.1.0-1].
///
/// ```txt
///  7                          0
/// +----------------------------+
/// | Fixed header               |
/// |                            |
/// +----------------------------+
/// | Protocol name              |
/// |                            |
/// +----------------------------+
/// | Protocol level             |
/// +----------------------------+
/// | Connect flags              |
/// +----------------------------+
/// | Keep alive                 |
/// |                            |
/// +----------------------------+
/// | Client id                  |
/// |                            |
/// +----------------------------+
/// | Will topic (optional)      |
/// +----------------------------+
/// | Will payload (optional)    |
/// +----------------------------+
/// | Username (optional)        |
/// +----------------------------+
/// | Password (optional)        |
/// +----------------------------+
/// ```
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConnectPacket {
    protocol_level: ProtocolLevel,

    connect_flags: ConnectFlags,

    /// Maximum number of seconds permitted between two control packets
    /// from the client. Zero turns the keep alive mechanism off
    /// [MQTT-3.1.2-24].
    keep_alive: u16,

    client_id: StringData,

    will_topic: Option<PubTopic>,

    will_payload: BinaryData,

    username: StringData,

    password: BinaryData,
}

impl ConnectPacket {
    /// Create a connect packet with `client_id` and default flags.
    ///
    /// # Errors
    ///
    /// Returns error if `client_id` is invalid.
    pub fn new(client_id: &str) -> Result<Self, EncodeError> {
        validate_client_id(client_id).map_err(|_err| EncodeError::InvalidClientId)?;
        let client_id = StringData::from(client_id).map_err(|_err| EncodeError::InvalidClientId)?;
        Ok(Self {
            keep_alive: 60,
            client_id,
            ..Self::default()
        })
    }

    #[must_use]
    #[inline]
    pub const fn protocol_level(&self) -> ProtocolLevel {
        self.protocol_level
    }

    pub fn set_connect_flags(&mut self, flags: ConnectFlags) -> &mut Self {
        self.connect_flags = flags;
        self
    }

    #[must_use]
    #[inline]
    pub const fn connect_flags(&self) -> &ConnectFlags {
        &self.connect_flags
    }

    pub fn set_keep_alive(&mut self, keep_alive: u16) -> &mut Self {
        self.keep_alive = keep_alive;
        self
    }

    #[must_use]
    #[inline]
    pub const fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    /// Replace the client id.
    ///
    /// # Errors
    ///
    /// Returns error if `client_id` is invalid.
    pub fn set_client_id(&mut self, client_id: &str) -> Result<&mut Self, EncodeError> {
        validate_client_id(client_id).map_err(|_err| EncodeError::InvalidClientId)?;
        self.client_id = StringData::from(client_id).map_err(|_err| EncodeError::InvalidClientId)?;
        Ok(self)
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client_id.as_ref()
    }

    /// Register a will message carried in the payload.
    ///
    /// # Errors
    ///
    /// Returns error if the topic is invalid or the payload too large.
    pub fn set_will(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<&mut Self, EncodeError> {
        self.will_topic = Some(PubTopic::new(topic)?);
        self.will_payload = BinaryData::from_slice(payload)?;
        self.connect_flags
            .set_will(true)
            .set_will_qos(qos)
            .set_will_retain(retain);
        Ok(self)
    }

    #[must_use]
    pub fn will_topic(&self) -> Option<&str> {
        self.will_topic.as_ref().map(AsRef::as_ref)
    }

    #[must_use]
    pub fn will_payload(&self) -> &[u8] {
        self.will_payload.as_ref()
    }

    /// Set username and mark its flag.
    ///
    /// # Errors
    ///
    /// Returns error if `username` is not a valid string field.
    pub fn set_username(&mut self, username: &str) -> Result<&mut Self, EncodeError> {
        self.username = StringData::from(username)?;
        self.connect_flags.set_has_username(true);
        Ok(self)
    }

    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_ref()
    }

    /// Set password and mark its flag.
    ///
    /// # Errors
    ///
    /// Returns error if `password` is too large.
    pub fn set_password(&mut self, password: &[u8]) -> Result<&mut Self, EncodeError> {
        self.password = BinaryData::from_slice(password)?;
        self.connect_flags.set_has_password(true);
        Ok(self)
    }

    #[must_use]
    pub fn password(&self) -> &[u8] {
        self.password.as_ref()
    }

    fn get_fixed_header(&self) -> Result<FixedHeader, VarIntError> {
        let mut remaining_length = 2 + PROTOCOL_NAME.len()
            + ProtocolLevel::bytes()
            + ConnectFlags::bytes()
            + PacketId::bytes()
            + self.client_id.bytes();

        if self.connect_flags.will() {
            if let Some(will_topic) = &self.will_topic {
                remaining_length += will_topic.bytes();
            }
            remaining_length += self.will_payload.bytes();
        }
        if self.connect_flags.has_username() {
            remaining_length += self.username.bytes();
        }
        if self.connect_flags.has_password() {
            remaining_length += self.password.bytes();
        }
        FixedHeader::new(PacketType::Connect, remaining_length)
    }
}

impl EncodePacket for ConnectPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let old_len = buf.len();

        let fixed_header = self.get_fixed_header()?;
        fixed_header.encode(buf)?;

        let protocol_name = StringData::from(PROTOCOL_NAME)?;
        protocol_name.encode(buf)?;
        self.protocol_level.encode(buf)?;
        self.connect_flags.encode(buf)?;
        buf.extend_from_slice(&self.keep_alive.to_be_bytes());

        self.client_id.encode(buf)?;
        if self.connect_flags.will() {
            if let Some(will_topic) = &self.will_topic {
                will_topic.encode(buf)?;
            }
            self.will_payload.encode(buf)?;
        }
        if self.connect_flags.has_username() {
            self.username.encode(buf)?;
        }
        if self.connect_flags.has_password() {
            self.password.encode(buf)?;
        }

        Ok(buf.len() - old_len)
    }
}

impl DecodePacket for ConnectPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::Connect {
            return Err(DecodeError::InvalidPacketType);
        }

        let protocol_name = StringData::decode(ba)?;
        if protocol_name.as_ref() != PROTOCOL_NAME {
            return Err(DecodeError::InvalidProtocolName);
        }

        let protocol_level = ProtocolLevel::try_from(ba.read_byte()?)?;
        let connect_flags = ConnectFlags::decode(ba)?;
        let keep_alive = ba.read_u16()?;

        let client_id = StringData::decode(ba).map_err(|_err| DecodeError::InvalidClientId)?;

        // If the Client supplies a zero-byte ClientId, the Client MUST
        // also set CleanSession to 1 [MQTT-3.1.3-7].
        if client_id.is_empty() && !connect_flags.clean_session() {
            return Err(DecodeError::InvalidClientId);
        }

        let (will_topic, will_payload) = if connect_flags.will() {
            (Some(PubTopic::decode(ba)?), BinaryData::decode(ba)?)
        } else {
            (None, BinaryData::new())
        };

        let username = if connect_flags.has_username() {
            StringData::decode(ba)?
        } else {
            StringData::new()
        };
        let password = if connect_flags.has_password() {
            BinaryData::decode(ba)?
        } else {
            BinaryData::new()
        };

        Ok(Self {
            protocol_level,
            connect_flags,
            keep_alive,
            client_id,
            will_topic,
            will_payload,
            username,
            password,
        })
    }
}

impl Packet for ConnectPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Connect
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
    fn test_decode() {
        let buf: Vec<u8> = vec![
            0x10, 0x14, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3c, 0x00, 0x08,
            b'w', b'v', b'P', b'T', b'X', b'c', b'C', b'w',
        ];
        let mut ba = ByteArray::new(&buf);
        let packet = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(packet.client_id(), "wvPTXcCw");
        assert_eq!(packet.keep_alive(), 60);
        assert!(packet.connect_flags().clean_session());
    }

    #[test]
    fn test_round_trip_with_will() {
        let mut packet = ConnectPacket::new("c1").unwrap();
        packet.set_keep_alive(2);
        packet
            .set_will("c/down", b"bye", QoS::AtLeastOnce, false)
            .unwrap();
        let mut flags = packet.connect_flags().clone();
        flags.set_clean_session(false);
        packet.set_connect_flags(flags);

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.will_topic(), Some("c/down"));
        assert_eq!(decoded.will_payload(), b"bye");
        assert_eq!(decoded.connect_flags().will_qos(), QoS::AtLeastOnce);
    }

    #[test]
    fn test_empty_client_id_requires_clean_session() {
        // client id "" with clean_session=0 is rejected [MQTT-3.1.3-8].
        let buf: Vec<u8> = vec![
            0x10, 0x0c, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x00, 0x00, 0x3c, 0x00, 0x00,
        ];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            ConnectPacket::decode(&mut ba),
            Err(DecodeError::InvalidClientId)
        );
    }

    #[test]
    fn test_bad_protocol_name() {
        let buf: Vec<u8> = vec![
            0x10, 0x14, 0x00, 0x04, b'M', b'Q', b'T', b'X', 0x04, 0x02, 0x00, 0x3c, 0x00, 0x08,
            b'w', b'v', b'P', b'T', b'X', b'c', b'C', b'w',
        ];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            ConnectPacket::decode(&mut ba),
            Err(DecodeError::InvalidProtocolName)
        );
    }
}
