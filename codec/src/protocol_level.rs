// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;

use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};

/// Revision level of the protocol used by the client [MQTT-3.1.2-2].
///
/// The broker core only speaks 3.1.1 (level 4); the other levels are
/// recognized so the CONNECT handler can refuse them with return code
/// 0x01 instead of treating the packet as malformed.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolLevel {
    V31 = 3,

    #[default]
    V311 = 4,

    V5 = 5,
}

impl ProtocolLevel {
    /// Get byte length in packet.
    #[must_use]
    #[inline]
    pub const fn bytes() -> usize {
        1
    }
}

impl TryFrom<u8> for ProtocolLevel {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            3 => Ok(Self::V31),
            4 => Ok(Self::V311),
            5 => Ok(Self::V5),
            _ => Err(DecodeError::InvalidProtocolLevel),
        }
    }
}

impl DecodePacket for ProtocolLevel {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        Self::try_from(ba.read_byte()?)
    }
}

impl EncodePacket for ProtocolLevel {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.push(*self as u8);
        Ok(Self::bytes())
    }
}
