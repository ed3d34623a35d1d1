// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::io;

use crate::byte_array::ByteArrayError;
use crate::utils::StringError;
use crate::var_int::VarIntError;

/// Errors returned while parsing a control packet from bytes.
///
/// Any of these means the packet is malformed or violates the protocol;
/// the receiver is expected to close the network connection [MQTT-4.8.0-1].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// First byte contains an unknown packet type.
    InvalidPacketType,

    /// Reserved flag bits in the fixed header do not match the values
    /// required for this packet type [MQTT-2.2.2-1].
    InvalidPacketFlags,

    /// Remaining length does not agree with the actual field lengths,
    /// or exceeds the four byte limit.
    InvalidRemainingLength,

    /// Variable byte integer is malformed.
    InvalidVarInt,

    /// Buffer ends before the announced field length.
    OutOfRange,

    /// String field is not well-formed UTF-8, or contains forbidden
    /// code points [MQTT-1.5.3-1].
    InvalidString,

    /// QoS value is not 0, 1 or 2.
    InvalidQoS,

    /// Packet identifier is zero where a non-zero value is required
    /// [MQTT-2.3.1-1].
    InvalidPacketId,

    /// PUBLISH topic name is empty or contains wildcard characters.
    InvalidTopicName,

    /// Topic filter violates the wildcard placement rules.
    InvalidTopicFilter,

    /// SUBSCRIBE/UNSUBSCRIBE payload contains no topic filter
    /// [MQTT-3.8.3-3].
    EmptyTopicFilter,

    /// Protocol name is not "MQTT".
    InvalidProtocolName,

    /// Protocol level is not 3.1, 3.1.1 or 5.0.
    InvalidProtocolLevel,

    /// Reserved bit of connect flags is set, or flag combination is
    /// inconsistent [MQTT-3.1.2-3].
    InvalidConnectFlags,

    /// Client identifier is malformed or missing where required.
    InvalidClientId,
}

impl From<ByteArrayError> for DecodeError {
    fn from(err: ByteArrayError) -> Self {
        match err {
            ByteArrayError::OutOfRange => Self::OutOfRange,
            ByteArrayError::InvalidString(_) => Self::InvalidString,
        }
    }
}

impl From<StringError> for DecodeError {
    fn from(_err: StringError) -> Self {
        Self::InvalidString
    }
}

impl From<VarIntError> for DecodeError {
    fn from(_err: VarIntError) -> Self {
        Self::InvalidVarInt
    }
}

/// Errors returned while serializing a control packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// A field value cannot be represented in the wire format, like
    /// DUP=1 on a QoS 0 publish.
    InvalidData,

    /// Payload or string field exceeds its length limit.
    TooManyData,

    /// Total packet length exceeds the remaining length limit.
    InvalidVarInt,

    /// Topic name or topic filter is invalid.
    InvalidTopic,

    /// Client identifier is invalid.
    InvalidClientId,

    /// Writing to the output buffer failed.
    IoError,
}

impl From<io::Error> for EncodeError {
    fn from(_err: io::Error) -> Self {
        Self::IoError
    }
}

impl From<StringError> for EncodeError {
    fn from(_err: StringError) -> Self {
        Self::TooManyData
    }
}

impl From<VarIntError> for EncodeError {
    fn from(_err: VarIntError) -> Self {
        Self::InvalidVarInt
    }
}
