// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use std::io::Write;

use crate::utils::MAX_FIELD_LENGTH;
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};

/// Binary field, a two byte big-endian length followed by that many raw
/// bytes [MQTT-1.5.4]. Used for the will payload and the password.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BinaryData(Bytes);

impl BinaryData {
    /// Create an empty binary field.
    #[must_use]
    pub const fn new() -> Self {
        Self(Bytes::new())
    }

    /// Copy a byte slice into a binary field.
    ///
    /// # Errors
    ///
    /// Returns error if `data` exceeds the u16 length prefix.
    pub fn from_slice(data: &[u8]) -> Result<Self, EncodeError> {
        if data.len() > MAX_FIELD_LENGTH {
            return Err(EncodeError::TooManyData);
        }
        Ok(Self(Bytes::copy_from_slice(data)))
    }

    /// Get byte length in packet, including the length prefix.
    #[must_use]
    pub fn bytes(&self) -> usize {
        2 + self.0.len()
    }

    /// Returns true if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for BinaryData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl DecodePacket for BinaryData {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let len = ba.read_u16()?;
        let data = ba.read_bytes(usize::from(len))?;
        Ok(Self(Bytes::copy_from_slice(data)))
    }
}

impl EncodePacket for BinaryData {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        #[allow(clippy::cast_possible_truncation)]
        let len = self.0.len() as u16;
        buf.write_u16::<BigEndian>(len)?;
        buf.write_all(&self.0)?;
        Ok(self.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut buf = Vec::new();
        let data = BinaryData::from_slice(b"bye").unwrap();
        data.encode(&mut buf).unwrap();
        assert_eq!(&buf, &[0x00, 0x03, b'b', b'y', b'e']);

        let mut ba = ByteArray::new(&buf);
        assert_eq!(BinaryData::decode(&mut ba).unwrap(), data);
    }
}
