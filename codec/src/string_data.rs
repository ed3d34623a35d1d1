// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use byteorder::{BigEndian, WriteBytesExt};
use std::fmt;
use std::io::Write;

use crate::utils::{validate_utf8_string, StringError};
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};

/// UTF-8 string field, represented on the wire by a two byte big-endian
/// length followed by the character data [MQTT-1.5.3].
///
/// ```txt
/// +-------------------+
/// | String Length     |
/// |                   |
/// +-------------------+
/// | String bytes ...  |
/// +-------------------+
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringData(String);

impl StringData {
    /// Create an empty string field.
    #[must_use]
    pub const fn new() -> Self {
        Self(String::new())
    }

    /// Convert a string slice into a string field.
    ///
    /// # Errors
    ///
    /// Returns error if `s` is oversize or contains forbidden characters.
    pub fn from(s: &str) -> Result<Self, StringError> {
        validate_utf8_string(s)?;
        Ok(Self(s.to_string()))
    }

    /// Get byte length in packet, including the length prefix.
    #[must_use]
    pub fn bytes(&self) -> usize {
        2 + self.0.len()
    }

    /// Returns true if the string is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StringData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for StringData {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl DecodePacket for StringData {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let len = ba.read_u16()?;
        let s = ba.read_string(usize::from(len))?;
        Ok(Self(s))
    }
}

impl EncodePacket for StringData {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        #[allow(clippy::cast_possible_truncation)]
        let len = self.0.len() as u16;
        buf.write_u16::<BigEndian>(len)?;
        buf.write_all(self.0.as_bytes())?;
        Ok(self.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut buf = Vec::new();
        let s = StringData::from("status").unwrap();
        s.encode(&mut buf).unwrap();
        assert_eq!(&buf[..2], &[0x00, 0x06]);

        let mut ba = ByteArray::new(&buf);
        assert_eq!(StringData::decode(&mut ba).unwrap(), s);
    }

    #[test]
    fn test_invalid_utf8() {
        let buf = [0x00, 0x02, 0xc3, 0x28];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            StringData::decode(&mut ba),
            Err(DecodeError::InvalidString)
        );
    }
}
