// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! String validation helpers shared by packet field types.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

/// Length prefix of strings and binary fields is a u16.
pub const MAX_FIELD_LENGTH: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringError {
    /// Length of data exceeds the u16 length prefix.
    TooLong,

    /// Not well-formed UTF-8, or contains U+0000 [MQTT-1.5.3-2].
    InvalidChars,
}

/// Check that `s` may be encoded as a UTF-8 string field.
///
/// The character data MUST be well-formed UTF-8 and MUST NOT include an
/// encoding of the null character U+0000 [MQTT-1.5.3-1] [MQTT-1.5.3-2].
///
/// # Errors
///
/// Returns error if `s` is oversize or contains a NUL character.
pub fn validate_utf8_string(s: &str) -> Result<(), StringError> {
    if s.len() > MAX_FIELD_LENGTH {
        return Err(StringError::TooLong);
    }
    if s.chars().any(|c| c == '\u{0000}') {
        return Err(StringError::InvalidChars);
    }
    Ok(())
}

/// Convert raw bytes into a validated UTF-8 string.
///
/// # Errors
///
/// Returns error if the bytes are not well-formed UTF-8 or contain NUL.
pub fn to_utf8_string(bytes: &[u8]) -> Result<String, StringError> {
    let s = String::from_utf8(bytes.to_vec()).map_err(|_err| StringError::InvalidChars)?;
    validate_utf8_string(&s)?;
    Ok(s)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIdError {
    IsEmpty,
    TooLong,
}

/// Longest client identifier the broker accepts.
///
/// The protocol only requires support for 23 bytes [MQTT-3.1.3-5], but
/// real deployments use longer ids, so the limit is relaxed here.
pub const MAX_CLIENT_ID_LENGTH: usize = 256;

/// Check length constraints of a client identifier.
///
/// # Errors
///
/// Returns error if `client_id` is empty or too long.
pub fn validate_client_id(client_id: &str) -> Result<(), ClientIdError> {
    if client_id.is_empty() {
        return Err(ClientIdError::IsEmpty);
    }
    if client_id.len() > MAX_CLIENT_ID_LENGTH {
        return Err(ClientIdError::TooLong);
    }
    Ok(())
}

/// Generate a random client identifier.
///
/// Used when a client connects with a zero-byte client id and the broker
/// assigns a unique one [MQTT-3.1.3-6].
#[must_use]
pub fn random_client_id() -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(14)
        .map(char::from)
        .collect();
    format!("fengbo-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_utf8_string() {
        assert!(validate_utf8_string("sensors/room1/temp").is_ok());
        assert_eq!(
            validate_utf8_string("bad\u{0000}string"),
            Err(StringError::InvalidChars)
        );
    }

    #[test]
    fn test_random_client_id() {
        let id = random_client_id();
        assert!(validate_client_id(&id).is_ok());
        assert_ne!(id, random_client_id());
    }
}
