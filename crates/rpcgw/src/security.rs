//! Authentication trailer support for CO-RPC PDUs
//!
//! Wire format follows MS-RPCE: authenticated PDUs carry a trailing
//! `auth_verifier` (sec_trailer) made of an 8-byte header and an opaque
//! token produced by the security provider.

use bytes::Bytes;

use crate::pdu::PduWriter;

/// Authentication services (MS-RPCE 2.2.1.1.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthType {
    /// No authentication
    None = 0,
    /// Windows NT LAN Manager (RPC_C_AUTHN_WINNT)
    Winnt = 0x0A,
}

impl AuthType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            0x0A => Some(Self::Winnt),
            _ => None,
        }
    }
}

/// Authentication levels (MS-RPCE 2.2.1.1.8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum AuthLevel {
    None = 1,
    Connect = 2,
    Call = 3,
    Pkt = 4,
    /// Sign each packet (RPC_C_AUTHN_LEVEL_PKT_INTEGRITY)
    PktIntegrity = 5,
    /// Encrypt each packet
    PktPrivacy = 6,
}

impl AuthLevel {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::None),
            2 => Some(Self::Connect),
            3 => Some(Self::Call),
            4 => Some(Self::Pkt),
            5 => Some(Self::PktIntegrity),
            6 => Some(Self::PktPrivacy),
            _ => None,
        }
    }
}

/// Authentication verifier appended to authenticated PDUs.
///
/// Wire format (MS-RPCE 2.2.2.11):
/// ```text
/// +------------------+
/// | auth_type (1)    |
/// | auth_level (1)   |
/// | auth_pad_len (1) |
/// | reserved (1)     |
/// | auth_context_id  |
/// | (4 bytes)        |
/// | auth_value       |
/// | (auth_length B)  |
/// +------------------+
/// ```
#[derive(Debug, Clone)]
pub struct AuthVerifier {
    pub auth_type: AuthType,
    pub auth_level: AuthLevel,
    /// Number of alignment bytes inserted before this verifier
    pub auth_pad_length: u8,
    pub auth_reserved: u8,
    pub auth_context_id: u32,
    /// Opaque token from the security provider
    pub auth_value: Bytes,
}

impl AuthVerifier {
    /// Size of the fixed header portion preceding `auth_value`
    pub const HEADER_SIZE: usize = 8;

    pub fn new(
        auth_type: AuthType,
        auth_level: AuthLevel,
        auth_context_id: u32,
        auth_value: Bytes,
    ) -> Self {
        Self {
            auth_type,
            auth_level,
            auth_pad_length: 0,
            auth_reserved: 0,
            auth_context_id,
            auth_value,
        }
    }

    pub fn encode(&self, w: &mut PduWriter) {
        w.put_u8(self.auth_type as u8);
        w.put_u8(self.auth_level as u8);
        w.put_u8(self.auth_pad_length);
        w.put_u8(self.auth_reserved);
        w.put_u32_le(self.auth_context_id);
        w.put_slice(&self.auth_value);
    }

    /// Decode a verifier sitting at the start of `data`; `auth_value` is
    /// the trailing `auth_value_len` bytes after the fixed header.
    pub fn decode(data: &[u8], auth_value_len: usize) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE + auth_value_len {
            return None;
        }

        Some(Self {
            auth_type: AuthType::from_u8(data[0])?,
            auth_level: AuthLevel::from_u8(data[1])?,
            auth_pad_length: data[2],
            auth_reserved: data[3],
            auth_context_id: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            auth_value: Bytes::copy_from_slice(
                &data[Self::HEADER_SIZE..Self::HEADER_SIZE + auth_value_len],
            ),
        })
    }
}

/// Number of zero bytes needed to bring `offset` to a 4-byte boundary
/// before the auth trailer.
pub fn auth_pad_length(offset: usize) -> usize {
    (4 - offset % 4) % 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_type_round_trip() {
        assert_eq!(AuthType::from_u8(0x0A), Some(AuthType::Winnt));
        assert_eq!(AuthType::from_u8(0), Some(AuthType::None));
        assert_eq!(AuthType::from_u8(77), None);
    }

    #[test]
    fn verifier_encode_decode() {
        let verifier = AuthVerifier::new(
            AuthType::Winnt,
            AuthLevel::PktIntegrity,
            0,
            Bytes::from_static(b"token"),
        );

        let mut w = PduWriter::with_capacity(AuthVerifier::HEADER_SIZE + 5).unwrap();
        verifier.encode(&mut w);
        let buf = w.freeze();

        let decoded = AuthVerifier::decode(&buf, 5).unwrap();
        assert_eq!(decoded.auth_type, AuthType::Winnt);
        assert_eq!(decoded.auth_level, AuthLevel::PktIntegrity);
        assert_eq!(decoded.auth_context_id, 0);
        assert_eq!(decoded.auth_value.as_ref(), b"token");
    }

    #[test]
    fn empty_token_is_representable() {
        let verifier =
            AuthVerifier::new(AuthType::Winnt, AuthLevel::PktIntegrity, 0, Bytes::new());
        let mut w = PduWriter::with_capacity(AuthVerifier::HEADER_SIZE).unwrap();
        verifier.encode(&mut w);
        let buf = w.freeze();

        assert_eq!(buf.len(), AuthVerifier::HEADER_SIZE);
        let decoded = AuthVerifier::decode(&buf, 0).unwrap();
        assert!(decoded.auth_value.is_empty());
    }

    #[test]
    fn pad_reaches_four_byte_boundary() {
        assert_eq!(auth_pad_length(116), 0);
        assert_eq!(auth_pad_length(20), 0);
        assert_eq!(auth_pad_length(117), 3);
        assert_eq!(auth_pad_length(118), 2);
        assert_eq!(auth_pad_length(119), 1);
    }
}
