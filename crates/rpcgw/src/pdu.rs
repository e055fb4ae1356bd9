//! CO-RPC bind-family PDU codec
//!
//! Implements the connection-oriented DCE RPC wire format (C706, MS-RPCE)
//! for the three PDUs of the secure bind sequence: BIND, BIND_ACK and
//! RPC_AUTH_3. All multi-byte integers are little-endian NDR.
//!
//! Common PDU header format:
//! ```text
//! +--------+--------+--------+--------+
//! |  vers  |vers_min| ptype  | pflags |
//! +--------+--------+--------+--------+
//! |        data representation        |
//! +--------+--------+--------+--------+
//! |   frag_len      |   auth_len      |
//! +--------+--------+--------+--------+
//! |             call_id               |
//! +--------+--------+--------+--------+
//! ```

use std::io::Cursor;

use bytes::{Buf, Bytes};

use crate::error::{BindError, Result};
use crate::security::{auth_pad_length, AuthLevel, AuthType, AuthVerifier};

/// CO-RPC protocol version
pub const RPC_VERSION: u8 = 5;
/// CO-RPC protocol minor version
pub const RPC_VERSION_MINOR: u8 = 0;

/// NDR data representation label: little-endian, ASCII, IEEE
pub const NDR_DREP: [u8; 4] = [0x10, 0x00, 0x00, 0x00];

/// First fragment of a multi-fragment transmission
pub const PFC_FIRST_FRAG: u8 = 0x01;
/// Last fragment of a multi-fragment transmission
pub const PFC_LAST_FRAG: u8 = 0x02;
/// Header signing supported (overloads PFC_PENDING_CANCEL on bind-family PDUs)
pub const PFC_SUPPORT_HEADER_SIGN: u8 = 0x04;
/// Concurrent multiplexing supported
pub const PFC_CONC_MPX: u8 = 0x10;

/// Packet types of the bind sequence, plus the replies a gateway may send
/// in place of a bind_ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Fault = 0x03,
    Bind = 0x0B,
    BindAck = 0x0C,
    BindNak = 0x0D,
    Auth3 = 0x10,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x03 => Some(Self::Fault),
            0x0B => Some(Self::Bind),
            0x0C => Some(Self::BindAck),
            0x0D => Some(Self::BindNak),
            0x10 => Some(Self::Auth3),
            _ => None,
        }
    }
}

/// UUID structure (128 bits), stored in its 4-part wire layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Uuid {
    pub time_low: u32,
    pub time_mid: u16,
    pub time_hi_and_version: u16,
    pub clock_seq_hi_and_reserved: u8,
    pub clock_seq_low: u8,
    pub node: [u8; 6],
}

impl Uuid {
    /// Encode to 16 bytes in little-endian wire format
    pub fn to_bytes_le(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&self.time_low.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.time_mid.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.time_hi_and_version.to_le_bytes());
        bytes[8] = self.clock_seq_hi_and_reserved;
        bytes[9] = self.clock_seq_low;
        bytes[10..16].copy_from_slice(&self.node);
        bytes
    }

    /// Decode from little-endian wire format
    pub fn decode(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        if cursor.remaining() < 16 {
            return Err(BindError::MalformedPdu("not enough data for UUID".into()));
        }

        let time_low = cursor.get_u32_le();
        let time_mid = cursor.get_u16_le();
        let time_hi_and_version = cursor.get_u16_le();
        let clock_seq_hi_and_reserved = cursor.get_u8();
        let clock_seq_low = cursor.get_u8();
        let mut node = [0u8; 6];
        cursor.copy_to_slice(&mut node);

        Ok(Self {
            time_low,
            time_mid,
            time_hi_and_version,
            clock_seq_hi_and_reserved,
            clock_seq_low,
            node,
        })
    }
}

impl std::fmt::Display for Uuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.time_low,
            self.time_mid,
            self.time_hi_and_version,
            self.clock_seq_hi_and_reserved,
            self.clock_seq_low,
            self.node[0],
            self.node[1],
            self.node[2],
            self.node[3],
            self.node[4],
            self.node[5]
        )
    }
}

/// Terminal Services Gateway abstract syntax
pub const TSGU_UUID: Uuid = Uuid {
    time_low: 0x44E265DD,
    time_mid: 0x7DAF,
    time_hi_and_version: 0x42CD,
    clock_seq_hi_and_reserved: 0x85,
    clock_seq_low: 0x60,
    node: [0x3C, 0xDB, 0x6E, 0x7A, 0x27, 0x29],
};

/// NDR transfer syntax
pub const NDR_UUID: Uuid = Uuid {
    time_low: 0x8A885D04,
    time_mid: 0x1CEB,
    time_hi_and_version: 0x11C9,
    clock_seq_hi_and_reserved: 0x9F,
    clock_seq_low: 0xE8,
    node: [0x08, 0x00, 0x2B, 0x10, 0x48, 0x60],
};

/// Bind-time feature negotiation pseudo transfer syntax
pub const BTFN_UUID: Uuid = Uuid {
    time_low: 0x6CB71C2C,
    time_mid: 0x9812,
    time_hi_and_version: 0x4540,
    clock_seq_hi_and_reserved: 0x03,
    clock_seq_low: 0x00,
    node: [0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
};

pub const TSGU_SYNTAX_IF_VERSION: u32 = 0x0003_0001;
pub const NDR_SYNTAX_IF_VERSION: u32 = 0x0000_0002;
pub const BTFN_SYNTAX_IF_VERSION: u32 = 0x0000_0001;

/// Interface identifier: UUID paired with an interface version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxId {
    pub uuid: Uuid,
    pub if_version: u32,
}

/// Terminal Services Gateway interface, version 1.3
pub const TSGU_SYNTAX: SyntaxId = SyntaxId {
    uuid: TSGU_UUID,
    if_version: TSGU_SYNTAX_IF_VERSION,
};

/// NDR transfer syntax, version 2
pub const NDR_SYNTAX: SyntaxId = SyntaxId {
    uuid: NDR_UUID,
    if_version: NDR_SYNTAX_IF_VERSION,
};

/// Bind-time feature negotiation, version 1
pub const BTFN_SYNTAX: SyntaxId = SyntaxId {
    uuid: BTFN_UUID,
    if_version: BTFN_SYNTAX_IF_VERSION,
};

impl SyntaxId {
    /// Serialized size: 16-byte UUID + 4-byte version
    pub const SIZE: usize = 20;

    pub fn encode(&self, w: &mut PduWriter) {
        w.put_slice(&self.uuid.to_bytes_le());
        w.put_u32_le(self.if_version);
    }

    pub fn decode(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let uuid = Uuid::decode(cursor)?;
        if cursor.remaining() < 4 {
            return Err(BindError::MalformedPdu(
                "not enough data for syntax version".into(),
            ));
        }
        Ok(Self {
            uuid,
            if_version: cursor.get_u32_le(),
        })
    }
}

/// Sequential byte writer for PDU serialization.
///
/// Tracks the running offset so layouts can be asserted against the
/// declared `frag_length`, and inserts zeroed alignment padding on demand.
/// Capacity is reserved up front; the reservation is the only fallible
/// allocation on the encode path.
pub struct PduWriter {
    buf: Vec<u8>,
}

impl PduWriter {
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| BindError::AllocFailure(capacity))?;
        Ok(Self { buf })
    }

    /// Current write offset from the start of the buffer
    pub fn offset(&self) -> usize {
        self.buf.len()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16_le(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32_le(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pad with zero bytes to the next `n`-byte boundary; returns the
    /// number of bytes inserted.
    pub fn align(&mut self, n: usize) -> usize {
        let pad = (n - self.buf.len() % n) % n;
        self.buf.resize(self.buf.len() + pad, 0);
        pad
    }

    /// Overwrite a previously written little-endian u16 at `at`.
    pub fn patch_u16_le(&mut self, at: usize, v: u16) {
        self.buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
    }

    pub fn freeze(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

/// Common PDU header (16 bytes)
#[derive(Debug, Clone, Copy)]
pub struct PduHeader {
    pub ptype: PacketType,
    pub pfc_flags: u8,
    /// Total serialized length of the PDU, trailer and padding included
    pub frag_length: u16,
    /// Length of the auth token at the tail of the PDU
    pub auth_length: u16,
    pub call_id: u32,
}

impl PduHeader {
    /// Header size in bytes
    pub const SIZE: usize = 16;

    pub fn encode(&self, w: &mut PduWriter) {
        w.put_u8(RPC_VERSION);
        w.put_u8(RPC_VERSION_MINOR);
        w.put_u8(self.ptype as u8);
        w.put_u8(self.pfc_flags);
        w.put_slice(&NDR_DREP);
        w.put_u16_le(self.frag_length);
        w.put_u16_le(self.auth_length);
        w.put_u32_le(self.call_id);
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(BindError::MalformedPdu(format!(
                "PDU header too short: {} bytes",
                data.len()
            )));
        }

        if data[0] != RPC_VERSION {
            return Err(BindError::MalformedPdu(format!(
                "unsupported RPC version {}",
                data[0]
            )));
        }

        let ptype = PacketType::from_u8(data[2])
            .ok_or_else(|| BindError::MalformedPdu(format!("unknown packet type 0x{:02x}", data[2])))?;

        // drep byte 0, upper nibble: integer representation; only
        // little-endian NDR is spoken here
        if data[4] & 0xF0 != 0x10 {
            return Err(BindError::MalformedPdu(
                "big-endian data representation not supported".into(),
            ));
        }

        Ok(Self {
            ptype,
            pfc_flags: data[3],
            frag_length: u16::from_le_bytes([data[8], data[9]]),
            auth_length: u16::from_le_bytes([data[10], data[11]]),
            call_id: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
        })
    }
}

/// Presentation context element (p_cont_elem_t): one proposed pairing of
/// abstract syntax and candidate transfer syntaxes.
#[derive(Debug, Clone)]
pub struct ContextElement {
    pub context_id: u16,
    pub abstract_syntax: SyntaxId,
    pub transfer_syntaxes: Vec<SyntaxId>,
}

impl ContextElement {
    pub fn new(context_id: u16, abstract_syntax: SyntaxId, transfer_syntax: SyntaxId) -> Self {
        Self {
            context_id,
            abstract_syntax,
            transfer_syntaxes: vec![transfer_syntax],
        }
    }

    /// Serialized size: 4-byte head + abstract syntax + transfer syntaxes
    pub fn size(&self) -> usize {
        4 + SyntaxId::SIZE + self.transfer_syntaxes.len() * SyntaxId::SIZE
    }

    pub fn encode(&self, w: &mut PduWriter) {
        w.put_u16_le(self.context_id);
        w.put_u8(self.transfer_syntaxes.len() as u8);
        w.put_u8(0); // reserved

        self.abstract_syntax.encode(w);
        for ts in &self.transfer_syntaxes {
            ts.encode(w);
        }
    }

    pub fn decode(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        if cursor.remaining() < 4 {
            return Err(BindError::MalformedPdu(
                "not enough data for context element".into(),
            ));
        }

        let context_id = cursor.get_u16_le();
        let n_transfer_syn = cursor.get_u8();
        let _reserved = cursor.get_u8();

        let abstract_syntax = SyntaxId::decode(cursor)?;
        let mut transfer_syntaxes = Vec::with_capacity(n_transfer_syn as usize);
        for _ in 0..n_transfer_syn {
            transfer_syntaxes.push(SyntaxId::decode(cursor)?);
        }

        Ok(Self {
            context_id,
            abstract_syntax,
            transfer_syntaxes,
        })
    }
}

/// BIND PDU (secure variant: the auth trailer is always present, though a
/// zero-length token is representable)
#[derive(Debug, Clone)]
pub struct BindPdu {
    pub pfc_flags: u8,
    pub call_id: u32,
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
    pub assoc_group_id: u32,
    pub context_list: Vec<ContextElement>,
    pub auth_verifier: AuthVerifier,
}

impl BindPdu {
    /// Fixed prefix: common header + max_xmit_frag + max_recv_frag +
    /// assoc_group_id
    pub const FIXED_PREFIX: usize = PduHeader::SIZE + 8;

    /// Build the SECURE_BIND for the gateway interface: two presentation
    /// contexts, (0: TSGU -> NDR) and (1: TSGU -> BTFN), NTLM trailer at
    /// packet-integrity level.
    pub fn secure(call_id: u32, max_xmit_frag: u16, max_recv_frag: u16, auth_token: Bytes) -> Self {
        Self {
            pfc_flags: PFC_FIRST_FRAG | PFC_LAST_FRAG | PFC_SUPPORT_HEADER_SIGN | PFC_CONC_MPX,
            call_id,
            max_xmit_frag,
            max_recv_frag,
            assoc_group_id: 0,
            context_list: vec![
                ContextElement::new(0, TSGU_SYNTAX, NDR_SYNTAX),
                ContextElement::new(1, TSGU_SYNTAX, BTFN_SYNTAX),
            ],
            auth_verifier: AuthVerifier::new(
                AuthType::Winnt,
                AuthLevel::PktIntegrity,
                0,
                auth_token,
            ),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        // 4-byte context list head, then the elements; the standard two-
        // context bind lands the trailer at offset 116
        let body_end = Self::FIXED_PREFIX
            + 4
            + self.context_list.iter().map(ContextElement::size).sum::<usize>();
        let pad = auth_pad_length(body_end);
        let auth_length = self.auth_verifier.auth_value.len();
        let frag_length = body_end + pad + AuthVerifier::HEADER_SIZE + auth_length;

        if frag_length > u16::MAX as usize {
            return Err(BindError::MalformedPdu(format!(
                "bind PDU of {frag_length} bytes exceeds the 16-bit fragment limit"
            )));
        }

        let header = PduHeader {
            ptype: PacketType::Bind,
            pfc_flags: self.pfc_flags,
            frag_length: frag_length as u16,
            auth_length: auth_length as u16,
            call_id: self.call_id,
        };

        let mut w = PduWriter::with_capacity(frag_length)?;
        header.encode(&mut w);
        w.put_u16_le(self.max_xmit_frag);
        w.put_u16_le(self.max_recv_frag);
        w.put_u32_le(self.assoc_group_id);

        w.put_u8(self.context_list.len() as u8);
        w.put_u8(0); // reserved
        w.put_u16_le(0); // reserved2
        for ctx in &self.context_list {
            ctx.encode(&mut w);
        }

        let inserted = w.align(4);
        debug_assert_eq!(inserted, pad);
        let mut verifier = self.auth_verifier.clone();
        verifier.auth_pad_length = pad as u8;
        verifier.encode(&mut w);

        debug_assert_eq!(w.offset(), frag_length);
        Ok(w.freeze())
    }
}

/// RPC_AUTH_3 PDU: the third leg of the three-leg authentication exchange.
/// No assoc_group_id and no context list, just the fragment size pair and
/// the auth trailer.
#[derive(Debug, Clone)]
pub struct Auth3Pdu {
    pub pfc_flags: u8,
    pub call_id: u32,
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
    pub auth_verifier: AuthVerifier,
}

impl Auth3Pdu {
    /// Fixed prefix: common header + max_xmit_frag + max_recv_frag
    pub const FIXED_PREFIX: usize = PduHeader::SIZE + 4;

    pub fn new(call_id: u32, max_xmit_frag: u16, max_recv_frag: u16, auth_token: Bytes) -> Self {
        Self {
            pfc_flags: PFC_FIRST_FRAG | PFC_LAST_FRAG | PFC_CONC_MPX,
            call_id,
            max_xmit_frag,
            max_recv_frag,
            auth_verifier: AuthVerifier::new(
                AuthType::Winnt,
                AuthLevel::PktIntegrity,
                0,
                auth_token,
            ),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let pad = auth_pad_length(Self::FIXED_PREFIX);
        let auth_length = self.auth_verifier.auth_value.len();
        let frag_length = Self::FIXED_PREFIX + pad + AuthVerifier::HEADER_SIZE + auth_length;

        if frag_length > u16::MAX as usize {
            return Err(BindError::MalformedPdu(format!(
                "auth3 PDU of {frag_length} bytes exceeds the 16-bit fragment limit"
            )));
        }

        let header = PduHeader {
            ptype: PacketType::Auth3,
            pfc_flags: self.pfc_flags,
            frag_length: frag_length as u16,
            auth_length: auth_length as u16,
            call_id: self.call_id,
        };

        let mut w = PduWriter::with_capacity(frag_length)?;
        header.encode(&mut w);
        w.put_u16_le(self.max_xmit_frag);
        w.put_u16_le(self.max_recv_frag);

        let inserted = w.align(4);
        debug_assert_eq!(inserted, pad);
        let mut verifier = self.auth_verifier.clone();
        verifier.auth_pad_length = pad as u8;
        verifier.encode(&mut w);

        debug_assert_eq!(w.offset(), frag_length);
        Ok(w.freeze())
    }
}

/// The fields of a BIND_ACK the handshake needs: the server's fragment
/// sizes from the fixed prefix, and the trailing auth token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindAck {
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
    pub auth_value: Bytes,
}

impl BindAck {
    /// Fixed prefix: common header + max_xmit_frag + max_recv_frag +
    /// assoc_group_id
    pub const FIXED_PREFIX: usize = PduHeader::SIZE + 8;

    /// Parse the fields of interest out of a received bind_ack frame.
    ///
    /// The secondary address and result list between the fixed prefix and
    /// the trailer are skipped; the auth token is located from the tail as
    /// `frag_length - auth_length`.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(buf)?;

        let frag_length = header.frag_length as usize;
        if frag_length > buf.len() {
            return Err(BindError::MalformedPdu(format!(
                "frag_length {frag_length} exceeds received {} bytes",
                buf.len()
            )));
        }
        if frag_length < Self::FIXED_PREFIX {
            return Err(BindError::MalformedPdu(format!(
                "bind_ack of {frag_length} bytes is shorter than its fixed prefix"
            )));
        }
        if header.ptype != PacketType::BindAck {
            return Err(BindError::MalformedPdu(format!(
                "expected bind_ack, got {:?}",
                header.ptype
            )));
        }

        let auth_length = header.auth_length as usize;
        if auth_length > frag_length - Self::FIXED_PREFIX {
            return Err(BindError::MalformedPdu(format!(
                "auth_length {auth_length} does not fit in a {frag_length}-byte bind_ack"
            )));
        }

        Ok(Self {
            max_xmit_frag: u16::from_le_bytes([buf[16], buf[17]]),
            max_recv_frag: u16::from_le_bytes([buf[18], buf[19]]),
            auth_value: Bytes::copy_from_slice(&buf[frag_length - auth_length..frag_length]),
        })
    }
}

/// Full BIND_ACK frame builder. The client never sends one; this exists to
/// synthesize realistic server replies for tests and to pin the parser
/// against the complete wire layout (secondary address, result list,
/// trailer).
#[derive(Debug, Clone)]
pub struct BindAckPdu {
    pub call_id: u32,
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
    pub assoc_group_id: u32,
    pub secondary_addr: String,
    pub results: Vec<(u16, SyntaxId)>,
    pub auth_verifier: Option<AuthVerifier>,
}

impl BindAckPdu {
    pub fn new(call_id: u32, max_xmit_frag: u16, max_recv_frag: u16) -> Self {
        Self {
            call_id,
            max_xmit_frag,
            max_recv_frag,
            assoc_group_id: 1,
            secondary_addr: String::new(),
            results: vec![(0, NDR_SYNTAX), (0, BTFN_SYNTAX)],
            auth_verifier: None,
        }
    }

    pub fn with_auth_token(mut self, auth_token: Bytes) -> Self {
        self.auth_verifier = Some(AuthVerifier::new(
            AuthType::Winnt,
            AuthLevel::PktIntegrity,
            0,
            auth_token,
        ));
        self
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut w = PduWriter::with_capacity(128)?;

        // Header is written with placeholder lengths and patched once the
        // body is complete; the ack layout is not fixed-offset like the
        // outbound PDUs.
        let auth_length = self
            .auth_verifier
            .as_ref()
            .map(|v| v.auth_value.len())
            .unwrap_or(0);
        let header = PduHeader {
            ptype: PacketType::BindAck,
            pfc_flags: PFC_FIRST_FRAG | PFC_LAST_FRAG | PFC_SUPPORT_HEADER_SIGN | PFC_CONC_MPX,
            frag_length: 0,
            auth_length: auth_length as u16,
            call_id: self.call_id,
        };
        header.encode(&mut w);

        w.put_u16_le(self.max_xmit_frag);
        w.put_u16_le(self.max_recv_frag);
        w.put_u32_le(self.assoc_group_id);

        // Secondary address: length-prefixed, NUL-terminated, then padded
        // to a 4-byte boundary
        let addr = self.secondary_addr.as_bytes();
        w.put_u16_le(addr.len() as u16 + 1);
        w.put_slice(addr);
        w.put_u8(0);
        w.align(4);

        w.put_u8(self.results.len() as u8);
        w.put_u8(0); // reserved
        w.put_u16_le(0); // reserved2
        for (result, syntax) in &self.results {
            w.put_u16_le(*result);
            w.put_u16_le(0); // reason
            syntax.encode(&mut w);
        }

        if let Some(auth) = &self.auth_verifier {
            let pad = w.align(4);
            let mut verifier = auth.clone();
            verifier.auth_pad_length = pad as u8;
            verifier.encode(&mut w);
        }

        let frag_length = w.offset();
        if frag_length > u16::MAX as usize {
            return Err(BindError::MalformedPdu(format!(
                "bind_ack PDU of {frag_length} bytes exceeds the 16-bit fragment limit"
            )));
        }
        w.patch_u16_le(8, frag_length as u16);

        Ok(w.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secure_bind_frame(token: &'static [u8]) -> Bytes {
        BindPdu::secure(2, 4088, 4088, Bytes::from_static(token))
            .encode()
            .unwrap()
    }

    #[test]
    fn bind_frame_matches_declared_lengths() {
        let frame = secure_bind_frame(&[0xAA, 0xBB]);

        let frag_length = u16::from_le_bytes([frame[8], frame[9]]) as usize;
        let auth_length = u16::from_le_bytes([frame[10], frame[11]]) as usize;
        assert_eq!(frame.len(), frag_length);
        assert_eq!(auth_length, 2);
        assert_eq!(frag_length, 116 + AuthVerifier::HEADER_SIZE + 2);
    }

    #[test]
    fn bind_header_fields() {
        let frame = secure_bind_frame(&[0xAA, 0xBB]);

        assert_eq!(frame[0], RPC_VERSION);
        assert_eq!(frame[1], RPC_VERSION_MINOR);
        assert_eq!(frame[2], PacketType::Bind as u8);
        assert_eq!(
            frame[3],
            PFC_FIRST_FRAG | PFC_LAST_FRAG | PFC_SUPPORT_HEADER_SIGN | PFC_CONC_MPX
        );
        assert_eq!(&frame[4..8], &NDR_DREP);
        assert_eq!(u32::from_le_bytes([frame[12], frame[13], frame[14], frame[15]]), 2);
    }

    #[test]
    fn bind_carries_tsgu_to_ndr_context_at_offset_28() {
        let frame = secure_bind_frame(&[0xAA, 0xBB]);

        let mut cursor = Cursor::new(&frame[28..]);
        let ctx = ContextElement::decode(&mut cursor).unwrap();
        assert_eq!(ctx.context_id, 0);
        assert_eq!(ctx.abstract_syntax, TSGU_SYNTAX);
        assert_eq!(ctx.transfer_syntaxes, vec![NDR_SYNTAX]);
    }

    #[test]
    fn bind_carries_tsgu_to_btfn_context_at_offset_72() {
        let frame = secure_bind_frame(&[0xAA, 0xBB]);

        let mut cursor = Cursor::new(&frame[72..]);
        let ctx = ContextElement::decode(&mut cursor).unwrap();
        assert_eq!(ctx.context_id, 1);
        assert_eq!(ctx.abstract_syntax, TSGU_SYNTAX);
        assert_eq!(ctx.transfer_syntaxes, vec![BTFN_SYNTAX]);
    }

    #[test]
    fn bind_auth_trailer_starts_at_offset_116() {
        let frame = secure_bind_frame(&[0xAA, 0xBB]);

        assert_eq!(frame[116], AuthType::Winnt as u8);
        assert_eq!(frame[117], AuthLevel::PktIntegrity as u8);
        assert_eq!(frame[118], 0); // auth_pad_length
        assert_eq!(frame[119], 0); // reserved
        assert_eq!(&frame[120..124], &[0, 0, 0, 0]); // auth_context_id
        assert_eq!(&frame[124..126], &[0xAA, 0xBB]);
    }

    #[test]
    fn bind_with_empty_token() {
        let frame = secure_bind_frame(&[]);

        let frag_length = u16::from_le_bytes([frame[8], frame[9]]) as usize;
        let auth_length = u16::from_le_bytes([frame[10], frame[11]]);
        assert_eq!(frame.len(), frag_length);
        assert_eq!(frag_length, 116 + AuthVerifier::HEADER_SIZE);
        assert_eq!(auth_length, 0);
    }

    #[test]
    fn bind_rejects_token_overflowing_frag_length() {
        let token = Bytes::from(vec![0u8; 0xFFFF]);
        let err = BindPdu::secure(2, 4088, 4088, token).encode().unwrap_err();
        assert!(matches!(err, BindError::MalformedPdu(_)));
    }

    #[test]
    fn auth3_frame_layout() {
        let frame = Auth3Pdu::new(2, 4088, 4088, Bytes::from_static(&[0xEE, 0xFF]))
            .encode()
            .unwrap();

        let frag_length = u16::from_le_bytes([frame[8], frame[9]]) as usize;
        assert_eq!(frame.len(), frag_length);
        assert_eq!(frag_length, 20 + AuthVerifier::HEADER_SIZE + 2);
        assert_eq!(frame[2], PacketType::Auth3 as u8);
        assert_eq!(frame[3], PFC_FIRST_FRAG | PFC_LAST_FRAG | PFC_CONC_MPX);
        assert_eq!(u32::from_le_bytes([frame[12], frame[13], frame[14], frame[15]]), 2);

        // frag sizes then the trailer, no assoc_group_id in between
        assert_eq!(u16::from_le_bytes([frame[16], frame[17]]), 4088);
        assert_eq!(u16::from_le_bytes([frame[18], frame[19]]), 4088);
        assert_eq!(frame[20], AuthType::Winnt as u8);
        assert_eq!(frame[21], AuthLevel::PktIntegrity as u8);
        assert_eq!(&frame[28..30], &[0xEE, 0xFF]);
    }

    #[test]
    fn bind_ack_round_trip() {
        let ack = BindAckPdu::new(2, 4088, 4088)
            .with_auth_token(Bytes::from_static(&[0xCC, 0xDD]))
            .encode()
            .unwrap();

        let parsed = BindAck::parse(&ack).unwrap();
        assert_eq!(
            parsed,
            BindAck {
                max_xmit_frag: 4088,
                max_recv_frag: 4088,
                auth_value: Bytes::from_static(&[0xCC, 0xDD]),
            }
        );
    }

    #[test]
    fn bind_ack_with_secondary_addr_and_empty_token() {
        let mut pdu = BindAckPdu::new(7, 1024, 2048);
        pdu.secondary_addr = "135".into();
        let ack = pdu.with_auth_token(Bytes::new()).encode().unwrap();

        let parsed = BindAck::parse(&ack).unwrap();
        assert_eq!(parsed.max_xmit_frag, 1024);
        assert_eq!(parsed.max_recv_frag, 2048);
        assert!(parsed.auth_value.is_empty());
    }

    #[test]
    fn bind_ack_truncated_frag_length_rejected() {
        let mut raw = Vec::new();
        let mut w = PduWriter::with_capacity(PduHeader::SIZE).unwrap();
        PduHeader {
            ptype: PacketType::BindAck,
            pfc_flags: PFC_FIRST_FRAG | PFC_LAST_FRAG,
            frag_length: 10,
            auth_length: 0,
            call_id: 2,
        }
        .encode(&mut w);
        raw.extend_from_slice(&w.freeze());

        let err = BindAck::parse(&raw).unwrap_err();
        assert!(matches!(err, BindError::MalformedPdu(_)));
    }

    #[test]
    fn bind_ack_oversized_auth_length_rejected() {
        let mut ack = BindAckPdu::new(2, 4088, 4088)
            .with_auth_token(Bytes::from_static(&[0xCC, 0xDD]))
            .encode()
            .unwrap()
            .to_vec();
        // Claim more auth bytes than the frame holds
        ack[10..12].copy_from_slice(&u16::MAX.to_le_bytes());

        let err = BindAck::parse(&ack).unwrap_err();
        assert!(matches!(err, BindError::MalformedPdu(_)));
    }

    #[test]
    fn bind_ack_wrong_ptype_rejected() {
        let mut ack = BindAckPdu::new(2, 4088, 4088)
            .with_auth_token(Bytes::from_static(&[0xCC]))
            .encode()
            .unwrap()
            .to_vec();
        ack[2] = PacketType::BindNak as u8;

        let err = BindAck::parse(&ack).unwrap_err();
        assert!(matches!(err, BindError::MalformedPdu(_)));
    }

    #[test]
    fn frag_length_stays_aligned_with_aligned_tokens() {
        for token_len in [0usize, 4, 8, 16, 40] {
            let frame = BindPdu::secure(2, 4088, 4088, Bytes::from(vec![0u8; token_len]))
                .encode()
                .unwrap();
            assert_eq!(frame.len() % 4, 0, "token_len={token_len}");
        }
    }
}
