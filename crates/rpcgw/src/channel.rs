//! Channel facade over the two HTTP legs of the virtual connection
//!
//! RPC-over-HTTP v2 splits the duplex RPC stream across two HTTP request
//! bodies: the client transmits on the IN channel and receives on the OUT
//! channel. Both are plain byte pipes here; PDUs are self-delimiting via
//! the frag_length field in the common header.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{BindError, Result};
use crate::pdu::PduHeader;

/// Upper bound on a single received PDU (64 KB, the frag_length ceiling)
pub const DEFAULT_MAX_PDU_SIZE: usize = 65536;

/// Outbound leg of the virtual connection
#[async_trait]
pub trait InChannel: Send {
    /// Transmit `data` as one logical write, returning the byte count
    /// actually accepted. Anything short of `data.len()` is treated as a
    /// transport failure by the caller.
    async fn send(&mut self, data: &[u8]) -> std::io::Result<usize>;
}

/// Inbound leg of the virtual connection
#[async_trait]
pub trait OutChannel: Send {
    /// Receive up to `buf.len()` bytes; 0 means the peer closed the leg.
    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// `InChannel` over any async byte sink
pub struct StreamInChannel<W> {
    inner: W,
}

impl<W> StreamInChannel<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> InChannel for StreamInChannel<W> {
    async fn send(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.inner.write_all(data).await?;
        self.inner.flush().await?;
        Ok(data.len())
    }
}

/// `OutChannel` over any async byte source
pub struct StreamOutChannel<R> {
    inner: R,
}

impl<R> StreamOutChannel<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> OutChannel for StreamOutChannel<R> {
    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf).await
    }
}

/// Read exactly one PDU from the out channel.
///
/// The 16-byte common header is read first to learn frag_length, then the
/// remainder of the fragment. A leg closing mid-PDU is a transport error,
/// not a clean EOF.
pub async fn recv_pdu(channel: &mut dyn OutChannel, max_pdu_size: usize) -> Result<Bytes> {
    let mut header_buf = [0u8; PduHeader::SIZE];
    recv_exact(channel, &mut header_buf).await?;

    let header = PduHeader::decode(&header_buf)?;
    let frag_length = header.frag_length as usize;

    if frag_length < PduHeader::SIZE {
        return Err(BindError::MalformedPdu(format!(
            "frag_length {frag_length} is shorter than the common header"
        )));
    }
    if frag_length > max_pdu_size {
        return Err(BindError::MalformedPdu(format!(
            "fragment of {frag_length} bytes exceeds the {max_pdu_size}-byte receive limit"
        )));
    }

    let mut frame = Vec::new();
    frame
        .try_reserve_exact(frag_length)
        .map_err(|_| BindError::AllocFailure(frag_length))?;
    frame.extend_from_slice(&header_buf);
    frame.resize(frag_length, 0);
    recv_exact(channel, &mut frame[PduHeader::SIZE..]).await?;

    Ok(Bytes::from(frame))
}

async fn recv_exact(channel: &mut dyn OutChannel, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = channel.recv(&mut buf[filled..]).await.map_err(BindError::channel)?;
        if n == 0 {
            return Err(BindError::ChannelIoError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("out channel closed after {filled} of {} bytes", buf.len()),
            )));
        }
        filled += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::{Auth3Pdu, BindAckPdu, PacketType};
    use tokio::io::duplex;

    #[tokio::test]
    async fn reads_one_framed_pdu() {
        let (mut tx, rx) = duplex(1024);
        let mut out = StreamOutChannel::new(rx);

        let ack = BindAckPdu::new(2, 4088, 4088)
            .with_auth_token(Bytes::from_static(&[0xCC, 0xDD]))
            .encode()
            .unwrap();
        tx.write_all(&ack).await.unwrap();

        let frame = recv_pdu(&mut out, DEFAULT_MAX_PDU_SIZE).await.unwrap();
        assert_eq!(frame, ack);
    }

    #[tokio::test]
    async fn reads_back_to_back_pdus() {
        let (mut tx, rx) = duplex(4096);
        let mut out = StreamOutChannel::new(rx);

        let first = BindAckPdu::new(2, 4088, 4088)
            .with_auth_token(Bytes::from_static(&[0x01]))
            .encode()
            .unwrap();
        let second = Auth3Pdu::new(2, 4088, 4088, Bytes::from_static(&[0x02]))
            .encode()
            .unwrap();
        tx.write_all(&first).await.unwrap();
        tx.write_all(&second).await.unwrap();

        let frame = recv_pdu(&mut out, DEFAULT_MAX_PDU_SIZE).await.unwrap();
        assert_eq!(frame[2], PacketType::BindAck as u8);
        let frame = recv_pdu(&mut out, DEFAULT_MAX_PDU_SIZE).await.unwrap();
        assert_eq!(frame[2], PacketType::Auth3 as u8);
    }

    #[tokio::test]
    async fn eof_mid_pdu_is_a_channel_error() {
        let (mut tx, rx) = duplex(1024);
        let mut out = StreamOutChannel::new(rx);

        let ack = BindAckPdu::new(2, 4088, 4088)
            .with_auth_token(Bytes::from_static(&[0xCC, 0xDD]))
            .encode()
            .unwrap();
        tx.write_all(&ack[..20]).await.unwrap();
        drop(tx);

        let err = recv_pdu(&mut out, DEFAULT_MAX_PDU_SIZE).await.unwrap_err();
        assert!(matches!(err, BindError::ChannelIoError(_)));
    }

    #[tokio::test]
    async fn undersized_frag_length_rejected() {
        let (mut tx, rx) = duplex(1024);
        let mut out = StreamOutChannel::new(rx);

        // A 16-byte header claiming a 10-byte fragment
        let mut raw = vec![5, 0, 0x0C, 0x03, 0x10, 0, 0, 0];
        raw.extend_from_slice(&10u16.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&2u32.to_le_bytes());
        tx.write_all(&raw).await.unwrap();

        let err = recv_pdu(&mut out, DEFAULT_MAX_PDU_SIZE).await.unwrap_err();
        assert!(matches!(err, BindError::MalformedPdu(_)));
    }

    #[tokio::test]
    async fn oversized_fragment_rejected() {
        let (mut tx, rx) = duplex(1024);
        let mut out = StreamOutChannel::new(rx);

        let mut raw = vec![5, 0, 0x0C, 0x03, 0x10, 0, 0, 0];
        raw.extend_from_slice(&4096u16.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&2u32.to_le_bytes());
        tx.write_all(&raw).await.unwrap();

        let err = recv_pdu(&mut out, 1024).await.unwrap_err();
        assert!(matches!(err, BindError::MalformedPdu(_)));
    }
}
