//! Packet-level framing: exact-size reads, bounded sub-streams for long
//! column values, and the 16 MiB payload split/reassembly rule.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::binary::write_int_3;
use crate::error::{Error, Result};

const MAX_CHUNK: usize = 0xFF_FFFF;

/// Pull-based reader over any `AsyncRead + Unpin` transport.
pub struct FramedReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FramedReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Read exactly `n` bytes. An EOF mid-read means the peer closed the
    /// socket; this is reported as `Error::Disconnected`, not a raw IO error.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        match self.inner.read_exact(&mut buf).await {
            Ok(_) => Ok(buf),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::Disconnected),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// A bounded view over the next `n` bytes of this reader. Borrows
    /// `&mut self` for its lifetime, so the borrow checker (not a runtime
    /// flag) enforces that no other read starts until the sub-stream is
    /// dropped or fully drained.
    pub fn read_sub_stream(&mut self, n: u64) -> SubStream<'_, R> {
        SubStream {
            inner: &mut self.inner,
            remaining: n,
        }
    }

    /// Read one full MySQL payload, reassembling 16 MiB-aligned packet
    /// sequences. Returns `(sequence_id_of_first_packet, payload)`.
    pub async fn read_payload(&mut self) -> Result<(u8, Vec<u8>)> {
        let (sequence_id, mut length) = read_header(&mut self.inner).await?;
        let mut payload = self.read_exact(length).await?;

        while length == MAX_CHUNK {
            let (_, next_len) = read_header(&mut self.inner).await?;
            length = next_len;
            payload.extend(self.read_exact(length).await?);
        }

        Ok((sequence_id, payload))
    }

    /// Open a streaming cursor over the next payload, reassembling
    /// continuation packets as the cursor is drained rather than up front.
    /// Returns `(sequence_id_of_first_packet, cursor)`.
    pub async fn open_payload_cursor(&mut self) -> Result<(u8, PayloadCursor<'_, R>)> {
        let (sequence_id, length) = read_header(&mut self.inner).await?;
        Ok((
            sequence_id,
            PayloadCursor {
                inner: &mut self.inner,
                chunk_remaining: length,
                chunk_was_max: length == MAX_CHUNK,
                first_chunk_len: length,
            },
        ))
    }
}

async fn read_header<R: AsyncRead + Unpin>(inner: &mut R) -> Result<(u8, usize)> {
    let mut header = [0u8; 4];
    match inner.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(Error::Disconnected),
        Err(e) => return Err(Error::Io(e)),
    }
    let length = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    Ok((header[3], length))
}

/// A streaming cursor over one logical MySQL payload (a possibly
/// multi-packet, 16 MiB-chunked sequence). `read_exact` buffers small
/// fixed-width fields as before; `copy_n_to` pumps an oversized
/// variable-length column's bytes straight from the wire into a
/// caller-supplied sink, one chunk-bounded piece at a time, without ever
/// materializing the whole column in one `Vec<u8>`.
pub struct PayloadCursor<'a, R> {
    inner: &'a mut R,
    chunk_remaining: usize,
    chunk_was_max: bool,
    first_chunk_len: usize,
}

impl<R: AsyncRead + Unpin> PayloadCursor<'_, R> {
    /// The declared length of this payload's first wire packet, captured at
    /// open time. EOF and ERR packets are never split across continuation
    /// packets, so this is enough to tell them apart from an ordinary row
    /// that happens to start with the same marker byte.
    pub fn declared_first_chunk_len(&self) -> usize {
        self.first_chunk_len
    }

    async fn advance_chunk(&mut self) -> Result<()> {
        if self.chunk_remaining == 0 && self.chunk_was_max {
            let (_, length) = read_header(self.inner).await?;
            self.chunk_remaining = length;
            self.chunk_was_max = length == MAX_CHUNK;
        }
        Ok(())
    }

    /// Read exactly `n` bytes, crossing continuation packets as needed.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        let mut remaining = n;
        while remaining > 0 {
            self.advance_chunk().await?;
            if self.chunk_remaining == 0 {
                return Err(Error::Disconnected);
            }
            let take = remaining.min(self.chunk_remaining);
            let mut buf = vec![0u8; take];
            match self.inner.read_exact(&mut buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(Error::Disconnected);
                }
                Err(e) => return Err(Error::Io(e)),
            }
            self.chunk_remaining -= take;
            remaining -= take;
            out.extend_from_slice(&buf);
        }
        Ok(out)
    }

    /// Length-encoded integer, read directly off the wire.
    pub async fn read_int_lenenc(&mut self) -> Result<u64> {
        let first = self.read_exact(1).await?[0];
        match first {
            0xFB => Err(Error::protocol("lenenc integer is NULL marker")),
            0xFC => {
                let b = self.read_exact(2).await?;
                Ok(u16::from_le_bytes([b[0], b[1]]) as u64)
            }
            0xFD => {
                let b = self.read_exact(3).await?;
                Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]) as u64)
            }
            0xFE => {
                let b = self.read_exact(8).await?;
                Ok(u64::from_le_bytes(b.try_into().unwrap()))
            }
            v => Ok(v as u64),
        }
    }

    /// Copy exactly `n` bytes from the wire straight into `sink`, never
    /// materializing more than one chunk at a time.
    pub async fn copy_n_to<W: AsyncWrite + Unpin>(&mut self, n: u64, sink: &mut W) -> Result<()> {
        let mut remaining = n;
        while remaining > 0 {
            self.advance_chunk().await?;
            if self.chunk_remaining == 0 {
                return Err(Error::Disconnected);
            }
            let take = remaining.min(self.chunk_remaining as u64) as usize;
            let mut sub = SubStream { inner: &mut *self.inner, remaining: take as u64 };
            tokio::io::copy(&mut sub, sink).await.map_err(Error::Io)?;
            self.chunk_remaining -= take;
            remaining -= take as u64;
        }
        Ok(())
    }
}

/// A view over the next `remaining` bytes of a `FramedReader`, itself
/// readable via `AsyncRead`. Yields EOF once `remaining` bytes have been
/// produced, regardless of how much more data sits behind it in the stream.
pub struct SubStream<'a, R> {
    inner: &'a mut R,
    remaining: u64,
}

impl<R> SubStream<'_, R> {
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for SubStream<'_, R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.remaining == 0 {
            return Poll::Ready(Ok(()));
        }

        let max = self.remaining.min(buf.remaining() as u64) as usize;
        let mut limited = buf.take(max);
        match Pin::new(&mut *self.inner).poll_read(cx, &mut limited) {
            Poll::Ready(Ok(())) => {
                let n = limited.filled().len();
                buf.advance(n);
                self.remaining -= n as u64;
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Write one full MySQL payload, splitting it into `0xFFFFFF`-byte chunks
/// and appending an empty terminator packet when the payload length is an
/// exact multiple of the chunk size (including the zero-length case).
pub async fn write_payload<W: AsyncWrite + Unpin>(
    writer: &mut W,
    mut sequence_id: u8,
    payload: &[u8],
) -> Result<()> {
    let mut remaining = payload;
    let mut wrote_any_full_chunk = false;

    loop {
        let chunk_size = remaining.len().min(MAX_CHUNK);
        let (chunk, rest) = remaining.split_at(chunk_size);

        let mut header = Vec::with_capacity(4);
        write_int_3(&mut header, chunk_size as u32);
        header.push(sequence_id);
        writer.write_all(&header).await?;
        writer.write_all(chunk).await?;

        sequence_id = sequence_id.wrapping_add(1);
        remaining = rest;
        wrote_any_full_chunk = wrote_any_full_chunk || chunk_size == MAX_CHUNK;

        if remaining.is_empty() {
            break;
        }
    }

    if wrote_any_full_chunk && payload.len() % MAX_CHUNK == 0 {
        let mut header = Vec::with_capacity(4);
        write_int_3(&mut header, 0);
        header.push(sequence_id);
        writer.write_all(&header).await?;
    }

    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_single_packet() {
        let mut data = Vec::new();
        write_int_3(&mut data, 5);
        data.push(0);
        data.extend_from_slice(b"hello");

        let mut r = FramedReader::new(Cursor::new(data));
        let (seq, payload) = r.read_payload().await.unwrap();
        assert_eq!(seq, 0);
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn reassembles_split_payload() {
        let mut out = Vec::new();
        write_payload(&mut out, 0, &vec![0xABu8; MAX_CHUNK + 10])
            .await
            .unwrap();

        let mut r = FramedReader::new(Cursor::new(out));
        let (_, payload) = r.read_payload().await.unwrap();
        assert_eq!(payload.len(), MAX_CHUNK + 10);
        assert!(payload.iter().all(|&b| b == 0xAB));
    }

    #[tokio::test]
    async fn emits_terminator_packet_for_exact_multiple() {
        let mut out = Vec::new();
        write_payload(&mut out, 0, &vec![0x11u8; MAX_CHUNK]).await.unwrap();
        // chunk header+payload, then an empty terminator header.
        assert_eq!(out.len(), 4 + MAX_CHUNK + 4);
        assert_eq!(&out[out.len() - 4..out.len() - 1], &[0, 0, 0]);
    }

    #[tokio::test]
    async fn sub_stream_yields_exactly_n_bytes() {
        let mut r = FramedReader::new(Cursor::new(b"abcdefghij".to_vec()));
        let mut sub = r.read_sub_stream(4);
        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut sub, &mut buf).await.unwrap();
        assert_eq!(buf, b"abcd");

        let rest = r.read_exact(6).await.unwrap();
        assert_eq!(rest, b"efghij");
    }

    #[tokio::test]
    async fn payload_cursor_reads_fields_and_streams_long_data() {
        // row header byte, a 4-byte fixed field, then a lenenc-prefixed
        // "long data" column that should stream straight to a sink.
        let mut data = Vec::new();
        write_int_3(&mut data, 1 + 4 + 1 + 3);
        data.push(0);
        data.push(0xAA); // row header
        data.extend_from_slice(&42u32.to_le_bytes()); // fixed-width column
        data.push(3); // lenenc length (single-byte form)
        data.extend_from_slice(b"xyz");

        let mut r = FramedReader::new(Cursor::new(data));
        let (seq, mut cursor) = r.open_payload_cursor().await.unwrap();
        assert_eq!(seq, 0);

        let header = cursor.read_exact(1).await.unwrap();
        assert_eq!(header, vec![0xAA]);

        let fixed = cursor.read_exact(4).await.unwrap();
        assert_eq!(u32::from_le_bytes(fixed.try_into().unwrap()), 42);

        let len = cursor.read_int_lenenc().await.unwrap();
        assert_eq!(len, 3);

        let mut sink = Vec::new();
        cursor.copy_n_to(len, &mut sink).await.unwrap();
        assert_eq!(sink, b"xyz");
    }

    #[tokio::test]
    async fn payload_cursor_crosses_continuation_packet_boundary() {
        let mut out = Vec::new();
        let payload = vec![0x42u8; MAX_CHUNK + 5];
        write_payload(&mut out, 0, &payload).await.unwrap();

        let mut r = FramedReader::new(Cursor::new(out));
        let (_, mut cursor) = r.open_payload_cursor().await.unwrap();

        let mut sink = Vec::new();
        cursor.copy_n_to(payload.len() as u64, &mut sink).await.unwrap();
        assert_eq!(sink.len(), payload.len());
        assert!(sink.iter().all(|&b| b == 0x42));
    }

    #[tokio::test]
    async fn payload_cursor_reads_lenenc_int() {
        let mut data = Vec::new();
        write_int_3(&mut data, 3);
        data.push(0);
        data.push(0xFC);
        data.extend_from_slice(&300u16.to_le_bytes());

        let mut r = FramedReader::new(Cursor::new(data));
        let (_, mut cursor) = r.open_payload_cursor().await.unwrap();
        assert_eq!(cursor.read_int_lenenc().await.unwrap(), 300);
    }
}
