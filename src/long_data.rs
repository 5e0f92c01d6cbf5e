//! Outbound `COM_STMT_SEND_LONG_DATA` chunking. Each `Param::Stream`
//! parameter is drained into one or more of these frames before the
//! `COM_STMT_EXECUTE` packet is written; the parameter's slot in the
//! EXECUTE payload then contributes no inline bytes.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::binary::{write_int_1, write_int_2, write_int_4};
use crate::constant::CommandByte;
use crate::error::{Error, Result};
use crate::framed;

/// MySQL has no hard limit on a `COM_STMT_SEND_LONG_DATA` chunk size short
/// of the 16 MiB packet boundary; 15 MiB leaves headroom for the command
/// header so a single frame never needs splitting by `write_payload`.
const CHUNK_SIZE: usize = 15 * 1024 * 1024;

/// Read `source` to completion, writing one `COM_STMT_SEND_LONG_DATA` frame
/// per `CHUNK_SIZE` bytes. `writer.write_all(...).await` is the only
/// backpressure point: it suspends this task until the socket can accept
/// more, which is this crate's async answer to "pause/resume on drain".
pub async fn send_long_data<W, R>(
    writer: &mut W,
    statement_id: u32,
    param_id: u16,
    mut source: R,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = fill_chunk(&mut source, &mut buf).await?;
        if n == 0 {
            break;
        }

        let mut payload = Vec::with_capacity(7 + n);
        write_int_1(&mut payload, CommandByte::StmtSendLongData as u8);
        write_int_4(&mut payload, statement_id);
        write_int_2(&mut payload, param_id);
        payload.extend_from_slice(&buf[..n]);

        framed::write_payload(writer, 0, &payload).await?;

        if n < buf.len() {
            break;
        }
    }

    Ok(())
}

/// Fill `buf` as much as possible before returning, so a chunk is only
/// short when the source is actually exhausted (a single `AsyncRead::read`
/// call is allowed to return fewer bytes than requested even mid-stream).
async fn fill_chunk<R: AsyncRead + Unpin>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = source.read(&mut buf[total..]).await.map_err(Error::Io)?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_frames(bytes: &[u8]) -> Vec<(u32, u16, Vec<u8>)> {
        let mut frames = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let length = u32::from_le_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], 0]) as usize;
            pos += 4;
            let body = &bytes[pos..pos + length];
            pos += length;
            assert_eq!(body[0], CommandByte::StmtSendLongData as u8);
            let statement_id = u32::from_le_bytes(body[1..5].try_into().unwrap());
            let param_id = u16::from_le_bytes(body[5..7].try_into().unwrap());
            frames.push((statement_id, param_id, body[7..].to_vec()));
        }
        frames
    }

    #[tokio::test]
    async fn small_source_is_one_frame() {
        let mut out = Vec::new();
        send_long_data(&mut out, 1, 0, Cursor::new(b"hello world".to_vec()))
            .await
            .unwrap();

        let frames = parse_frames(&out);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], (1, 0, b"hello world".to_vec()));
    }

    #[tokio::test]
    async fn large_source_splits_into_chunk_sized_frames() {
        let data = vec![0x42u8; CHUNK_SIZE + 100];
        let mut out = Vec::new();
        send_long_data(&mut out, 9, 2, Cursor::new(data.clone())).await.unwrap();

        let frames = parse_frames(&out);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].2.len(), CHUNK_SIZE);
        assert_eq!(frames[1].2.len(), 100);
        assert!(frames.iter().all(|(sid, pid, _)| *sid == 9 && *pid == 2));
    }

    #[tokio::test]
    async fn empty_source_writes_nothing() {
        let mut out = Vec::new();
        send_long_data(&mut out, 1, 0, Cursor::new(Vec::new())).await.unwrap();
        assert!(out.is_empty());
    }
}
