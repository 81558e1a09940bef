//! Wire framing: every frame is a 4-byte big-endian length prefix followed
//! by exactly that many bytes of ciphertext. A zero length is the
//! end-of-stream marker; nothing follows it.

use crate::error::TransferError;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// One socket read with the idle deadline applied. Every successful read
/// resets the deadline, so a peer is "stalled" only after delivering zero
/// bytes for the whole timeout; a slow trickle stays alive.
async fn read_some<R>(
    stream: &mut R,
    buf: &mut [u8],
    idle_timeout: Duration,
) -> Result<usize, TransferError>
where
    R: AsyncRead + Unpin,
{
    match timeout(idle_timeout, stream.read(buf)).await {
        Ok(result) => {
            result.map_err(|e| TransferError::Connection(format!("socket read: {}", e)))
        }
        Err(_) => Err(TransferError::Connection(format!(
            "no bytes received for {:?}, dropping stalled peer",
            idle_timeout
        ))),
    }
}

/// Read one frame from the stream.
///
/// Returns `Ok(None)` for the zero-length end-of-stream marker. A length
/// prefix above `max_frame_size` is rejected before any payload buffer is
/// allocated. A connection that closes before the header or payload is
/// complete is a `Connection` error: the peer vanished without sending the
/// end marker.
pub async fn read_frame<R>(
    stream: &mut R,
    max_frame_size: usize,
    idle_timeout: Duration,
) -> Result<Option<Vec<u8>>, TransferError>
where
    R: AsyncRead + Unpin,
{
    // Header is read byte-wise so a close at a frame boundary (peer
    // vanished without the end marker) can be told apart from a close
    // mid-header (truncated frame).
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = read_some(stream, &mut header[filled..], idle_timeout).await?;
        if n == 0 {
            return Err(if filled == 0 {
                TransferError::Connection(
                    "connection closed before end-of-stream marker".to_string(),
                )
            } else {
                TransferError::Protocol(format!(
                    "connection closed mid-header after {} of 4 length bytes",
                    filled
                ))
            });
        }
        filled += n;
    }

    let length = u32::from_be_bytes(header);
    if length == 0 {
        return Ok(None);
    }

    let length = length as usize;
    if length > max_frame_size {
        return Err(TransferError::Protocol(format!(
            "frame length {} exceeds maximum {}",
            length, max_frame_size
        )));
    }

    // accumulate partial socket reads until the full payload arrives or
    // the peer closes early
    let mut payload = vec![0u8; length];
    let mut filled = 0;
    while filled < length {
        let n = read_some(stream, &mut payload[filled..], idle_timeout).await?;
        if n == 0 {
            return Err(TransferError::Connection(format!(
                "connection closed mid-payload after {} of {} bytes",
                filled, length
            )));
        }
        filled += n;
    }

    Ok(Some(payload))
}

/// Write one frame: length prefix, then the ciphertext.
pub async fn write_frame<W>(stream: &mut W, payload: &[u8]) -> Result<(), TransferError>
where
    W: AsyncWrite + Unpin,
{
    stream
        .write_u32(payload.len() as u32)
        .await
        .map_err(|e| TransferError::Connection(format!("writing frame header: {}", e)))?;
    stream
        .write_all(payload)
        .await
        .map_err(|e| TransferError::Connection(format!("writing frame payload: {}", e)))?;
    Ok(())
}

/// Write the zero-length frame that terminates a stream.
pub async fn write_end_of_stream<W>(stream: &mut W) -> Result<(), TransferError>
where
    W: AsyncWrite + Unpin,
{
    stream
        .write_u32(0)
        .await
        .map_err(|e| TransferError::Connection(format!("writing end-of-stream marker: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_FRAME_SIZE;

    const IDLE: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        write_frame(&mut client, b"some ciphertext bytes")
            .await
            .expect("Should write frame");

        let frame = read_frame(&mut server, MAX_FRAME_SIZE, IDLE)
            .await
            .expect("Should read frame")
            .expect("Should not be end-of-stream");

        assert_eq!(frame, b"some ciphertext bytes");
    }

    #[tokio::test]
    async fn test_end_of_stream_marker() {
        let (mut client, mut server) = tokio::io::duplex(64);

        write_end_of_stream(&mut client).await.expect("Should write marker");

        let frame = read_frame(&mut server, MAX_FRAME_SIZE, IDLE)
            .await
            .expect("Should read marker cleanly");

        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        // 16 MiB claimed, no payload behind it
        let wire = 0x0100_0000u32.to_be_bytes();
        let mut reader: &[u8] = &wire;

        let err = read_frame(&mut reader, MAX_FRAME_SIZE, IDLE)
            .await
            .expect_err("Oversized length must be rejected");

        assert_eq!(err.kind(), "protocol");
    }

    #[tokio::test]
    async fn test_length_just_over_maximum() {
        let wire = ((MAX_FRAME_SIZE + 1) as u32).to_be_bytes();
        let mut reader: &[u8] = &wire;

        let err = read_frame(&mut reader, MAX_FRAME_SIZE, IDLE)
            .await
            .expect_err("Length one past the cap must be rejected");

        assert_eq!(err.kind(), "protocol");
    }

    #[tokio::test]
    async fn test_truncated_header() {
        // only 2 of the 4 header bytes arrive before close
        let wire = [0x00u8, 0x00];
        let mut reader: &[u8] = &wire;

        let err = read_frame(&mut reader, MAX_FRAME_SIZE, IDLE)
            .await
            .expect_err("Truncated header must fail");

        assert_eq!(err.kind(), "protocol");
    }

    #[tokio::test]
    async fn test_close_at_frame_boundary() {
        // no header bytes at all: the peer vanished without the end marker
        let mut reader: &[u8] = &[];

        let err = read_frame(&mut reader, MAX_FRAME_SIZE, IDLE)
            .await
            .expect_err("Close without end marker must fail");

        assert_eq!(err.kind(), "connection");
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        // header claims 5 bytes, only 2 arrive
        let mut wire = Vec::new();
        wire.extend_from_slice(&5u32.to_be_bytes());
        wire.extend_from_slice(b"he");
        let mut reader: &[u8] = &wire;

        let err = read_frame(&mut reader, MAX_FRAME_SIZE, IDLE)
            .await
            .expect_err("Truncated payload must fail");

        assert_eq!(err.kind(), "connection");
    }

    #[tokio::test]
    async fn test_multiple_frames_in_order() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        write_frame(&mut client, b"first").await.unwrap();
        write_frame(&mut client, b"second").await.unwrap();
        write_end_of_stream(&mut client).await.unwrap();

        let first = read_frame(&mut server, MAX_FRAME_SIZE, IDLE).await.unwrap();
        let second = read_frame(&mut server, MAX_FRAME_SIZE, IDLE).await.unwrap();
        let end = read_frame(&mut server, MAX_FRAME_SIZE, IDLE).await.unwrap();

        assert_eq!(first.unwrap(), b"first");
        assert_eq!(second.unwrap(), b"second");
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_slow_trickle_is_not_stalled() {
        // one payload byte every 40ms against a 100ms deadline: the whole
        // frame takes longer than the deadline, but no single silent gap
        // does, so the read must succeed
        let (mut client, mut server) = tokio::io::duplex(64);

        let writer = tokio::spawn(async move {
            client.write_u32(5).await.unwrap();
            for byte in *b"drips" {
                tokio::time::sleep(Duration::from_millis(40)).await;
                client.write_all(&[byte]).await.unwrap();
            }
        });

        let frame = read_frame(&mut server, MAX_FRAME_SIZE, Duration::from_millis(100))
            .await
            .expect("Trickling peer must not be dropped")
            .expect("Should be a data frame");

        writer.await.unwrap();
        assert_eq!(frame, b"drips");
    }

    #[tokio::test]
    async fn test_silence_mid_header_times_out() {
        let (mut client, mut server) = tokio::io::duplex(64);

        // two header bytes, then the peer goes quiet with the connection open
        client.write_all(&[0x00, 0x00]).await.unwrap();

        let err = read_frame(&mut server, MAX_FRAME_SIZE, Duration::from_millis(100))
            .await
            .expect_err("Silent peer must be dropped");

        assert_eq!(err.kind(), "connection");
        drop(client);
    }

    #[tokio::test]
    async fn test_frame_at_maximum_size() {
        let (mut client, mut server) = tokio::io::duplex(MAX_FRAME_SIZE + 16);
        let payload = vec![0x5Au8; MAX_FRAME_SIZE];

        let writer = async {
            write_frame(&mut client, &payload).await.unwrap();
        };
        let reader = async {
            read_frame(&mut server, MAX_FRAME_SIZE, IDLE)
                .await
                .unwrap()
                .unwrap()
        };

        let (_, frame) = tokio::join!(writer, reader);
        assert_eq!(frame.len(), MAX_FRAME_SIZE);
        assert!(frame.iter().all(|&b| b == 0x5A));
    }
}
