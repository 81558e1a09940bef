//! Per-connection state machine: read a frame, decrypt it with the running
//! chunk counter, append to the sink, until the end-of-stream marker. Any
//! error tears the session down, removes the partial output, and leaves the
//! server loop alive.

use crate::cryptography::decrypt_chunk;
use crate::error::TransferError;
use crate::frame::read_frame;
use crate::sink::FileSink;
use crate::{KEY_SIZE, MAX_FRAME_SIZE};
use log::{debug, info, warn};
use rand::Rng;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncRead;

/// Everything a session needs beyond its socket: the derived key and the
/// knobs from the CLI. Cheap to copy into each session.
#[derive(Clone)]
pub struct SessionConfig {
    pub key: [u8; KEY_SIZE],
    pub max_frame_size: usize,
    pub idle_timeout: Duration,
}

impl SessionConfig {
    pub fn new(key: [u8; KEY_SIZE], idle_timeout: Duration) -> Self {
        SessionConfig {
            key,
            max_frame_size: MAX_FRAME_SIZE,
            idle_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Handshake,
    Streaming,
    Finalizing,
    Closed,
    Error,
}

/// One accepted connection. Owns its cipher state (the chunk counter) and
/// its output handle exclusively; nothing here is shared across sessions.
pub struct Session {
    id: u32,
    state: SessionState,
    chunk_index: u64,
    bytes_received: u64,
}

impl Session {
    pub fn new() -> Session {
        Session {
            id: rand::rng().random::<u32>(),
            state: SessionState::Accepted,
            chunk_index: 0,
            bytes_received: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to completion: decrypt the framed stream into
    /// `target`. On success the temp file has been renamed to `target` and
    /// the byte count is returned; on any error the temp file is gone and
    /// `target` untouched.
    pub async fn run<R>(
        &mut self,
        stream: &mut R,
        config: &SessionConfig,
        target: &Path,
    ) -> Result<u64, TransferError>
    where
        R: AsyncRead + Unpin,
    {
        // "Handshake" is implicit: cipher state is initialized from the
        // pre-shared key, no bytes cross the wire.
        self.state = SessionState::Handshake;
        debug!("Session {:08x}: cipher state initialized", self.id);

        let mut sink = FileSink::open(target)?;
        self.state = SessionState::Streaming;

        match self.stream_frames(stream, config, &mut sink).await {
            Ok(()) => {
                self.state = SessionState::Finalizing;
                match sink.finalize() {
                    Ok(path) => {
                        self.state = SessionState::Closed;
                        info!(
                            "Session {:08x}: received {} bytes in {} chunks -> {}",
                            self.id,
                            self.bytes_received,
                            self.chunk_index,
                            path.display()
                        );
                        Ok(self.bytes_received)
                    }
                    Err(e) => {
                        self.state = SessionState::Error;
                        Err(TransferError::Io(e))
                    }
                }
            }
            Err(e) => {
                self.state = SessionState::Error;
                warn!("Session {:08x}: aborted ({}): {}", self.id, e.kind(), e);
                sink.abort();
                Err(e)
            }
        }
    }

    /// The streaming loop: frame -> decrypt -> append, in strict arrival
    /// order, until the zero-length end marker.
    async fn stream_frames<R>(
        &mut self,
        stream: &mut R,
        config: &SessionConfig,
        sink: &mut FileSink,
    ) -> Result<(), TransferError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            // the codec applies the idle deadline per socket read, so a
            // slow but live peer is never dropped as stalled
            let frame = read_frame(stream, config.max_frame_size, config.idle_timeout).await?;

            let ciphertext = match frame {
                Some(bytes) => bytes,
                None => {
                    debug!(
                        "Session {:08x}: end-of-stream after {} chunks",
                        self.id, self.chunk_index
                    );
                    return Ok(());
                }
            };

            debug!(
                "Session {:08x}: frame {} ({} bytes ciphertext)",
                self.id,
                self.chunk_index,
                ciphertext.len()
            );

            let plaintext = decrypt_chunk(&config.key, &ciphertext, self.chunk_index)
                .map_err(|_| TransferError::Auth)?;

            sink.append(&plaintext)?;
            self.bytes_received += plaintext.len() as u64;
            self.chunk_index += 1;
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}
