use thiserror::Error;

/// Error kinds for one transfer. Only `Socket` is fatal to the whole
/// process; everything else tears down a single session and the server
/// keeps listening.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Bind/listen/accept failed. Without a listening socket there is no
    /// server to run, so this one aborts the process.
    #[error("socket error: {0}")]
    Socket(std::io::Error),

    /// The peer disconnected mid-stream or went silent past the idle
    /// timeout.
    #[error("connection error: {0}")]
    Connection(String),

    /// The peer sent bytes that don't form a valid frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A frame failed AEAD verification: tampered, replayed, or reordered
    /// ciphertext. Partial output is discarded, never retried.
    #[error("authentication failure: ciphertext rejected")]
    Auth,

    /// Local filesystem trouble while writing the output.
    #[error("file i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Short kind tag used in per-session log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::Socket(_) => "socket",
            TransferError::Connection(_) => "connection",
            TransferError::Protocol(_) => "protocol",
            TransferError::Auth => "auth",
            TransferError::Io(_) => "io",
        }
    }
}
