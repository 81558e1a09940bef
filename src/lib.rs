pub mod commands;
pub mod cryptography;
pub mod error;
pub mod frame;
pub mod session;
pub mod sink;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const CHUNK_SIZE: usize = 1024;
pub const ENCRYPTION_OVERHEAD: usize = 16;
pub const PLAINTEXT_CHUNK_SIZE: usize = CHUNK_SIZE - ENCRYPTION_OVERHEAD;

/// Upper bound on a single frame's ciphertext. A peer claiming more than
/// this in a length prefix is rejected before any allocation happens.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Seconds of socket silence before a session is dropped as stalled.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

/// Suffix appended to the target path while a transfer is in flight.
pub const TEMP_SUFFIX: &str = ".part";
