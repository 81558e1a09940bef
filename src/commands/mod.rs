//! # Commands Module
//!
//! The three operating modes of gatorcrypt:
//!
//! ## `receive` (`-d <port>`)
//! Binds the listening socket and accepts connections one at a time.
//! Each connection becomes a session that reads length-prefixed frames,
//! decrypts them in order, and persists the plaintext atomically to the
//! target path. Session failures are logged and the listener keeps
//! waiting; a completed transfer finishes the command.
//!
//! ## `send` (`-s <host:port>`)
//! The companion sender: chunks a local file, encrypts each chunk under
//! an incrementing counter, and streams the frames to a listening
//! receiver, terminated by the zero-length end marker.
//!
//! ## `local` (`-l`)
//! Decodes a framed encrypted file already on disk through the same
//! session path, no socket involved.

pub mod local;
pub mod receive;
pub mod send;
