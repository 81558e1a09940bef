use crate::{KEY_SIZE, NONCE_SIZE};
use chacha20poly1305::aead::Error as AeadError;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use std::io;
use std::path::Path;

/// Environment variable consulted for the pre-shared secret when no key
/// file is given.
pub const KEY_ENV_VAR: &str = "GATORCRYPT_KEY";

/// Expand a pre-shared secret of any length into the 32-byte session key.
pub fn derive_session_key(secret: &[u8]) -> [u8; KEY_SIZE] {
    let hkdf = Hkdf::<Sha256>::new(None, secret);
    let mut encryption_key = [0u8; KEY_SIZE];
    hkdf.expand(b"gatorcrypt-file-encryption", &mut encryption_key)
        .expect("32 bytes is a valid length for HKDF");
    encryption_key
}

/// Load the pre-shared secret and derive the session key from it.
///
/// Order: explicit key file if given, otherwise the `GATORCRYPT_KEY`
/// environment variable. Loaded once at startup; both sides of a transfer
/// must be configured with the same secret. There is no key exchange on
/// the wire, and because every session restarts the chunk counter at
/// zero, sending two different files under the same secret reuses
/// (key, nonce) pairs — rotate the secret per transfer. Both are known
/// limitations of the pre-shared-key design.
pub fn load_key(key_file: Option<&Path>) -> io::Result<[u8; KEY_SIZE]> {
    if let Some(path) = key_file {
        let secret = std::fs::read(path)?;
        if secret.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("key file {} is empty", path.display()),
            ));
        }
        return Ok(derive_session_key(&secret));
    }

    match std::env::var(KEY_ENV_VAR) {
        Ok(secret) if !secret.trim().is_empty() => {
            Ok(derive_session_key(secret.trim().as_bytes()))
        }
        _ => Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no key configured: pass --key-file or set {}", KEY_ENV_VAR),
        )),
    }
}

/// Build the per-chunk nonce: the chunk counter in the low 8 bytes of a
/// 12-byte nonce. Binding the counter into the nonce makes chunk order
/// part of authentication, so replayed or reordered frames fail to
/// decrypt.
fn chunk_nonce(chunk_index: u64) -> [u8; NONCE_SIZE] {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    nonce_bytes[..8].copy_from_slice(&chunk_index.to_le_bytes());
    nonce_bytes
}

pub fn encrypt_chunk(
    key: &[u8; KEY_SIZE],
    chunk: &[u8],
    chunk_index: u64,
) -> Result<Vec<u8>, AeadError> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let nonce_bytes = chunk_nonce(chunk_index);
    let nonce = Nonce::from_slice(&nonce_bytes);

    cipher.encrypt(nonce, chunk)
}

/// Decrypt and authenticate one chunk. Fails if the ciphertext was
/// tampered with or if `chunk_index` doesn't match the index it was
/// encrypted under.
pub fn decrypt_chunk(
    key: &[u8; KEY_SIZE],
    encrypted_chunk: &[u8],
    chunk_index: u64,
) -> Result<Vec<u8>, AeadError> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let nonce_bytes = chunk_nonce(chunk_index);
    let nonce = Nonce::from_slice(&nonce_bytes);

    cipher.decrypt(nonce, encrypted_chunk)
}
