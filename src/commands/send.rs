use crate::cryptography::encrypt_chunk;
use crate::error::TransferError;
use crate::frame::{write_end_of_stream, write_frame};
use crate::session::SessionConfig;
use crate::PLAINTEXT_CHUNK_SIZE;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Read one plaintext chunk from the input. Sized so the ciphertext
/// (plaintext + 16-byte tag) stays within one CHUNK_SIZE frame.
fn read_chunk<R: Read>(source: &mut R) -> std::io::Result<(Vec<u8>, usize)> {
    let mut buffer = vec![0; PLAINTEXT_CHUNK_SIZE];
    let bytes_read = source.read(&mut buffer)?;
    buffer.truncate(bytes_read);
    Ok((buffer, bytes_read))
}

/// Send `input` to the receiver at `addr`: chunk, encrypt each chunk under
/// the incrementing counter, frame it, and finish with the zero-length
/// end-of-stream marker.
pub async fn run(input: &Path, addr: &str, config: &SessionConfig) -> Result<(), TransferError> {
    let mut file = File::open(input)?;
    let file_size = file.metadata()?.len();
    debug!("Sending {} ({} bytes) to {}", input.display(), file_size, addr);

    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| TransferError::Connection(format!("connecting to {}: {}", addr, e)))?;

    let total_chunks = file_size.div_ceil(PLAINTEXT_CHUNK_SIZE as u64);
    let bar = ProgressBar::new(total_chunks);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.black}] {pos}/{len} chunks ({eta}) {msg}")
            .unwrap(),
    );

    let mut chunk_index: u64 = 0;
    loop {
        let (buffer, bytes_read) = read_chunk(&mut file)?;
        if bytes_read == 0 {
            debug!("Finished reading input, total chunks: {}", chunk_index);
            break;
        }

        let encrypted = encrypt_chunk(&config.key, &buffer, chunk_index)
            .map_err(|_| TransferError::Auth)?;
        debug!(
            "Sending chunk {}: {} bytes ciphertext",
            chunk_index,
            encrypted.len()
        );

        write_frame(&mut stream, &encrypted).await?;
        chunk_index += 1;
        bar.inc(1);
    }

    write_end_of_stream(&mut stream).await?;
    stream
        .flush()
        .await
        .map_err(|e| TransferError::Connection(format!("flushing stream: {}", e)))?;

    bar.finish_with_message("Transfer complete");
    println!("Sent {} bytes in {} chunks", file_size, chunk_index);
    Ok(())
}
