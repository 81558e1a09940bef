use crate::error::TransferError;
use crate::session::{Session, SessionConfig};
use log::info;
use std::path::{Path, PathBuf};

/// Local mode: decode an already-framed encrypted file on disk. The frame
/// codec only needs an `AsyncRead`, so a file handle stands in for the
/// socket and the decode path is byte-for-byte the same as a network
/// session. Output lands next to the input as `<input>.out`.
pub async fn run(input: &Path, config: &SessionConfig) -> Result<PathBuf, TransferError> {
    let mut file = tokio::fs::File::open(input).await?;

    let mut target = input.as_os_str().to_os_string();
    target.push(".out");
    let target = PathBuf::from(target);

    let mut session = Session::new();
    info!(
        "Session {:08x}: decoding local file {}",
        session.id(),
        input.display()
    );

    let bytes = session.run(&mut file, config, &target).await?;
    println!("File decoded: {} ({} bytes)", target.display(), bytes);
    Ok(target)
}
