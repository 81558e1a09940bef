use crate::error::TransferError;
use crate::session::{Session, SessionConfig};
use indicatif::ProgressBar;
use log::{debug, error, info};
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;

/// Run the listening side: bind the port, accept connections, and drive
/// one session at a time until a transfer completes.
///
/// Sessions are handled sequentially because they all write the single
/// target path given on the command line; each session must own that
/// output exclusively. A failed session (bad peer, tampered stream,
/// timeout) is logged with its error kind and the listener keeps waiting
/// for the next attempt. Only bind/accept failures escape this function.
pub async fn run(
    target: &Path,
    port: u16,
    config: SessionConfig,
) -> Result<(), TransferError> {
    let bind_addr = format!("0.0.0.0:{}", port);
    debug!("Attempting to bind to {}", bind_addr);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(TransferError::Socket)?;
    println!("Listening on {}", bind_addr);
    info!("Receiver listening on {}", bind_addr);

    loop {
        let spinner = ProgressBar::new_spinner();
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message("Waiting to receive file");

        // Ctrl-C cancels a pending accept promptly instead of hanging.
        let (mut stream, addr) = tokio::select! {
            accepted = listener.accept() => accepted.map_err(TransferError::Socket)?,
            _ = tokio::signal::ctrl_c() => {
                spinner.finish_with_message("Shutdown requested");
                info!("Shutdown requested, closing listener");
                return Ok(());
            }
        };

        spinner.finish_with_message(format!("Connection from {}", addr));
        info!("Accepted connection from {}", addr);

        let mut session = Session::new();
        debug!("Session {:08x}: handling peer {}", session.id(), addr);

        match session.run(&mut stream, &config, target).await {
            Ok(bytes) => {
                println!("File saved: {} ({} bytes)", target.display(), bytes);
                return Ok(());
            }
            Err(e) => {
                // session-fatal only: partial output is already discarded,
                // go back to listening
                error!(
                    "Session {:08x} from {} failed ({}): {}",
                    session.id(),
                    addr,
                    e.kind(),
                    e
                );
            }
        }
    }
}
