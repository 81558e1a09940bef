use clap::{ArgGroup, Parser};
use gatorcrypt::cryptography::load_key;
use gatorcrypt::session::SessionConfig;
use gatorcrypt::DEFAULT_IDLE_TIMEOUT_SECS;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "gatorcrypt")]
#[command(about = "Secure length-framed file transfer over TCP", long_about = None)]
#[command(version)]
#[command(group(ArgGroup::new("mode").required(true).args(["listen_port", "local", "send"])))]
struct Cli {
    /// Target file to write (receive mode), or the file to send/decode
    file: PathBuf,

    /// Listen on this port and receive a file
    #[arg(short = 'd', long = "listen", value_name = "PORT")]
    listen_port: Option<u16>,

    /// Decode a locally stored encrypted file
    #[arg(short = 'l', long = "local")]
    local: bool,

    /// Send the file to a listening receiver at host:port
    #[arg(short = 's', long = "send", value_name = "ADDR")]
    send: Option<String>,

    /// Read the pre-shared secret from this file (default: GATORCRYPT_KEY env var)
    #[arg(short = 'k', long = "key-file", value_name = "PATH")]
    key_file: Option<PathBuf>,

    /// Idle timeout in seconds before a stalled peer is dropped
    #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT_SECS, value_name = "SECS")]
    timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // Configure logging based on verbose flag
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
        log::info!("Verbose logging enabled");
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let key = load_key(cli.key_file.as_deref())?;
    let config = SessionConfig::new(key, Duration::from_secs(cli.timeout));

    if let Some(port) = cli.listen_port {
        gatorcrypt::commands::receive::run(&cli.file, port, config).await?;
    } else if let Some(addr) = cli.send {
        gatorcrypt::commands::send::run(&cli.file, &addr, &config).await?;
    } else {
        // the mode ArgGroup is required, so the remaining mode is -l
        debug_assert!(cli.local);
        gatorcrypt::commands::local::run(&cli.file, &config).await?;
    }

    Ok(())
}
