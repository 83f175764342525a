//! textdrop: a netcat-friendly pastebin server
//!
//! Clients pipe bytes over a raw TCP connection; the server stores them
//! under a short random slug and answers with a URL:
//!
//! ```text
//! $ cat notes.txt | nc localhost 9999
//! http://localhost/xK3d/
//! ```
//!
//! Features:
//! - One stored paste per connection, no protocol to speak
//! - Collision-free slugs via exclusive directory creation
//! - Per-connection read/write deadlines
//! - Optional slug:ip:hostname audit log
//! - Configuration via CLI arguments or TOML file

mod audit;
mod config;
mod server;
mod slug;
mod storage;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration; a bad configuration ends the process before
    // any socket is opened.
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        domain = %config.domain,
        output_dir = %config.output_dir.display(),
        port = config.port,
        "Starting textdrop server"
    );

    Server::new(config).run().await
}
