//! Per-connection audit records.
//!
//! Every accepted connection produces exactly one record: the peer
//! address, its reverse-DNS hostname when resolvable, and the slug the
//! paste was stored under (or an error sentinel for connections that
//! never produced one). Records always go to the process log; when an
//! audit file is configured each record is also appended as one
//! `slug:ip:hostname` line, open-append-close per record so concurrent
//! handlers never share a file handle.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Slug field written for connections that never produced a paste.
const ERROR_SENTINEL: &str = "error";

/// Audit record sink
pub struct AuditLog {
    /// File records are appended to, if configured
    file: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }

    /// Record one connection. `slug` is `None` for invalid connections.
    pub async fn record(&self, slug: Option<&str>, peer: SocketAddr) {
        let ip = peer.ip();
        let hostname = resolve_hostname(ip)
            .await
            .unwrap_or_else(|| ip.to_string());

        match slug {
            Some(slug) => {
                info!(client = %ip, host = %hostname, slug, "Connection served")
            }
            None => info!(client = %ip, host = %hostname, "Invalid connection"),
        }

        if let Some(path) = &self.file {
            let line = format!("{}:{}:{}\n", slug.unwrap_or(ERROR_SENTINEL), ip, hostname);
            if let Err(e) = append_line(path, &line).await {
                warn!(error = %e, path = %path.display(), "Failed to append audit record");
            }
        }
    }
}

/// Reverse-resolve the peer address. Runs on the blocking pool; the libc
/// resolver can stall for seconds on an unresponsive DNS server.
async fn resolve_hostname(ip: IpAddr) -> Option<String> {
    tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip).ok())
        .await
        .ok()
        .flatten()
}

/// Append one record line, opening and closing the file around it.
async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
