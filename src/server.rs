//! TCP server for accepting paste connections.
//!
//! One task per accepted connection. A connection carries exactly one
//! payload: the handler reads until the peer closes its write side, the
//! receive buffer fills, or the deadline expires, stores the bytes under
//! a fresh slug, and answers with the paste URL. Connections that never
//! deliver a byte get a fixed diagnostic instead. Payloads larger than
//! the receive buffer are truncated, not rejected.

use crate::audit::AuditLog;
use crate::config::Config;
use crate::storage::PasteStore;
use bytes::BytesMut;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info};

/// Response sent when no payload could be read.
const INVALID_RESPONSE: &[u8] = b"Use netcat.\n";

/// Upper bound on a single read call.
const READ_CHUNK_SIZE: usize = 8192;

/// Server instance
pub struct Server {
    config: Arc<Config>,
    store: Arc<PasteStore>,
    audit: Arc<AuditLog>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let store = Arc::new(PasteStore::new(
            config.output_dir.clone(),
            config.slug_length,
        ));
        let audit = Arc::new(AuditLog::new(config.log_file.clone()));

        Server {
            config: Arc::new(config),
            store,
            audit,
        }
    }

    /// Bind the listening socket and begin accepting connections.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = self.bind()?;
        self.serve(listener).await?;
        Ok(())
    }

    /// Bind the listening socket with address reuse and the configured
    /// backlog. A failure here is fatal for the process.
    pub fn bind(&self) -> io::Result<TcpListener> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.port));
        create_listener(addr, self.config.backlog)
    }

    /// Accept connections forever, spawning one handler task per peer.
    ///
    /// Accept failures are logged and survived; only a dead listening
    /// socket ends the loop.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        info!(address = %listener.local_addr()?, "Server listening");

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "New connection");

                    let config = Arc::clone(&self.config);
                    let store = Arc::clone(&self.store);
                    let audit = Arc::clone(&self.audit);

                    tokio::spawn(async move {
                        handle_connection(stream, addr, config, store, audit).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Handle a single client connection end to end.
///
/// Never propagates errors past the task boundary; the socket is
/// released on every exit path when `stream` drops.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    config: Arc<Config>,
    store: Arc<PasteStore>,
    audit: Arc<AuditLog>,
) {
    let deadline = Duration::from_secs(config.timeout_secs);

    let payload = match read_payload(&mut stream, config.buffer_size, deadline).await {
        Ok(payload) => payload,
        Err(e) => {
            debug!(peer = %peer, error = %e, "Invalid connection");
            audit.record(None, peer).await;
            // Best effort; the peer may already be gone.
            let _ = timeout(deadline, stream.write_all(INVALID_RESPONSE)).await;
            return;
        }
    };

    let stored = match store.store(&payload).await {
        Ok(stored) => stored,
        Err(e) => {
            error!(peer = %peer, error = %e, "Failed to store paste");
            audit.record(None, peer).await;
            let _ = timeout(deadline, stream.write_all(INVALID_RESPONSE)).await;
            return;
        }
    };

    audit.record(Some(&stored.slug), peer).await;

    let response = format!("{}{}/\n", config.domain, stored.slug);
    if let Err(e) = write_response(&mut stream, response.as_bytes(), deadline).await {
        debug!(peer = %peer, error = %e, "Failed to write response");
    }
}

/// Read the payload: until the peer closes its write side or the buffer
/// reaches capacity, whichever comes first.
///
/// Each read call runs under the deadline. A deadline expiring after at
/// least one byte arrived counts as send completion; expiring on an
/// empty buffer, like any read error, marks the connection invalid.
async fn read_payload(
    stream: &mut TcpStream,
    capacity: usize,
    deadline: Duration,
) -> io::Result<BytesMut> {
    let mut buffer = BytesMut::with_capacity(capacity.min(READ_CHUNK_SIZE));

    while buffer.len() < capacity {
        let start = buffer.len();
        let chunk = (capacity - start).min(READ_CHUNK_SIZE);
        buffer.resize(start + chunk, 0);

        match timeout(deadline, stream.read(&mut buffer[start..start + chunk])).await {
            Ok(Ok(0)) => {
                // EOF: client closed its write side
                buffer.truncate(start);
                break;
            }
            Ok(Ok(n)) => buffer.truncate(start + n),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                buffer.truncate(start);
                if buffer.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "no data received before deadline",
                    ));
                }
                // Send completion observed by the deadline
                break;
            }
        }
    }

    Ok(buffer)
}

/// Write the response under the deadline. Not retried on failure.
async fn write_response(
    stream: &mut TcpStream,
    response: &[u8],
    deadline: Duration,
) -> io::Result<()> {
    timeout(deadline, stream.write_all(response))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "response write timed out"))?
}

/// Create a TCP listener with SO_REUSEADDR and the configured backlog.
fn create_listener(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog.min(i32::MAX as u32) as i32)?;

    TcpListener::from_std(socket.into())
}
