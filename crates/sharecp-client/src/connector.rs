//! TCP transport connector.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time;

use sharecp_core::error::{ShareError, ShareResult};
use sharecp_core::transport::Connector;
use sharecp_core::ServerAddr;

/// Connect timeout applied when the caller does not configure one.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a liveness check waits for the reactor to report a pending close.
const LIVENESS_WAIT: Duration = Duration::from_millis(10);

/// An open TCP connection, tagged with the address it was dialed with.
///
/// Dropping it closes the socket.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    server: ServerAddr,
}

impl TcpConnection {
    /// The address this connection was dialed with (not the resolved peer).
    pub fn server(&self) -> &ServerAddr {
        &self.server
    }

    pub fn peer_addr(&self) -> ShareResult<SocketAddr> {
        self.stream
            .peer_addr()
            .map_err(|e| ShareError::Transport(format!("peer address: {e}")))
    }

    /// Fail with a transport error if the peer has closed or reset the
    /// connection. Nothing else reads this socket, so a stray byte consumed
    /// here is never protocol data.
    pub async fn ensure_open(&self) -> ShareResult<()> {
        match time::timeout(LIVENESS_WAIT, self.stream.readable()).await {
            // Nothing pending: idle and open.
            Err(_) => return Ok(()),
            Ok(Err(e)) => {
                return Err(ShareError::Transport(format!("connection to {}: {e}", self.server)));
            }
            Ok(Ok(())) => {}
        }

        let mut byte = [0u8; 1];
        match self.stream.try_read(&mut byte) {
            Ok(0) => Err(ShareError::Transport(format!(
                "connection closed by {}",
                self.server
            ))),
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(ShareError::Transport(format!("connection to {}: {e}", self.server))),
        }
    }

    pub fn stream(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}

/// Dials servers with tokio's `TcpStream` under a hard timeout.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for TcpConnector {
    type Conn = TcpConnection;

    async fn connect(&self, server: &ServerAddr, timeout: Duration) -> ShareResult<TcpConnection> {
        let target = server.socket_target();
        tracing::debug!(server = %server, ?timeout, "dialing");

        let stream = match time::timeout(timeout, TcpStream::connect(target.as_str())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ShareError::Transport(format!("connect to {server}: {e}")));
            }
            Err(_) => return Err(ShareError::Timeout(timeout)),
        };

        stream
            .set_nodelay(true)
            .map_err(|e| ShareError::Transport(format!("configure socket for {server}: {e}")))?;

        tracing::info!(server = %server, "connected");
        Ok(TcpConnection {
            stream,
            server: server.clone(),
        })
    }
}
