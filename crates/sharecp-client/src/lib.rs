//! sharecp-client: async client library for uploading files to a file share.
//!
//! Dials the server over TCP with a bounded timeout, negotiates an
//! NTLM-authenticated session, mounts a named share and streams local files
//! onto it. Each stage sits behind a capability trait from `sharecp-core`, so
//! the default `smbclient`-backed stack can be swapped for the in-memory
//! backend in tests.
//!
//! # Quick Start
//!
//! ```no_run
//! use sharecp_client::{ClientConfig, ShareClient};
//! use sharecp_core::{Credentials, ServerAddr};
//!
//! # async fn example() -> sharecp_core::ShareResult<()> {
//! let server: ServerAddr = "nas.local".parse()?;
//! let config = ClientConfig::new(server, Credentials::new("alice", "secret"), "backups");
//!
//! let mut client = ShareClient::new(config);
//! client.connect().await?;
//! client.mount().await?;
//!
//! let report = client.send("/var/log/app.log", "logs/app.log").await?;
//! println!("sent {} bytes", report.bytes);
//!
//! client.send_many("/srv/out/", "daily/", &["a.csv", "b.csv"]).await?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod client;
pub mod connector;
pub mod dialer;
pub mod transfer;

// Re-export primary public types.
pub use client::{ClientConfig, ClientState, ShareClient};
pub use connector::{TcpConnection, TcpConnector, DEFAULT_CONNECT_TIMEOUT};
pub use dialer::NtlmDialerFactory;
pub use transfer::TransferReport;

// Re-export sharecp-core error types for convenience.
pub use sharecp_core::{ShareError, ShareResult};
