//! Capability traits for each stage of the transfer pipeline.
//!
//! A backend supplies one implementation per stage: a [`Connector`] that dials
//! the server, a [`DialerFactory`] that turns credentials into a [`Dialer`], a
//! [`Negotiator`] that authenticates a [`Session`] over the connection, and the
//! [`Share`] / [`RemoteFile`] handles the session hands out.
//!
//! Release is by ownership. `logoff`, `umount` and `close` consume their
//! handle, and dropping a handle without calling them must still free whatever
//! it holds, so every handle is released exactly once on every path.

use std::time::Duration;

use tokio::io::AsyncWrite;

use crate::address::ServerAddr;
use crate::credentials::{Credentials, Dialer};
use crate::error::ShareResult;

/// Opens a connection-oriented transport to a server.
#[allow(async_fn_in_trait)]
pub trait Connector: Send + Sync {
    type Conn: Send;

    /// Dial `server`, failing with a transport-class error if no connection
    /// is established within `timeout`.
    async fn connect(&self, server: &ServerAddr, timeout: Duration) -> ShareResult<Self::Conn>;
}

/// Builds the dialer configuration used for negotiation. Must not do I/O.
pub trait DialerFactory: Send + Sync {
    fn build(&self, credentials: &Credentials) -> Dialer;
}

/// Authenticates a session over an open connection.
///
/// The connection is moved in. On failure it must be released before the
/// error is returned; on success the session owns it.
#[allow(async_fn_in_trait)]
pub trait Negotiator<C>: Send + Sync {
    type Session: Session;

    async fn negotiate(&self, conn: C, dialer: &Dialer) -> ShareResult<Self::Session>;
}

/// An authenticated session.
#[allow(async_fn_in_trait)]
pub trait Session: Send {
    type Share: Share;

    /// Mount a named share. Missing shares and denied access are `NotFound`.
    async fn mount(&mut self, share: &str) -> ShareResult<Self::Share>;

    /// Log off and release the underlying connection.
    async fn logoff(self) -> ShareResult<()>;
}

/// A mounted share.
#[allow(async_fn_in_trait)]
pub trait Share: Send {
    type File: RemoteFile;

    /// Create (or truncate) a file at `path`, relative to the share root.
    async fn create(&mut self, path: &str) -> ShareResult<Self::File>;

    async fn umount(self) -> ShareResult<()>;
}

/// A writable file on a mounted share.
#[allow(async_fn_in_trait)]
pub trait RemoteFile: AsyncWrite + Unpin + Send {
    /// Finish the file. Data is only guaranteed durable once this returns Ok.
    async fn close(self) -> ShareResult<()>;
}
