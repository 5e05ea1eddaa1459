//! The sharecp client facade.
//!
//! `ShareClient` walks the pipeline Disconnected -> Connected -> Mounted and
//! owns whatever each stage produced. The session and share stay alive until
//! [`ShareClient::close`] (or drop), and are released exactly once, share
//! first.

use std::path::Path;
use std::time::Duration;

use sharecp_core::error::{ShareError, ShareResult};
use sharecp_core::transport::{Connector, DialerFactory, Negotiator, Session, Share};
use sharecp_core::{Credentials, Secret, ServerAddr};

use crate::backend::smbclient::SmbclientNegotiator;
use crate::connector::{TcpConnector, DEFAULT_CONNECT_TIMEOUT};
use crate::dialer::NtlmDialerFactory;
use crate::transfer::{self, TransferReport};

/// Configuration for a share client. Fixed once the client is built.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server to dial.
    pub server: ServerAddr,
    /// Credentials for session negotiation.
    pub credentials: Credentials,
    /// Share to mount.
    pub share: String,
    /// Bound on establishing the transport connection.
    pub connect_timeout: Duration,
    /// Bound on negotiation, mount, and each single-file transfer.
    pub operation_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(server: ServerAddr, credentials: Credentials, share: impl Into<String>) -> Self {
        Self {
            server,
            credentials,
            share: share.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// Where a client is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connected,
    Mounted,
}

type SessionOf<C, N> = <N as Negotiator<<C as Connector>::Conn>>::Session;
type ShareOf<C, N> = <SessionOf<C, N> as Session>::Share;

/// Client for one server, one set of credentials and one share.
///
/// The connector, dialer factory and negotiator are type parameters, so a
/// test or alternate backend is chosen at construction with
/// [`ShareClient::with_strategies`] and the orchestration stays the same.
/// Every operation takes `&mut self`; use one client per concurrent worker.
pub struct ShareClient<C = TcpConnector, D = NtlmDialerFactory, N = SmbclientNegotiator>
where
    C: Connector,
    D: DialerFactory,
    N: Negotiator<C::Conn>,
{
    config: ClientConfig,
    connector: C,
    dialer: D,
    negotiator: N,
    session: Option<SessionOf<C, N>>,
    share: Option<ShareOf<C, N>>,
}

impl ShareClient {
    /// A client wired with the TCP connector, NTLM dialer and `smbclient`
    /// negotiator.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_strategies(
            config,
            TcpConnector::new(),
            NtlmDialerFactory,
            SmbclientNegotiator::new(),
        )
    }

    /// Parse `server` (`host[:port]`) and build a default client for one
    /// account and share.
    pub fn for_server(
        server: &str,
        username: impl Into<String>,
        password: impl Into<Secret>,
        share: impl Into<String>,
    ) -> ShareResult<Self> {
        let server: ServerAddr = server.parse()?;
        let credentials = Credentials::new(username, password);
        Ok(Self::new(ClientConfig::new(server, credentials, share)))
    }

    /// Like [`ShareClient::new`] with a specific `smbclient` binary.
    pub fn with_smbclient(config: ClientConfig, program: impl Into<std::path::PathBuf>) -> Self {
        Self::with_strategies(
            config,
            TcpConnector::new(),
            NtlmDialerFactory,
            SmbclientNegotiator::with_program(program),
        )
    }
}

impl<C, D, N> ShareClient<C, D, N>
where
    C: Connector,
    D: DialerFactory,
    N: Negotiator<C::Conn>,
{
    pub fn with_strategies(config: ClientConfig, connector: C, dialer: D, negotiator: N) -> Self {
        Self {
            config,
            connector,
            dialer,
            negotiator,
            session: None,
            share: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ClientState {
        match (&self.session, &self.share) {
            (_, Some(_)) => ClientState::Mounted,
            (Some(_), None) => ClientState::Connected,
            (None, None) => ClientState::Disconnected,
        }
    }

    /// Dial the server and negotiate an authenticated session.
    ///
    /// Requires `Disconnected`. On error the state is unchanged and the
    /// connection, if one was opened, has been released.
    pub async fn connect(&mut self) -> ShareResult<()> {
        if self.session.is_some() {
            return Err(ShareError::InvalidState("already connected".into()));
        }

        let server = &self.config.server;
        let conn = self
            .connector
            .connect(server, self.config.connect_timeout)
            .await?;
        let dialer = self.dialer.build(&self.config.credentials);
        let session = transfer::within(
            self.config.operation_timeout,
            self.negotiator.negotiate(conn, &dialer),
        )
        .await?;

        tracing::info!(
            server = %server,
            user = %self.config.credentials.username,
            "connected"
        );
        self.session = Some(session);
        Ok(())
    }

    /// Mount the configured share. Requires `Connected`.
    pub async fn mount(&mut self) -> ShareResult<()> {
        if self.share.is_some() {
            return Err(ShareError::InvalidState("already mounted".into()));
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ShareError::InvalidState("mount requires a connected session".into()))?;

        let share = transfer::within(
            self.config.operation_timeout,
            session.mount(&self.config.share),
        )
        .await?;

        tracing::info!(share = %self.config.share, "mounted");
        self.share = Some(share);
        Ok(())
    }

    fn mounted_share(&mut self) -> ShareResult<&mut ShareOf<C, N>> {
        self.share
            .as_mut()
            .ok_or_else(|| ShareError::InvalidState("transfer requires a mounted share".into()))
    }

    /// Copy one local file to `destination` on the share. Requires `Mounted`.
    pub async fn send(
        &mut self,
        source: impl AsRef<Path>,
        destination: &str,
    ) -> ShareResult<TransferReport> {
        self.send_with_progress(source, destination, |_, _| {}).await
    }

    /// [`ShareClient::send`] with a `(bytes_sent, total)` progress callback.
    pub async fn send_with_progress<F>(
        &mut self,
        source: impl AsRef<Path>,
        destination: &str,
        on_progress: F,
    ) -> ShareResult<TransferReport>
    where
        F: FnMut(u64, u64),
    {
        let limit = self.config.operation_timeout;
        let share = self.mounted_share()?;
        transfer::within(
            limit,
            transfer::send(share, source.as_ref(), destination, on_progress),
        )
        .await
    }

    /// Copy `source_prefix + name` to `destination_prefix + name` for each
    /// name in order, stopping at the first failure. Requires `Mounted`.
    pub async fn send_many<S: AsRef<str>>(
        &mut self,
        source_prefix: &str,
        destination_prefix: &str,
        file_names: &[S],
    ) -> ShareResult<Vec<TransferReport>> {
        self.send_many_with_progress(source_prefix, destination_prefix, file_names, |_, _, _| {})
            .await
    }

    /// [`ShareClient::send_many`] with a `(name, bytes_sent, total)` callback.
    pub async fn send_many_with_progress<S, F>(
        &mut self,
        source_prefix: &str,
        destination_prefix: &str,
        file_names: &[S],
        on_progress: F,
    ) -> ShareResult<Vec<TransferReport>>
    where
        S: AsRef<str>,
        F: FnMut(&str, u64, u64),
    {
        let limit = self.config.operation_timeout;
        let share = self.mounted_share()?;
        transfer::send_many(
            share,
            source_prefix,
            destination_prefix,
            file_names,
            limit,
            on_progress,
        )
        .await
    }

    /// Unmount the share and log off, returning to `Disconnected`.
    ///
    /// Both releases are attempted; the first error is returned. Closing a
    /// disconnected client is a no-op.
    pub async fn close(&mut self) -> ShareResult<()> {
        let mut first_err = None;

        if let Some(share) = self.share.take() {
            if let Err(e) = share.umount().await {
                tracing::warn!(share = %self.config.share, "unmount failed: {}", e);
                first_err = Some(e);
            }
        }
        if let Some(session) = self.session.take() {
            if let Err(e) = session.logoff().await {
                tracing::warn!(server = %self.config.server, "logoff failed: {}", e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<C, D, N> Drop for ShareClient<C, D, N>
where
    C: Connector,
    D: DialerFactory,
    N: Negotiator<C::Conn>,
{
    fn drop(&mut self) {
        if self.session.is_some() {
            tracing::warn!(
                server = %self.config.server,
                "client dropped without close; releasing share and session"
            );
        }
        drop(self.share.take());
        drop(self.session.take());
    }
}
