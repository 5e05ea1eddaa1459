//! In-memory backend for tests and dry runs.
//!
//! A [`MemoryServer`] describes accepted users, existing shares and injected
//! faults. Its connector and negotiator implement the same capability traits
//! as the real backend, and every acquisition and release is counted in a
//! shared [`Ledger`] so callers can check nothing leaked. Drops and explicit
//! `close`/`umount`/`logoff` calls are counted separately, and the explicit
//! ones are also kept in call order.
//!
//! Remote files are write-through: `create` truncates the entry immediately
//! and each write appends to it, so an interrupted copy leaves a partial file
//! just as a real share would.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::AsyncWrite;

use sharecp_core::credentials::{Dialer, Initiator};
use sharecp_core::error::{ShareError, ShareResult};
use sharecp_core::transport::{Connector, Negotiator, RemoteFile, Session, Share};
use sharecp_core::ServerAddr;

/// Acquisition and release counts recorded by the in-memory backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub connections_opened: usize,
    pub connections_closed: usize,
    pub sessions_opened: usize,
    pub sessions_released: usize,
    pub shares_mounted: usize,
    pub shares_released: usize,
    pub files_created: usize,
    pub files_released: usize,
    pub closes: usize,
    pub umounts: usize,
    pub logoffs: usize,
}

impl LedgerCounts {
    /// Every acquired resource has been released exactly once.
    pub fn is_balanced(&self) -> bool {
        self.connections_opened == self.connections_closed
            && self.sessions_opened == self.sessions_released
            && self.shares_mounted == self.shares_released
            && self.files_created == self.files_released
    }
}

/// An explicit release call, as recorded by [`Ledger::releases`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Close,
    Umount,
    Logoff,
}

#[derive(Debug, Default)]
struct LedgerState {
    counts: LedgerCounts,
    releases: Vec<Release>,
    files: BTreeMap<String, Vec<u8>>,
}

/// Shared record of what the in-memory backend did.
#[derive(Debug, Default)]
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl Ledger {
    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, f: impl FnOnce(&mut LedgerCounts)) {
        f(&mut self.lock().counts);
    }

    fn release(&self, release: Release) {
        let mut state = self.lock();
        match release {
            Release::Close => state.counts.closes += 1,
            Release::Umount => state.counts.umounts += 1,
            Release::Logoff => state.counts.logoffs += 1,
        }
        state.releases.push(release);
    }

    pub fn counts(&self) -> LedgerCounts {
        self.lock().counts
    }

    /// Explicit release calls in the order they happened.
    pub fn releases(&self) -> Vec<Release> {
        self.lock().releases.clone()
    }

    /// Contents of a remote file, by share-relative path.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&normalize(path)).cloned()
    }

    /// Remote file paths in sorted order.
    pub fn file_names(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

#[derive(Debug, Clone)]
struct ServerConfig {
    reachable: bool,
    black_hole: bool,
    reset_during_negotiation: bool,
    negotiation_delay: Option<Duration>,
    anonymous: bool,
    users: HashMap<String, String>,
    shares: HashSet<String>,
    fail_create: HashSet<String>,
    fail_write: HashSet<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            reachable: true,
            black_hole: false,
            reset_during_negotiation: false,
            negotiation_delay: None,
            anonymous: false,
            users: HashMap::new(),
            shares: HashSet::new(),
            fail_create: HashSet::new(),
            fail_write: HashSet::new(),
        }
    }
}

/// Description of a fake file-share server.
///
/// Configure it fully before calling [`MemoryServer::connector`] or
/// [`MemoryServer::negotiator`]; strategies snapshot the configuration.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    config: Arc<ServerConfig>,
    ledger: Arc<Ledger>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn config_mut(&mut self) -> &mut ServerConfig {
        Arc::make_mut(&mut self.config)
    }

    pub fn with_user(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config_mut().users.insert(user.into(), password.into());
        self
    }

    pub fn with_anonymous(mut self) -> Self {
        self.config_mut().anonymous = true;
        self
    }

    pub fn with_share(mut self, share: impl Into<String>) -> Self {
        self.config_mut().shares.insert(share.into());
        self
    }

    /// Refuse connections immediately.
    pub fn unreachable(mut self) -> Self {
        self.config_mut().reachable = false;
        self
    }

    /// Accept nothing and never answer, so dials run into their timeout.
    pub fn black_hole(mut self) -> Self {
        self.config_mut().black_hole = true;
        self
    }

    /// Drop the connection in the middle of negotiation.
    pub fn reset_during_negotiation(mut self) -> Self {
        self.config_mut().reset_during_negotiation = true;
        self
    }

    /// Stall every negotiation for `delay` before answering.
    pub fn slow_negotiation(mut self, delay: Duration) -> Self {
        self.config_mut().negotiation_delay = Some(delay);
        self
    }

    /// Make `create` fail for this share-relative path.
    pub fn fail_create_on(mut self, path: &str) -> Self {
        self.config_mut().fail_create.insert(normalize(path));
        self
    }

    /// Make writes fail for this share-relative path after `create` succeeds.
    pub fn fail_write_on(mut self, path: &str) -> Self {
        self.config_mut().fail_write.insert(normalize(path));
        self
    }

    pub fn ledger(&self) -> Arc<Ledger> {
        self.ledger.clone()
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            config: self.config.clone(),
            ledger: self.ledger.clone(),
        }
    }

    pub fn negotiator(&self) -> MemoryNegotiator {
        MemoryNegotiator {
            config: self.config.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

/// Connection to a [`MemoryServer`]; counted closed on drop.
#[derive(Debug)]
pub struct MemoryConnection {
    server: ServerAddr,
    ledger: Arc<Ledger>,
}

impl MemoryConnection {
    pub fn server(&self) -> &ServerAddr {
        &self.server
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.ledger.record(|c| c.connections_closed += 1);
    }
}

#[derive(Debug, Clone)]
pub struct MemoryConnector {
    config: Arc<ServerConfig>,
    ledger: Arc<Ledger>,
}

impl Connector for MemoryConnector {
    type Conn = MemoryConnection;

    async fn connect(&self, server: &ServerAddr, timeout: Duration) -> ShareResult<MemoryConnection> {
        if self.config.black_hole {
            tokio::time::sleep(timeout).await;
            return Err(ShareError::Timeout(timeout));
        }
        if !self.config.reachable {
            return Err(ShareError::Transport(format!("connect to {server}: connection refused")));
        }
        self.ledger.record(|c| c.connections_opened += 1);
        Ok(MemoryConnection {
            server: server.clone(),
            ledger: self.ledger.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MemoryNegotiator {
    config: Arc<ServerConfig>,
    ledger: Arc<Ledger>,
}

impl Negotiator<MemoryConnection> for MemoryNegotiator {
    type Session = MemorySession;

    async fn negotiate(&self, conn: MemoryConnection, dialer: &Dialer) -> ShareResult<MemorySession> {
        if let Some(delay) = self.config.negotiation_delay {
            tokio::time::sleep(delay).await;
        }
        if self.config.reset_during_negotiation {
            return Err(ShareError::Transport("connection reset during negotiation".into()));
        }

        let accepted = match &dialer.initiator {
            Initiator::Ntlm { user, password, .. } => self
                .config
                .users
                .get(user)
                .is_some_and(|expected| expected == password.expose()),
            Initiator::Anonymous => self.config.anonymous,
        };
        if !accepted {
            return Err(ShareError::AuthFailed(format!(
                "credentials rejected for {}",
                dialer.initiator.user().unwrap_or("<anonymous>")
            )));
        }

        self.ledger.record(|c| c.sessions_opened += 1);
        Ok(MemorySession {
            _conn: conn,
            config: self.config.clone(),
            ledger: self.ledger.clone(),
        })
    }
}

/// Session on a [`MemoryServer`]; owns its connection.
#[derive(Debug)]
pub struct MemorySession {
    _conn: MemoryConnection,
    config: Arc<ServerConfig>,
    ledger: Arc<Ledger>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.ledger.record(|c| c.sessions_released += 1);
    }
}

impl Session for MemorySession {
    type Share = MemoryShare;

    async fn mount(&mut self, share: &str) -> ShareResult<MemoryShare> {
        if !self.config.shares.contains(share) {
            return Err(ShareError::NotFound(format!("share '{share}' does not exist")));
        }
        self.ledger.record(|c| c.shares_mounted += 1);
        Ok(MemoryShare {
            name: share.to_string(),
            config: self.config.clone(),
            ledger: self.ledger.clone(),
        })
    }

    async fn logoff(self) -> ShareResult<()> {
        self.ledger.release(Release::Logoff);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryShare {
    name: String,
    config: Arc<ServerConfig>,
    ledger: Arc<Ledger>,
}

impl MemoryShare {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MemoryShare {
    fn drop(&mut self) {
        self.ledger.record(|c| c.shares_released += 1);
    }
}

impl Share for MemoryShare {
    type File = MemoryFile;

    async fn create(&mut self, path: &str) -> ShareResult<MemoryFile> {
        let key = normalize(path);
        if key.is_empty() {
            return Err(ShareError::InvalidPath(format!("not a file path: {path:?}")));
        }
        if self.config.fail_create.contains(&key) {
            return Err(ShareError::file(
                "create",
                path,
                io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
            ));
        }

        {
            let mut state = self.ledger.lock();
            state.files.insert(key.clone(), Vec::new());
            state.counts.files_created += 1;
        }
        Ok(MemoryFile {
            fail_writes: self.config.fail_write.contains(&key),
            path: key,
            ledger: self.ledger.clone(),
        })
    }

    async fn umount(self) -> ShareResult<()> {
        self.ledger.release(Release::Umount);
        Ok(())
    }
}

/// Write-through file on a [`MemoryShare`].
#[derive(Debug)]
pub struct MemoryFile {
    path: String,
    fail_writes: bool,
    ledger: Arc<Ledger>,
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        self.ledger.record(|c| c.files_released += 1);
    }
}

impl AsyncWrite for MemoryFile {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if self.fail_writes {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("write to '{}' failed", self.path),
            )));
        }
        let mut state = self.ledger.lock();
        state.files.entry(self.path.clone()).or_default().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl RemoteFile for MemoryFile {
    async fn close(self) -> ShareResult<()> {
        self.ledger.release(Release::Close);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharecp_core::ErrorKind;
    use tokio::io::AsyncWriteExt;

    fn alice() -> Dialer {
        Dialer {
            initiator: Initiator::Ntlm {
                user: "alice".into(),
                password: "pw".into(),
                domain: None,
            },
        }
    }

    fn addr() -> ServerAddr {
        ServerAddr::new("nas", 445).unwrap()
    }

    #[tokio::test]
    async fn rejected_credentials_close_connection() {
        let server = MemoryServer::new().with_user("alice", "other");
        let conn = server
            .connector()
            .connect(&addr(), Duration::from_secs(1))
            .await
            .unwrap();
        let err = server.negotiator().negotiate(conn, &alice()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Authentication);
        let counts = server.ledger().counts();
        assert_eq!(counts.connections_opened, 1);
        assert_eq!(counts.connections_closed, 1);
        assert_eq!(counts.sessions_opened, 0);
    }

    #[tokio::test]
    async fn write_through_and_truncate() {
        let server = MemoryServer::new().with_user("alice", "pw").with_share("data");
        let conn = server
            .connector()
            .connect(&addr(), Duration::from_secs(1))
            .await
            .unwrap();
        let mut session = server.negotiator().negotiate(conn, &alice()).await.unwrap();
        let mut share = session.mount("data").await.unwrap();

        let mut f = share.create("/dir/a.txt").await.unwrap();
        f.write_all(b"hello").await.unwrap();
        f.close().await.unwrap();
        assert_eq!(server.ledger().file("dir/a.txt").unwrap(), b"hello");

        let f = share.create("dir\\a.txt").await.unwrap();
        assert_eq!(server.ledger().file("dir/a.txt").unwrap(), b"");
        drop(f);

        share.umount().await.unwrap();
        session.logoff().await.unwrap();
        let counts = server.ledger().counts();
        assert!(counts.is_balanced());
        // The dropped second handle was never closed.
        assert_eq!((counts.closes, counts.files_released), (1, 2));
        assert_eq!(
            server.ledger().releases(),
            vec![Release::Close, Release::Umount, Release::Logoff]
        );
    }

    #[tokio::test]
    async fn missing_share_is_not_found() {
        let server = MemoryServer::new().with_user("alice", "pw");
        let conn = server
            .connector()
            .connect(&addr(), Duration::from_secs(1))
            .await
            .unwrap();
        let mut session = server.negotiator().negotiate(conn, &alice()).await.unwrap();
        let err = session.mount("nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
