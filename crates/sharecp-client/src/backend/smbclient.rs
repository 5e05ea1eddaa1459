//! Protocol backend that delegates SMB to the system `smbclient` tool.
//!
//! - negotiate: `smbclient -L //host` proves the credentials are accepted.
//! - mount: `smbclient //host/share -c pwd` proves the share is reachable.
//! - create: bytes are spooled to a local temp file; `close` runs
//!   `put "<spool>" "<remote>"`, which creates or overwrites the remote file.
//!
//! The TCP connection from the connector is held by the session for its
//! whole lifetime and shut down on logoff. Mount and upload check it first,
//! so a server that dropped the connection surfaces as a transport error.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tempfile::NamedTempFile;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use sharecp_core::credentials::{Dialer, Initiator};
use sharecp_core::error::{ShareError, ShareResult};
use sharecp_core::transport::{Negotiator, RemoteFile, Session, Share};
use sharecp_core::{Secret, ServerAddr};

use super::runner::{CommandOutput, CommandRunner, SystemRunner};
use crate::connector::TcpConnection;

/// Pipeline stage a failure happened in; decides how status codes map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Negotiate,
    Mount,
    Put,
}

const AUTH_STATUSES: &[&str] = &[
    "NT_STATUS_LOGON_FAILURE",
    "NT_STATUS_WRONG_PASSWORD",
    "NT_STATUS_NO_SUCH_USER",
    "NT_STATUS_ACCOUNT_DISABLED",
    "NT_STATUS_ACCOUNT_LOCKED_OUT",
    "NT_STATUS_ACCOUNT_RESTRICTION",
    "NT_STATUS_PASSWORD_EXPIRED",
    "NT_STATUS_PASSWORD_MUST_CHANGE",
    "NT_STATUS_INVALID_LOGON_HOURS",
];

const TRANSPORT_STATUSES: &[&str] = &[
    "NT_STATUS_CONNECTION_REFUSED",
    "NT_STATUS_CONNECTION_RESET",
    "NT_STATUS_CONNECTION_DISCONNECTED",
    "NT_STATUS_HOST_UNREACHABLE",
    "NT_STATUS_NETWORK_UNREACHABLE",
    "NT_STATUS_IO_TIMEOUT",
    "NT_STATUS_PIPE_BROKEN",
    "NT_STATUS_END_OF_FILE",
];

/// Pull the first `NT_STATUS_*` token out of tool output.
fn status_code(text: &str) -> Option<&str> {
    let start = text.find("NT_STATUS_")?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Last non-empty line, used when no status code is printed.
fn summary(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("no output")
        .to_string()
}

fn classify_failure(stage: Stage, output: &CommandOutput) -> ShareError {
    let text = output.diagnostics();
    let Some(code) = status_code(&text) else {
        let msg = summary(&text);
        return match stage {
            Stage::Negotiate | Stage::Mount => ShareError::Transport(msg),
            Stage::Put => ShareError::Io(io::Error::other(msg)),
        };
    };
    let code = code.to_string();

    if TRANSPORT_STATUSES.contains(&code.as_str()) {
        return ShareError::Transport(code);
    }
    if AUTH_STATUSES.contains(&code.as_str()) {
        return ShareError::AuthFailed(code);
    }

    match (stage, code.as_str()) {
        (Stage::Negotiate, "NT_STATUS_ACCESS_DENIED") => ShareError::AuthFailed(code),
        (Stage::Negotiate, _) => ShareError::AuthFailed(format!("handshake failed: {code}")),
        (Stage::Mount, "NT_STATUS_BAD_NETWORK_NAME") => {
            ShareError::NotFound(format!("share does not exist ({code})"))
        }
        (Stage::Mount, "NT_STATUS_ACCESS_DENIED") | (Stage::Mount, "NT_STATUS_NETWORK_ACCESS_DENIED") => {
            ShareError::NotFound(format!("access denied ({code})"))
        }
        (Stage::Mount, _) => ShareError::Transport(code),
        (Stage::Put, "NT_STATUS_ACCESS_DENIED") | (Stage::Put, "NT_STATUS_MEDIA_WRITE_PROTECTED") => {
            ShareError::Io(io::Error::new(io::ErrorKind::PermissionDenied, code))
        }
        (Stage::Put, "NT_STATUS_OBJECT_PATH_NOT_FOUND")
        | (Stage::Put, "NT_STATUS_OBJECT_NAME_NOT_FOUND") => {
            ShareError::Io(io::Error::new(io::ErrorKind::NotFound, code))
        }
        (Stage::Put, _) => ShareError::Io(io::Error::other(code)),
    }
}

/// Credential arguments shared by every invocation in one session.
#[derive(Debug, Clone)]
struct Auth {
    args: Vec<String>,
    password: Option<Secret>,
}

impl Auth {
    fn from_dialer(dialer: &Dialer) -> Self {
        match &dialer.initiator {
            Initiator::Ntlm {
                user,
                password,
                domain,
            } => {
                let mut args = vec!["-U".to_string(), user.clone()];
                if let Some(domain) = domain {
                    args.push("-W".to_string());
                    args.push(domain.clone());
                }
                Self {
                    args,
                    password: Some(password.clone()),
                }
            }
            Initiator::Anonymous => Self {
                args: vec!["-N".to_string()],
                password: None,
            },
        }
    }
}

/// Everything needed to run a command against one server.
#[derive(Debug)]
struct Target<R> {
    server: ServerAddr,
    auth: Auth,
    runner: Arc<R>,
}

impl<R: CommandRunner> Target<R> {
    async fn run(&self, service_args: &[String], stage: Stage) -> ShareResult<CommandOutput> {
        let mut args = service_args.to_vec();
        args.push("-p".to_string());
        args.push(self.server.port().to_string());
        args.extend(self.auth.args.iter().cloned());

        let output = self.runner.run(&args, self.auth.password.as_ref()).await?;
        if output.success {
            Ok(output)
        } else {
            Err(classify_failure(stage, &output))
        }
    }
}

impl<R> Clone for Target<R> {
    fn clone(&self) -> Self {
        Self {
            server: self.server.clone(),
            auth: self.auth.clone(),
            runner: self.runner.clone(),
        }
    }
}

/// Negotiates sessions by running `smbclient`.
#[derive(Debug)]
pub struct SmbclientNegotiator<R = SystemRunner> {
    runner: Arc<R>,
}

impl SmbclientNegotiator<SystemRunner> {
    pub fn new() -> Self {
        Self::with_runner(SystemRunner::default())
    }

    /// Use a specific `smbclient` binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self::with_runner(SystemRunner::new(program))
    }
}

impl Default for SmbclientNegotiator<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> SmbclientNegotiator<R> {
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner: Arc::new(runner),
        }
    }
}

impl<R: CommandRunner> Negotiator<TcpConnection> for SmbclientNegotiator<R> {
    type Session = SmbclientSession<R>;

    async fn negotiate(&self, conn: TcpConnection, dialer: &Dialer) -> ShareResult<SmbclientSession<R>> {
        let target = Target {
            server: conn.server().clone(),
            auth: Auth::from_dialer(dialer),
            runner: self.runner.clone(),
        };

        // On error `conn` is dropped here, closing the socket.
        let args = vec![
            "-L".to_string(),
            format!("//{}", target.server.unc_host()),
            "-g".to_string(),
        ];
        target.run(&args, Stage::Negotiate).await?;

        tracing::info!(
            server = %target.server,
            user = dialer.initiator.user().unwrap_or("<anonymous>"),
            "session negotiated"
        );
        Ok(SmbclientSession {
            conn: Arc::new(conn),
            target,
        })
    }
}

/// Authenticated session; owns the TCP connection.
#[derive(Debug)]
pub struct SmbclientSession<R = SystemRunner> {
    conn: Arc<TcpConnection>,
    target: Target<R>,
}

impl<R: CommandRunner> Session for SmbclientSession<R> {
    type Share = SmbclientShare<R>;

    async fn mount(&mut self, share: &str) -> ShareResult<SmbclientShare<R>> {
        let name = share.trim_matches(|c| c == '/' || c == '\\');
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ShareError::InvalidPath(format!("invalid share name: {share:?}")));
        }
        self.conn.ensure_open().await?;

        let service = self.target.server.service(name);
        let args = vec![service.clone(), "-c".to_string(), "pwd".to_string()];
        self.target.run(&args, Stage::Mount).await?;

        tracing::info!(service = %service, "share mounted");
        Ok(SmbclientShare {
            service,
            target: self.target.clone(),
            conn: self.conn.clone(),
        })
    }

    async fn logoff(self) -> ShareResult<()> {
        let server = self.target.server.clone();
        match Arc::try_unwrap(self.conn) {
            Ok(conn) => {
                let mut stream = conn.into_stream();
                if let Err(e) = stream.shutdown().await {
                    tracing::debug!(server = %server, "socket shutdown: {}", e);
                }
            }
            // A share outlived its session; the socket closes with the last handle.
            Err(_) => tracing::debug!(server = %server, "share still mounted at logoff"),
        }
        tracing::info!(server = %server, "logged off");
        Ok(())
    }
}

/// A share reachable through `smbclient`.
#[derive(Debug)]
pub struct SmbclientShare<R = SystemRunner> {
    service: String,
    target: Target<R>,
    conn: Arc<TcpConnection>,
}

impl<R> SmbclientShare<R> {
    /// `//host/share`
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl<R: CommandRunner> Share for SmbclientShare<R> {
    type File = SpoolFile<R>;

    async fn create(&mut self, path: &str) -> ShareResult<SpoolFile<R>> {
        let remote = remote_path(path)?;
        let spool = NamedTempFile::new().map_err(|e| ShareError::file("create spool for", path, e))?;
        let handle = spool
            .as_file()
            .try_clone()
            .map_err(|e| ShareError::file("create spool for", path, e))?;

        tracing::debug!(service = %self.service, remote = %remote, spool = %spool.path().display(), "spooling");
        Ok(SpoolFile {
            file: tokio::fs::File::from_std(handle),
            spool,
            remote,
            service: self.service.clone(),
            target: self.target.clone(),
            conn: self.conn.clone(),
        })
    }

    async fn umount(self) -> ShareResult<()> {
        tracing::info!(service = %self.service, "share unmounted");
        Ok(())
    }
}

/// Remote file backed by a local spool, uploaded on [`RemoteFile::close`].
///
/// Dropping it without closing discards the spool and leaves the share
/// untouched.
#[derive(Debug)]
pub struct SpoolFile<R = SystemRunner> {
    file: tokio::fs::File,
    spool: NamedTempFile,
    remote: String,
    service: String,
    target: Target<R>,
    conn: Arc<TcpConnection>,
}

impl<R> SpoolFile<R> {
    pub fn spool_path(&self) -> &Path {
        self.spool.path()
    }

    /// Destination inside the share, in `smbclient` form.
    pub fn remote(&self) -> &str {
        &self.remote
    }
}

impl<R> AsyncWrite for SpoolFile<R> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().file).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_shutdown(cx)
    }
}

impl<R: CommandRunner> RemoteFile for SpoolFile<R> {
    async fn close(mut self) -> ShareResult<()> {
        self.file
            .flush()
            .await
            .map_err(|e| ShareError::file("write", &self.remote, e))?;

        self.conn.ensure_open().await?;

        let local = self.spool.path().to_string_lossy().to_string();
        if local.contains('"') {
            return Err(ShareError::InvalidPath(format!("spool path not quotable: {local}")));
        }
        let command = format!("put \"{}\" \"{}\"", local, self.remote);
        let args = vec![self.service.clone(), "-c".to_string(), command];
        self.target.run(&args, Stage::Put).await?;

        tracing::debug!(service = %self.service, remote = %self.remote, "uploaded");
        Ok(())
    }
}

/// Convert a share-relative path to the quoted form `smbclient` accepts.
fn remote_path(path: &str) -> ShareResult<String> {
    let normalized = path.replace('/', "\\");
    let trimmed = normalized.trim_start_matches('\\');
    if trimmed.is_empty() || trimmed.ends_with('\\') {
        return Err(ShareError::InvalidPath(format!("not a file path: {path:?}")));
    }
    if trimmed.contains(['"', ';']) || trimmed.chars().any(char::is_control) {
        return Err(ShareError::InvalidPath(format!(
            "unsupported character in remote path: {path:?}"
        )));
    }
    Ok(trimmed.to_string())
}
