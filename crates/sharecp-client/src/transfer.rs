//! File transfer onto a mounted share.
//!
//! Streams a local file into a newly created remote file in 64 KiB chunks,
//! reporting progress and hashing the bytes sent. The batch variant walks an
//! ordered list of names and stops at the first failure.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use sharecp_core::error::{ShareError, ShareResult};
use sharecp_core::transport::{RemoteFile, Share};

/// Default chunk size for file transfers: 64 KB.
const CHUNK_SIZE: usize = 64 * 1024;

/// Outcome of one file transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub source: PathBuf,
    pub destination: String,
    pub bytes: u64,
    /// Hex SHA-256 of the bytes written to the share.
    pub sha256: String,
}

/// Run `fut` under an optional deadline, mapping expiry to
/// [`ShareError::Timeout`]. Dropping the future on expiry releases whatever it
/// held.
pub async fn within<T, Fut>(limit: Option<Duration>, fut: Fut) -> ShareResult<T>
where
    Fut: Future<Output = ShareResult<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ShareError::Timeout(limit))?,
        None => fut.await,
    }
}

/// Copy `source` into a new file at `destination` on `share`.
///
/// `on_progress` is called with `(bytes_sent, total)` after each chunk. Both
/// files are released on every path; a failure after the remote file was
/// created may leave it partially written.
pub async fn send<S, F>(
    share: &mut S,
    source: &Path,
    destination: &str,
    mut on_progress: F,
) -> ShareResult<TransferReport>
where
    S: Share,
    F: FnMut(u64, u64),
{
    let source_name = source.display().to_string();
    let mut src = tokio::fs::File::open(source)
        .await
        .map_err(|e| ShareError::file("open", &source_name, e))?;
    let total = src
        .metadata()
        .await
        .map_err(|e| ShareError::file("stat", &source_name, e))?
        .len();

    let mut dst = share.create(destination).await?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut sent: u64 = 0;
    loop {
        let n = src
            .read(&mut buf)
            .await
            .map_err(|e| ShareError::file("read", &source_name, e))?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n])
            .await
            .map_err(|e| ShareError::file("write", destination, e))?;
        hasher.update(&buf[..n]);
        sent += n as u64;
        on_progress(sent, total);
    }

    dst.flush()
        .await
        .map_err(|e| ShareError::file("write", destination, e))?;
    dst.close().await?;

    tracing::info!(
        source = %source_name,
        destination = %destination,
        bytes = sent,
        "file sent"
    );

    Ok(TransferReport {
        source: source.to_path_buf(),
        destination: destination.to_string(),
        bytes: sent,
        sha256: hex::encode(hasher.finalize()),
    })
}

/// Send each of `file_names`, in order, from `source_prefix + name` to
/// `destination_prefix + name`.
///
/// Prefixes are joined by plain concatenation, so they normally end with a
/// separator. `per_file` bounds each transfer separately. The first failure
/// is returned immediately: earlier files stay on the share and later ones
/// are not attempted.
pub async fn send_many<S, N, F>(
    share: &mut S,
    source_prefix: &str,
    destination_prefix: &str,
    file_names: &[N],
    per_file: Option<Duration>,
    mut on_progress: F,
) -> ShareResult<Vec<TransferReport>>
where
    S: Share,
    N: AsRef<str>,
    F: FnMut(&str, u64, u64),
{
    let mut reports = Vec::with_capacity(file_names.len());
    for name in file_names {
        let name = name.as_ref();
        let source = format!("{source_prefix}{name}");
        let destination = format!("{destination_prefix}{name}");
        let transfer = send(share, Path::new(&source), &destination, |sent, total| {
            on_progress(name, sent, total)
        });
        let report = within(per_file, transfer).await.inspect_err(|e| {
            tracing::warn!(file = %name, "batch stopped: {}", e);
        })?;
        reports.push(report);
    }
    Ok(reports)
}
