//! `sharecp send <source> <destination>`: upload one file.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use super::{format_size, open, print_progress, show_progress};
use crate::config::Settings;

pub async fn run(settings: Settings, source: &Path, destination: &str, json: bool) -> Result<()> {
    let service = settings.client.server.service(&settings.client.share);
    let progress = show_progress(json);
    let label = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut client = open(settings).await?;
    let result = client
        .send_with_progress(source, destination, |sent, total| {
            if progress {
                print_progress(&label, sent, total);
            }
        })
        .await;
    let closed = client.close().await;

    let report = result.with_context(|| format!("failed to send {}", source.display()))?;
    closed.context("failed to close session")?;

    info!(destination = %report.destination, bytes = report.bytes, "upload complete");
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} -> {}/{} ({})",
            source.display(),
            service,
            report.destination,
            format_size(report.bytes)
        );
    }
    Ok(())
}
