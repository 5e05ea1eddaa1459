//! `sharecp send-many --from <prefix> --to <prefix> <names...>`: upload a
//! batch, stopping at the first failure.

use anyhow::{Context, Result};
use tracing::info;

use super::{format_size, open, print_progress, show_progress};
use crate::config::Settings;

pub async fn run(
    settings: Settings,
    source_prefix: &str,
    destination_prefix: &str,
    names: &[String],
    json: bool,
) -> Result<()> {
    let service = settings.client.server.service(&settings.client.share);
    let progress = show_progress(json);

    let mut client = open(settings).await?;
    let result = client
        .send_many_with_progress(source_prefix, destination_prefix, names, |name, sent, total| {
            if progress {
                print_progress(name, sent, total);
            }
        })
        .await;
    let closed = client.close().await;

    let reports = result.context("batch upload stopped")?;
    closed.context("failed to close session")?;

    let total: u64 = reports.iter().map(|r| r.bytes).sum();
    info!(files = reports.len(), bytes = total, "batch complete");
    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!(
                "{} -> {}/{} ({})",
                report.source.display(),
                service,
                report.destination,
                format_size(report.bytes)
            );
        }
        println!("{} files, {}", reports.len(), format_size(total));
    }
    Ok(())
}
