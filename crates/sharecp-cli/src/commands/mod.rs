//! CLI subcommand implementations.

pub mod check;
pub mod send;
pub mod send_many;

use anyhow::{bail, Context, Result};
use std::io::{self, IsTerminal, Write as _};
use tracing::debug;

use sharecp_client::ShareClient;
use sharecp_core::Secret;

use crate::config::Settings;

/// Environment variable consulted before prompting for a password.
pub const PASSWORD_ENV: &str = "SHARECP_PASSWORD";

/// Password from the environment, or an interactive prompt. Anonymous
/// logins (empty username) skip both.
fn password(username: &str) -> Result<Secret> {
    if username.is_empty() {
        return Ok(Secret::new(String::new()));
    }
    if let Ok(value) = std::env::var(PASSWORD_ENV) {
        debug!("password taken from {PASSWORD_ENV}");
        return Ok(Secret::new(value));
    }
    if !io::stdin().is_terminal() {
        bail!("no password available; set {PASSWORD_ENV} or run interactively");
    }
    let value = dialoguer::Password::new()
        .with_prompt(format!("Password for {username}"))
        .allow_empty_password(true)
        .interact()
        .context("failed to read password")?;
    Ok(Secret::new(value))
}

/// Connect and mount, closing again if the mount fails.
pub async fn open(mut settings: Settings) -> Result<ShareClient> {
    let credentials = &mut settings.client.credentials;
    credentials.password = password(&credentials.username)?;

    let server = settings.client.server.clone();
    let share = settings.client.share.clone();
    let mut client = ShareClient::with_smbclient(settings.client, settings.smbclient);

    client
        .connect()
        .await
        .with_context(|| format!("cannot connect to {server}"))?;
    if let Err(e) = client.mount().await {
        if let Err(close_err) = client.close().await {
            debug!("close after failed mount: {close_err}");
        }
        return Err(e).with_context(|| format!("cannot mount share '{share}'"));
    }
    Ok(client)
}

/// Print a progress bar to stderr.
pub fn print_progress(label: &str, transferred: u64, total: u64) {
    if total == 0 {
        return;
    }
    let pct = (transferred as f64 / total as f64 * 100.0).min(100.0);
    let bar_width = 40;
    let filled = (pct / 100.0 * bar_width as f64) as usize;
    let empty = bar_width - filled;

    eprint!(
        "\r  {label} [{}{}] {:5.1}% {}/{}",
        "=".repeat(filled),
        " ".repeat(empty),
        pct,
        format_size(transferred),
        format_size(total),
    );

    if transferred >= total {
        eprintln!();
    }
    let _ = io::stderr().flush();
}

/// Whether progress bars should be drawn.
pub fn show_progress(json: bool) -> bool {
    !json && io::stderr().is_terminal()
}

/// Format a byte count as a human-readable string.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
