//! `sharecp check`: connect and mount, then close.

use anyhow::{Context, Result};

use super::open;
use crate::config::Settings;

pub async fn run(settings: Settings) -> Result<()> {
    let service = settings.client.server.service(&settings.client.share);
    let user = match settings.client.credentials.username.as_str() {
        "" => "anonymous".to_string(),
        name => name.to_string(),
    };

    let mut client = open(settings).await?;
    client.close().await.context("failed to close session")?;

    println!("{service}: reachable as {user}");
    Ok(())
}
