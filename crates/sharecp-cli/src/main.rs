//! sharecp: copy local files onto a remote file share.
//!
//! Connects to an SMB server, authenticates with NTLM credentials, mounts a
//! share and uploads one file or a batch. Defaults come from
//! `~/.sharecp/config.toml`; flags override them.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use config::Overrides;

/// sharecp: file share uploader
#[derive(Parser)]
#[command(name = "sharecp", version, about = "Copy local files onto a remote SMB file share")]
struct Cli {
    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Server as host[:port]
    #[arg(short = 's', long, global = true)]
    server: Option<String>,

    /// Username (empty for anonymous)
    #[arg(short = 'u', long = "user", global = true)]
    user: Option<String>,

    /// Authentication domain
    #[arg(short = 'd', long, global = true)]
    domain: Option<String>,

    /// Share to mount
    #[arg(long, global = true)]
    share: Option<String>,

    /// Seconds allowed for the TCP connection
    #[arg(long = "connect-timeout", value_name = "SECS", global = true)]
    connect_timeout: Option<u64>,

    /// Seconds allowed for negotiation, mount and each file (0 = no limit)
    #[arg(long = "timeout", value_name = "SECS", global = true)]
    timeout: Option<u64>,

    /// Path to the smbclient program
    #[arg(long, value_name = "PATH", global = true)]
    smbclient: Option<PathBuf>,

    /// Print transfer reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload one local file
    Send {
        /// Local file to read
        source: PathBuf,
        /// Path inside the share
        destination: String,
    },

    /// Upload several files, stopping at the first failure
    SendMany {
        /// Local prefix, concatenated with each name
        #[arg(long = "from", value_name = "PREFIX")]
        from: String,
        /// Remote prefix, concatenated with each name
        #[arg(long = "to", value_name = "PREFIX", default_value = "")]
        to: String,
        /// File names, sent in order
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Connect and mount the share, then disconnect
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing.
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("sharecp=debug,sharecp_cli=debug,sharecp_client=debug,sharecp_core=debug")
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("sharecp=warn,sharecp_cli=warn")
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("sharecp: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let cfg = config::Config::load(&config_path)?;

    let overrides = Overrides {
        server: cli.server,
        user: cli.user,
        domain: cli.domain,
        share: cli.share,
        connect_timeout: cli.connect_timeout,
        timeout: cli.timeout,
        smbclient: cli.smbclient,
    };
    let settings = cfg.resolve(&overrides)?;

    match cli.command {
        Command::Send {
            source,
            destination,
        } => commands::send::run(settings, &source, &destination, cli.json).await,
        Command::SendMany { from, to, names } => {
            commands::send_many::run(settings, &from, &to, &names, cli.json).await
        }
        Command::Check => commands::check::run(settings).await,
    }
}
