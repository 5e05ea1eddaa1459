//! Client configuration at `~/.sharecp/config.toml`.
//!
//! Provides the default server, account, share and timeouts. CLI flags always
//! override config file values. The password is never stored here.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use sharecp_client::ClientConfig;
use sharecp_core::{Credentials, Secret, ServerAddr, DEFAULT_PORT};

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default connection settings.
    #[serde(default)]
    pub default: DefaultConfig,
}

/// Default connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Server as `host` or `host:port` (empty = none).
    #[serde(default)]
    pub server: String,

    /// Port used when `server` does not name one.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub share: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Deadline for negotiate, mount and each transfer. 0 disables it.
    #[serde(default)]
    pub operation_timeout_secs: u64,

    /// Path or name of the `smbclient` program.
    #[serde(default = "default_smbclient")]
    pub smbclient: String,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: default_port(),
            username: String::new(),
            domain: String::new(),
            share: String::new(),
            connect_timeout_secs: default_connect_timeout(),
            operation_timeout_secs: 0,
            smbclient: default_smbclient(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_smbclient() -> String {
    "smbclient".to_string()
}

/// `~/.sharecp/config.toml`
pub fn default_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_default();
    home.join(".sharecp").join("config.toml")
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Merge CLI overrides over file values into a client configuration.
    ///
    /// The password is left empty; callers fill it in once the rest of the
    /// configuration is known to be usable.
    pub fn resolve(&self, overrides: &Overrides) -> Result<Settings> {
        let d = &self.default;

        let server = pick(overrides.server.as_deref(), &d.server)
            .context("no server given; pass --server or set `server` in the config file")?;
        let addr = ServerAddr::parse_with_port(&server, d.port)
            .with_context(|| format!("invalid server '{server}'"))?;

        let share = pick(overrides.share.as_deref(), &d.share)
            .context("no share given; pass --share or set `share` in the config file")?;
        // An explicit empty --user selects anonymous login.
        let username = overrides.user.clone().unwrap_or_else(|| d.username.clone());

        let mut credentials = Credentials::new(username, Secret::new(String::new()));
        if let Some(domain) = pick(overrides.domain.as_deref(), &d.domain) {
            credentials = credentials.with_domain(domain);
        }

        let connect_secs = overrides.connect_timeout.unwrap_or(d.connect_timeout_secs);
        if connect_secs == 0 {
            bail!("connect timeout must be at least one second");
        }
        let operation_secs = overrides.timeout.unwrap_or(d.operation_timeout_secs);

        let client = ClientConfig::new(addr, credentials, share)
            .with_connect_timeout(Duration::from_secs(connect_secs))
            .with_operation_timeout((operation_secs > 0).then(|| Duration::from_secs(operation_secs)));

        let smbclient = overrides
            .smbclient
            .clone()
            .unwrap_or_else(|| PathBuf::from(&d.smbclient));

        Ok(Settings { client, smbclient })
    }
}

/// First non-empty value, CLI before file.
fn pick(flag: Option<&str>, file: &str) -> Option<String> {
    flag.filter(|v| !v.is_empty())
        .or(Some(file).filter(|v| !v.is_empty()))
        .map(str::to_string)
}

/// Connection values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub user: Option<String>,
    pub domain: Option<String>,
    pub share: Option<String>,
    pub connect_timeout: Option<u64>,
    pub timeout: Option<u64>,
    pub smbclient: Option<PathBuf>,
}

/// Effective settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub smbclient: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(server: &str, share: &str) -> Config {
        Config {
            default: DefaultConfig {
                server: server.into(),
                share: share.into(),
                username: "svc-backup".into(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.default.port, 445);
        assert_eq!(cfg.default.connect_timeout_secs, 30);
        assert_eq!(cfg.default.operation_timeout_secs, 0);
        assert_eq!(cfg.default.smbclient, "smbclient");
        assert!(cfg.default.server.is_empty());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[default]
server = "nas.corp.example"
port = 4455
username = "alice"
domain = "CORP"
share = "backups"
connect_timeout_secs = 10
operation_timeout_secs = 300
smbclient = "/opt/samba/bin/smbclient"
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.default.server, "nas.corp.example");
        assert_eq!(cfg.default.port, 4455);
        assert_eq!(cfg.default.domain, "CORP");
        assert_eq!(cfg.default.operation_timeout_secs, 300);
        assert_eq!(cfg.default.smbclient, "/opt/samba/bin/smbclient");
    }

    #[test]
    fn parse_partial_toml_config() {
        let toml_str = r#"
[default]
server = "nas"
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.default.server, "nas");
        assert_eq!(cfg.default.port, 445); // default
        assert_eq!(cfg.default.connect_timeout_secs, 30); // default
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.default.share.is_empty());
    }

    #[test]
    fn load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[default\nserver = ").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config"));
    }

    #[test]
    fn resolve_uses_file_values() {
        let settings = file("nas", "data").resolve(&Overrides::default()).unwrap();
        assert_eq!(settings.client.server.to_string(), "nas:445");
        assert_eq!(settings.client.share, "data");
        assert_eq!(settings.client.credentials.username, "svc-backup");
        assert_eq!(settings.client.connect_timeout, Duration::from_secs(30));
        assert!(settings.client.operation_timeout.is_none());
        assert_eq!(settings.smbclient, PathBuf::from("smbclient"));
    }

    #[test]
    fn flags_override_file() {
        let overrides = Overrides {
            server: Some("files:1445".into()),
            user: Some("bob".into()),
            domain: Some("LAB".into()),
            share: Some("scratch".into()),
            connect_timeout: Some(5),
            timeout: Some(60),
            smbclient: Some(PathBuf::from("/usr/local/bin/smbclient")),
        };
        let settings = file("nas", "data").resolve(&overrides).unwrap();
        let client = settings.client;
        assert_eq!(client.server.to_string(), "files:1445");
        assert_eq!(client.share, "scratch");
        assert_eq!(client.credentials.username, "bob");
        assert_eq!(client.credentials.domain.as_deref(), Some("LAB"));
        assert_eq!(client.connect_timeout, Duration::from_secs(5));
        assert_eq!(client.operation_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn file_port_applies_to_bare_host() {
        let mut cfg = file("nas", "data");
        cfg.default.port = 4455;
        let settings = cfg.resolve(&Overrides::default()).unwrap();
        assert_eq!(settings.client.server.port(), 4455);
    }

    #[test]
    fn explicit_default_port_is_kept() {
        let mut cfg = file("nas", "data");
        cfg.default.port = 4455;
        let overrides = Overrides {
            server: Some("files:445".into()),
            ..Default::default()
        };
        let settings = cfg.resolve(&overrides).unwrap();
        assert_eq!(settings.client.server.port(), 445);
    }

    #[test]
    fn empty_user_flag_selects_anonymous() {
        let overrides = Overrides {
            user: Some(String::new()),
            ..Default::default()
        };
        let settings = file("nas", "data").resolve(&overrides).unwrap();
        assert!(settings.client.credentials.username.is_empty());

        let settings = file("nas", "data").resolve(&Overrides::default()).unwrap();
        assert_eq!(settings.client.credentials.username, "svc-backup");
    }

    #[test]
    fn missing_server_is_an_error() {
        let err = file("", "data").resolve(&Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("no server given"));
    }

    #[test]
    fn missing_share_is_an_error() {
        let err = file("nas", "").resolve(&Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("no share given"));
    }

    #[test]
    fn zero_connect_timeout_rejected() {
        let overrides = Overrides {
            connect_timeout: Some(0),
            ..Default::default()
        };
        assert!(file("nas", "data").resolve(&overrides).is_err());
    }
}
