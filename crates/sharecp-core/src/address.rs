//! Server address parsing.
//!
//! Accepts `host`, `host:port`, `[v6addr]:port`, a bare IPv6 address, and the
//! same forms prefixed with `smb://`, `//` or `\\`. The port defaults to 445.

use std::fmt;
use std::str::FromStr;

use crate::error::{ShareError, ShareResult};

/// Default port for SMB over TCP.
pub const DEFAULT_PORT: u16 = 445;

/// A file-share server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddr {
    host: String,
    port: u16,
}

impl ServerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> ShareResult<Self> {
        let host = host.into();
        if host.is_empty() {
            return Err(ShareError::InvalidAddress("empty host".into()));
        }
        if port == 0 {
            return Err(ShareError::InvalidAddress(format!("port 0 for host {host}")));
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Replace the port, keeping the host.
    pub fn with_port(mut self, port: u16) -> ShareResult<Self> {
        if port == 0 {
            return Err(ShareError::InvalidAddress("port 0".into()));
        }
        self.port = port;
        Ok(self)
    }

    /// Form usable with `TcpStream::connect` (brackets IPv6 hosts).
    pub fn socket_target(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Host as written in UNC paths; IPv6 literals are bracketed.
    pub fn unc_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }

    /// UNC-style service path for a share: `//host/share`.
    pub fn service(&self, share: &str) -> String {
        format!("//{}/{}", self.unc_host(), share.trim_matches(|c| c == '/' || c == '\\'))
    }

    /// Parse like [`FromStr`], using `default_port` when `s` names none.
    pub fn parse_with_port(s: &str, default_port: u16) -> ShareResult<Self> {
        let trimmed = s.trim();
        let rest = if trimmed
            .get(..6)
            .is_some_and(|p| p.eq_ignore_ascii_case("smb://"))
        {
            &trimmed[6..]
        } else if let Some(r) = trimmed.strip_prefix("//") {
            r
        } else if let Some(r) = trimmed.strip_prefix("\\\\") {
            r
        } else {
            trimmed
        };
        let rest = rest.trim_end_matches(['/', '\\']);

        if rest.contains('/') || rest.contains('\\') {
            return Err(ShareError::InvalidAddress(format!(
                "unexpected path in server address: {s}"
            )));
        }

        // [v6]:port or [v6]
        if let Some(inner) = rest.strip_prefix('[') {
            let (host, after) = inner
                .split_once(']')
                .ok_or_else(|| ShareError::InvalidAddress(format!("unclosed '[' in {s}")))?;
            let port = match after {
                "" => default_port,
                p => parse_port(p.strip_prefix(':').ok_or_else(|| {
                    ShareError::InvalidAddress(format!("garbage after ']' in {s}"))
                })?)?,
            };
            return Self::new(host, port);
        }

        match rest.matches(':').count() {
            0 => Self::new(rest, default_port),
            1 => {
                let (host, port) = rest.split_once(':').unwrap_or((rest, ""));
                Self::new(host, parse_port(port)?)
            }
            // bare IPv6 without brackets
            _ => Self::new(rest, default_port),
        }
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.socket_target())
    }
}

impl FromStr for ServerAddr {
    type Err = ShareError;

    fn from_str(s: &str) -> ShareResult<Self> {
        Self::parse_with_port(s, DEFAULT_PORT)
    }
}

fn parse_port(p: &str) -> ShareResult<u16> {
    p.parse::<u16>()
        .map_err(|_| ShareError::InvalidAddress(format!("invalid port: {p:?}")))
}
