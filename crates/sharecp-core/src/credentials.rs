//! Credentials and the dialer configuration built from them.

use std::fmt;

/// Password material. Formatting never reveals the contents.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw value. Only protocol backends should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Username, password and optional domain for session negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
    pub domain: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<Secret>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Authentication initiator carried by a [`Dialer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initiator {
    /// NTLM challenge-response with a username and password.
    Ntlm {
        user: String,
        password: Secret,
        domain: Option<String>,
    },
    /// Guest / null session.
    Anonymous,
}

impl Initiator {
    pub fn user(&self) -> Option<&str> {
        match self {
            Initiator::Ntlm { user, .. } => Some(user),
            Initiator::Anonymous => None,
        }
    }
}

/// Everything a negotiator needs to authenticate a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialer {
    pub initiator: Initiator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_redacted() {
        let s = Secret::new("hunter2");
        assert_eq!(format!("{s}"), "***");
        assert_eq!(format!("{s:?}"), "Secret(***)");
        assert_eq!(s.expose(), "hunter2");
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("alice", "hunter2").with_domain("CORP");
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("alice"));
        assert!(dbg.contains("CORP"));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn dialer_debug_hides_password() {
        let dialer = Dialer {
            initiator: Initiator::Ntlm {
                user: "alice".into(),
                password: "hunter2".into(),
                domain: None,
            },
        };
        assert!(!format!("{dialer:?}").contains("hunter2"));
        assert_eq!(dialer.initiator.user(), Some("alice"));
        assert_eq!(Initiator::Anonymous.user(), None);
    }
}
