//! Dialer factory for NTLM credential sessions.

use sharecp_core::credentials::{Credentials, Dialer, Initiator};
use sharecp_core::transport::DialerFactory;

/// Builds an NTLM initiator from the configured credentials.
///
/// An empty username yields an anonymous (guest) initiator.
#[derive(Debug, Clone, Default)]
pub struct NtlmDialerFactory;

impl DialerFactory for NtlmDialerFactory {
    fn build(&self, credentials: &Credentials) -> Dialer {
        if credentials.username.is_empty() {
            return Dialer {
                initiator: Initiator::Anonymous,
            };
        }
        Dialer {
            initiator: Initiator::Ntlm {
                user: credentials.username.clone(),
                password: credentials.password.clone(),
                domain: credentials.domain.clone(),
            },
        }
    }
}
