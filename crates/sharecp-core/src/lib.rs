//! sharecp-core: shared types for the sharecp file-share client.
//!
//! Provides the error taxonomy, server address parsing, credentials with a
//! redacting secret type, and the capability traits each pipeline stage is
//! written against.

pub mod address;
pub mod credentials;
pub mod error;
pub mod transport;

// Re-export commonly used items at crate root.
pub use address::{ServerAddr, DEFAULT_PORT};
pub use credentials::{Credentials, Dialer, Initiator, Secret};
pub use error::{ErrorKind, ShareError, ShareResult};
pub use transport::{Connector, DialerFactory, Negotiator, RemoteFile, Session, Share};
