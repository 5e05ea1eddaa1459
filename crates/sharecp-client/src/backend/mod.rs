//! Protocol backends.
//!
//! - `smbclient`: the default, driving the system `smbclient` tool.
//! - `memory`: an in-process fake server for tests and dry runs.

pub mod memory;
pub mod runner;
pub mod smbclient;

pub use memory::{Ledger, LedgerCounts, MemoryConnector, MemoryNegotiator, MemoryServer, Release};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use smbclient::{SmbclientNegotiator, SmbclientSession, SmbclientShare, SpoolFile};
