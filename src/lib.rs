//! File-request responder for store-and-forward mailers.
//!
//! The mailer hands over a SRIF descriptor naming the request list the
//! remote node sent and the response list it expects back. Each requested
//! name is looked up in the magic catalog and the public file areas; found
//! files are listed for sending, and when nothing is found the default
//! notice goes out instead.

pub mod catalog;
pub mod config;
pub mod descriptor;
mod errors;
pub mod packet;
pub mod request;
pub mod response;
pub mod session;

pub use catalog::{Catalog, CatalogEntry, MagicResolver};
pub use config::{Config, FinalizePolicy};
pub use descriptor::SessionDescriptor;
pub use errors::{FreqError, Result};
pub use packet::{NoopPacketComposer, PacketComposer};
pub use request::{
    read_request_list, RequestEntry, RequestResolutionEngine, ResolutionResult,
    Unfulfilled,
};
pub use response::{Disposition, ResponseComposer, ResponseDirective};
pub use session::{Session, SessionReport, SessionState};

/// Answer one session with a fresh [`Session`]
pub fn respond<P: AsRef<std::path::Path>>(
    config: &Config,
    descriptor: P,
) -> Result<SessionReport> {
    Session::new(config).run_file(descriptor)
}
