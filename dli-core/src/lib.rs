//! Script sync for DLI Web Power Switches.
//! Host-driven: the host supplies a `Transport` for single HTTP attempts; everything
//! else (encoding, retries, listing scrape, verification, command sequencing) is here.

pub mod error;
pub mod listing;
pub mod protocol;
pub mod script;
pub mod switch;
pub mod transport;
pub mod verify;

pub use error::Error;
pub use listing::{FormatError, LastTableParser, ListingParser, RemoteScript};
pub use protocol::{Command, Method, Request};
pub use script::{encode, FixedScript, SCRIPT_CAPACITY, TERMINATOR};
pub use switch::{Switch, SyncOutcome};
pub use transport::{Endpoint, Response, SendError, Transport};
pub use verify::{line_equal, Mismatch, Verification};
