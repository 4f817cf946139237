//! Errors for the sync protocol. Every variant is fatal for the invocation.

use crate::listing::FormatError;
use crate::protocol::Method;
use crate::transport::SendError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("script has {lines} lines, but the switch can only accept {max}")]
    CapacityExceeded { lines: usize, max: usize },

    #[error("{method} {url} failed after {attempts} attempt(s)")]
    TransportFailure {
        method: Method,
        url: String,
        attempts: u32,
        #[source]
        source: SendError,
    },

    #[error("got a {status} trying to {method} {url} as {user}:{password}")]
    HttpError {
        status: u16,
        method: Method,
        url: String,
        user: String,
        password: String,
    },

    #[error(
        "got a {status} trying to {method} {url} as {user}:{password}; the switch has entered \
         security lockout mode, wait for the lockout to expire or reboot the switch"
    )]
    SecurityLockout {
        status: u16,
        method: Method,
        url: String,
        user: String,
        password: String,
    },

    #[error(
        "switch UI didn't have a script listing in the expected place; \
         the UI may have changed and this program needs an update"
    )]
    UnexpectedPage,

    #[error(
        "switch UI has a script listing, but it wasn't in the expected format \
         (the UI may have changed and this program needs an update)"
    )]
    UnexpectedFormat(#[from] FormatError),

    #[error("line {line} is outside the script (1..={max})")]
    InvalidLine { line: usize, max: usize },
}
