// Error taxonomy shared by the request builder and the executor. Every
// variant is fatal for the current invocation; nothing here is retried
// beyond the executor's bounded hop loop.

use thiserror::Error;

use crate::keychain::CredentialError;

/// Failures surfaced by [`crate::api::build_request`] and
/// [`crate::api::Executor::exec`].
///
/// A response whose status merely signals failure (404, 500, ...) is *not*
/// an `ExecError`; it comes back as an ordinary response and the caller
/// reads the status. Errors cover the cases where no terminal response
/// could be obtained at all.
#[derive(Debug, Error)]
pub enum ExecError {
    /// No usable credential for the target hostname. Raised before any
    /// network I/O happens.
    #[error("no usable credential for {hostname}")]
    CredentialLookup {
        hostname: String,
        #[source]
        source: CredentialError,
    },

    /// The builder was handed inputs it cannot turn into a request:
    /// an empty method or URL, an unknown HTTP verb, or a URL that does
    /// not parse.
    #[error("could not construct request: {reason}")]
    RequestConstruction { reason: String },

    /// The transport failed to complete a round trip. Aborts the hop loop
    /// immediately; there is no retry at this layer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A redirect status arrived without a usable `Location` header.
    #[error("redirect response {status} carried no usable Location header")]
    RedirectResolution { status: u16 },
}

impl ExecError {
    /// Exit code the CLI maps this error to: 2 for argument, credential and
    /// network problems, 3 for unrecoverable HTTP failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecError::CredentialLookup { .. }
            | ExecError::RequestConstruction { .. }
            | ExecError::Transport(_) => 2,
            ExecError::RedirectResolution { .. } => 3,
        }
    }
}

/// Network-level failure during a single round trip. Sources are boxed so
/// test transports can raise these without a real socket underneath.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never completed: DNS, connect, TLS or timeout.
    #[error("network error while sending request to {url}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The response arrived but its body could not be read to completion.
    #[error("could not read response body from {url}")]
    Body {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
