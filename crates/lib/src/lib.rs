//!
//! cas-client: the client side of the CAS (Central Authentication Service) protocol.
//! This library validates service tickets, correlates proxy-granting tickets delivered
//! out-of-band by the authority, mints proxy tickets, and exchanges credentials for
//! proxy-granting tickets through the restlet channel.
//!
//! ## Core Concepts
//!
//! * **Codec (`xml`)**: Decodes and encodes the `cas:serviceResponse` documents. Decoding
//!   never fails; anything unrecognised degrades to "nothing extracted".
//! * **Correlation store (`store::CorrelationStore`)**: Bridges the authority's callback,
//!   which delivers `(pgtIou, pgtId)`, and the validation response, which only carries the IOU.
//!   Resolution waits for a bounded time because the two arrive in no particular order.
//! * **Callback receiver (`callback::ProxyCallbackReceiver`)**: The inbound route the authority
//!   invokes to populate the store.
//! * **Validator (`validate::ServiceTicketValidator`)**: Redeems a service ticket for an identity
//!   and, optionally, a resolved proxy-granting ticket.
//! * **Acquirer (`proxy::ProxyTicketAcquirer`)**: Mints target-scoped proxy tickets from a PGT.
//! * **Restlet (`restlet::RestletClient`)**: Non-interactive PGT issuance and revocation.
//! * **Client (`client::CasClient`)**: Owns the configuration, the HTTP client and the store,
//!   and hands out the components above.

pub mod authority;
pub mod callback;
pub mod client;
pub mod clock;
pub mod config;
pub mod proxy;
pub mod restlet;
pub mod store;
pub mod types;
pub mod validate;
pub mod xml;

pub use client::CasClient;
pub use clock::{Clock, SystemClock};
pub use config::{CasConfig, CorrelationConfig, EndpointPaths};
pub use types::{Attributes, ProxyResult, ValidationResult};

#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;

use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Result type used throughout the cas-client library.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a failed operation.
///
/// Every [`Error`] maps onto exactly one kind. Callers use the kind to decide
/// retry policy; the engine itself never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required input was missing. Nothing reached the wire.
    PreconditionFailed,
    /// Network, timeout or server failure talking to the authority.
    TransportFailure,
    /// The authority answered with a well-formed "no".
    AuthorityRejected,
    /// A PGT-IOU was not resolved within the wait budget.
    CorrelationTimeout,
    /// The restlet endpoint refused the supplied credentials.
    CredentialRejected,
    /// Configuration could not be used (malformed URL, bad address).
    Configuration,
}

/// Common error type for the cas-client library.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A required argument was empty.
    #[error("Missing required input: {0}")]
    PreconditionFailed(&'static str),

    /// Talking to the authority failed below the protocol level.
    #[error("Request to {endpoint} failed: {reason}")]
    TransportFailure { endpoint: String, reason: String },

    /// The authority rejected the ticket or request.
    #[error("Authority rejected the request: {0}")]
    AuthorityRejected(String),

    /// No callback delivered the proxy-granting ticket for this IOU in time.
    #[error("Proxy-granting ticket for IOU {iou_hint} not delivered within {waited_ms} ms")]
    CorrelationTimeout { iou_hint: String, waited_ms: u64 },

    /// The restlet endpoint refused the credentials.
    #[error("Credentials rejected by the authority (HTTP {status})")]
    CredentialRejected { status: u16 },

    /// A configured URL could not be parsed or joined.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The callback listener could not be bound.
    #[error("Failed to bind callback server to {address}: {reason}")]
    ServerBind { address: String, reason: String },

    /// Attempted to start a callback server that is already running.
    #[error("Callback server already running on {address}")]
    ServerAlreadyRunning { address: String },

    /// Attempted to stop a callback server that is not running.
    #[error("Callback server not running")]
    ServerNotRunning,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            Error::TransportFailure { .. } => ErrorKind::TransportFailure,
            Error::AuthorityRejected(_) => ErrorKind::AuthorityRejected,
            Error::CorrelationTimeout { .. } => ErrorKind::CorrelationTimeout,
            Error::CredentialRejected { .. } => ErrorKind::CredentialRejected,
            Error::InvalidConfig(_)
            | Error::ServerBind { .. }
            | Error::ServerAlreadyRunning { .. }
            | Error::ServerNotRunning => ErrorKind::Configuration,
        }
    }

    /// Check if a caller may reasonably retry the same request.
    ///
    /// Only transport failures qualify: an authority rejection is final for the
    /// ticket that produced it.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransportFailure
    }

    /// Check if this error was raised before anything reached the wire.
    pub fn is_precondition(&self) -> bool {
        self.kind() == ErrorKind::PreconditionFailed
    }

    /// Check if the authority gave a protocol-level refusal.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AuthorityRejected | ErrorKind::CredentialRejected
        )
    }

    /// Check if this error is a server lifecycle error.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Error::ServerAlreadyRunning { .. } | Error::ServerNotRunning | Error::ServerBind { .. }
        )
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Error", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Shorten an opaque ticket for log output.
///
/// Tickets are bearer credentials; only the first few characters are kept,
/// and short values are masked entirely.
pub(crate) fn ticket_hint(ticket: &str) -> String {
    const VISIBLE: usize = 8;
    if ticket.chars().count() <= VISIBLE {
        return "*".repeat(ticket.chars().count());
    }
    let shown: String = ticket.chars().take(VISIBLE).collect();
    format!("{shown}…")
}
