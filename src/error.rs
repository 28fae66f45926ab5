//! Error kinds the driver produces or classifies, per spec §7, composed
//! from the lower-level error types the way the teacher composes
//! `SessionError`/`TxError` into one enum callers match on
//! (`spanner/src/client.rs::TxError`, `spanner/src/session.rs::SessionError`).

use crate::codec::CodecError;
use crate::session_pool::SessionError;
use crate::transport::{ErrorKind, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The driver (or its session pool) was used after `close()`.
    #[error("driver closed")]
    DriverClosed,

    /// A transaction was used after it already committed or aborted.
    #[error("transaction already closed")]
    TransactionClosed,

    /// `SessionPool::acquire` timed out.
    #[error("session pool exhausted: acquire timed out")]
    SessionPoolEmpty,

    /// All retries of `StartTransaction` failed; wraps the last server error.
    #[error("start transaction failed after retries: {0}")]
    StartTransactionFailed(#[source] TransportError),

    /// Server commit digest did not match the client's; transaction state
    /// is ambiguous.
    #[error("commit digest mismatch: transaction state is ambiguous")]
    DigestMismatch,

    /// The user callback called `executor.abort()`.
    #[error("transaction aborted by caller")]
    LambdaAborted,

    /// The ledger declared the transaction expired; not retried
    /// transparently, the caller must rerun.
    #[error("transaction expired: {0}")]
    TransactionExpired(#[source] TransportError),

    /// Surfaced only after exhausting session-replacement retries.
    #[error("invalid session: {0}")]
    InvalidSession(#[source] TransportError),

    /// Surfaced only after exhausting OCC-conflict retries.
    #[error("occ conflict: {0}")]
    OccConflict(#[source] TransportError),

    /// A parameter could not be encoded to document bytes.
    #[error("serialization error: {0}")]
    Serialization(#[from] CodecError),

    /// Session-pool-level failure not covered above.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Any other transport/server error, surfaced as-is.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// The structured error kind reported by the transport, if this error
    /// wraps one.
    fn transport_kind(&self) -> Option<ErrorKind> {
        match self {
            Error::StartTransactionFailed(e)
            | Error::TransactionExpired(e)
            | Error::InvalidSession(e)
            | Error::OccConflict(e)
            | Error::Transport(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// `true` if `err` is (or wraps) an OCC conflict reported by the server.
pub fn is_occ_conflict(err: &Error) -> bool {
    matches!(err, Error::OccConflict(_)) || err.transport_kind() == Some(ErrorKind::OccConflict)
}

/// `true` if the server reports the session token is no longer valid,
/// including the "transaction expired" variant.
pub fn is_invalid_session(err: &Error) -> bool {
    matches!(err, Error::InvalidSession(_))
        || matches!(
            err.transport_kind(),
            Some(ErrorKind::InvalidSession) | Some(ErrorKind::TransactionExpired)
        )
}

/// `true` if this is specifically the transaction-expired variant of an
/// invalid-session error.
pub fn is_transaction_expired(err: &Error) -> bool {
    matches!(err, Error::TransactionExpired(_))
        || err.transport_kind() == Some(ErrorKind::TransactionExpired)
        || matches!(err, Error::Transport(e) if transaction_expired_message(&e.message))
}

/// Fallback substring match per spec §9 — used only when no structured
/// signal is present.
fn transaction_expired_message(message: &str) -> bool {
    message.contains("has expired") && message.contains("Transaction")
}

pub fn is_bad_request(err: &Error) -> bool {
    matches!(err, Error::StartTransactionFailed(_))
        || err.transport_kind() == Some(ErrorKind::BadRequest)
}

pub fn is_resource_not_found(err: &Error) -> bool {
    err.transport_kind() == Some(ErrorKind::ResourceNotFound)
}

pub fn is_resource_precondition_not_met(err: &Error) -> bool {
    err.transport_kind() == Some(ErrorKind::ResourcePreconditionNotMet)
}

pub fn is_invalid_parameter(err: &Error) -> bool {
    err.transport_kind() == Some(ErrorKind::InvalidParameter)
}
