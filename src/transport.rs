//! The wire transport to the ledger is an external collaborator (see
//! spec §1): this module only defines the seam the rest of the driver talks
//! through. A real implementation drives whatever RPC protocol the ledger
//! speaks; tests drive an in-memory fake.

use async_trait::async_trait;

/// One page of a result set: an ordered list of codec-opaque value blobs,
/// and an optional opaque cursor to the next page. Absence of the token
/// means "end of result set".
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub values: Vec<bytes::Bytes>,
    pub next_page_token: Option<String>,
}

/// Optional per-call server-reported statistics. `None` means the server did
/// not report anything for this call; callers must not fabricate a zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct PageStats {
    pub read_ios: Option<i64>,
    pub processing_time_ms: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct ExecuteStatementResult {
    pub first_page: Page,
    pub stats: PageStats,
}

#[derive(Clone, Debug)]
pub struct FetchPageResult {
    pub page: Page,
    pub stats: PageStats,
}

/// The ledger commands a [`Transport`] exposes, per spec §4.2. Each call is
/// a single synchronous-in-effect request/response on the underlying
/// connection. A transport neither retries nor classifies errors; it
/// surfaces whatever the server produced as a [`TransportError`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn start_session(&self) -> Result<String, TransportError>;

    async fn start_transaction(&self, session_token: &str) -> Result<String, TransportError>;

    async fn execute_statement(
        &self,
        session_token: &str,
        transaction_id: &str,
        statement_text: &str,
        params: Vec<bytes::Bytes>,
    ) -> Result<ExecuteStatementResult, TransportError>;

    async fn fetch_page(
        &self,
        session_token: &str,
        transaction_id: &str,
        next_page_token: &str,
    ) -> Result<FetchPageResult, TransportError>;

    async fn commit(
        &self,
        session_token: &str,
        transaction_id: &str,
        commit_digest: [u8; 32],
    ) -> Result<[u8; 32], TransportError>;

    async fn abort_transaction(
        &self,
        session_token: &str,
        transaction_id: &str,
    ) -> Result<(), TransportError>;

    async fn end_session(&self, session_token: &str) -> Result<(), TransportError>;
}

/// A structured error class the server (or the transport layer) reports.
/// This is the "code/name/message" structured field spec §6 describes; the
/// error predicates in [`crate::error`] read it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    OccConflict,
    InvalidSession,
    /// Invalid-session variant that names a specific expired transaction.
    TransactionExpired,
    BadRequest,
    ResourceNotFound,
    ResourcePreconditionNotMet,
    InvalidParameter,
    /// Generic retriable server error (5xx / throttling class).
    RetriableServer,
    /// Anything the structured signal doesn't classify; predicates fall
    /// back to a message-substring match only for this variant, per
    /// spec §9's guidance to prefer structured signals.
    Unclassified,
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("transport error ({kind:?}): {message}")]
pub struct TransportError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
