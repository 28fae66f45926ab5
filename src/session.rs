//! A thin wrapper around one server session token, forwarding the six
//! ledger commands spec §4.2 names. Grounded in `spanner/src/session.rs`'s
//! `SessionHandle`, minus the spanner-specific ping/health-check fields
//! (idle health-checking has no spec counterpart — see DESIGN.md).

use std::sync::Arc;

use crate::transport::{ExecuteStatementResult, FetchPageResult, Transport, TransportError};

/// One server-side authenticated channel. Holds no transaction state
/// between transactions; at most one transaction is in flight on a
/// session at any time (enforced by callers holding exclusive use of a
/// leased session for a transaction's lifetime).
pub struct SessionHandle {
    pub token: String,
    transport: Arc<dyn Transport>,
}

impl SessionHandle {
    pub(crate) fn new(token: String, transport: Arc<dyn Transport>) -> Self {
        SessionHandle { token, transport }
    }

    /// Shared handle to the transport this session was created on, for
    /// collaborators (like [`crate::result::ResultStream`]) that must
    /// outlive a single borrow of the session.
    pub(crate) fn transport_handle(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub async fn start_transaction(&self) -> Result<String, TransportError> {
        self.transport.start_transaction(&self.token).await
    }

    pub async fn execute_statement(
        &self,
        transaction_id: &str,
        statement_text: &str,
        params: Vec<bytes::Bytes>,
    ) -> Result<ExecuteStatementResult, TransportError> {
        self.transport
            .execute_statement(&self.token, transaction_id, statement_text, params)
            .await
    }

    pub async fn fetch_page(
        &self,
        transaction_id: &str,
        next_page_token: &str,
    ) -> Result<FetchPageResult, TransportError> {
        self.transport
            .fetch_page(&self.token, transaction_id, next_page_token)
            .await
    }

    pub async fn commit(
        &self,
        transaction_id: &str,
        commit_digest: [u8; 32],
    ) -> Result<[u8; 32], TransportError> {
        self.transport
            .commit(&self.token, transaction_id, commit_digest)
            .await
    }

    pub async fn abort_transaction(&self, transaction_id: &str) -> Result<(), TransportError> {
        self.transport.abort_transaction(&self.token, transaction_id).await
    }

    /// Best-effort cleanup: errors are logged, never raised (spec §3).
    pub async fn end_session(&self) {
        if let Err(e) = self.transport.end_session(&self.token).await {
            tracing::debug!(session = %self.token, error = %e, "end_session failed (best-effort)");
        }
    }
}
