//! An in-memory fake transport for integration tests. Not a mock of any
//! particular wire protocol — just enough state (sessions, open
//! transactions, a tiny in-memory table) to drive the retry/commit/stream
//! behavior the driver is responsible for.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use bytes::Bytes;

use ledger_driver::transport::{
    ErrorKind, ExecuteStatementResult, FetchPageResult, Page, PageStats, Transport, TransportError,
};

static TRACING_INIT: Once = Once::new();

/// Installs a `tracing` subscriber for the duration of the test binary, so
/// the driver's `tracing::warn!`/`debug!` calls (pool exhaustion, abort
/// failures, best-effort cleanup) are visible with `--nocapture` instead of
/// silently discarded. Idempotent across the many `#[tokio::test]`s in this
/// binary.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One scripted failure: how many times to fail a given call before it
/// starts succeeding, and what error to report meanwhile.
#[derive(Clone)]
pub struct Scripted {
    pub remaining_failures: u32,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Default)]
struct State {
    next_session_id: u64,
    next_txn_id: u64,
    live_sessions: std::collections::HashSet<String>,
    live_transactions: HashMap<String, String>,
    /// Pages queued per transaction id for `execute_statement` /
    /// `fetch_page`, consumed front-to-back.
    pending_pages: HashMap<String, VecDeque<Page>>,
    start_transaction_script: Option<Scripted>,
    commit_script: Option<Scripted>,
    fetch_page_script: Option<Scripted>,
    commits_seen: Vec<[u8; 32]>,
}

pub struct FakeTransport {
    state: Mutex<State>,
    start_session_calls: AtomicU64,
}

impl Default for FakeTransport {
    fn default() -> Self {
        FakeTransport {
            state: Mutex::new(State::default()),
            start_session_calls: AtomicU64::new(0),
        }
    }
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_start_transaction_failures(&self, scripted: Scripted) {
        self.state.lock().unwrap().start_transaction_script = Some(scripted);
    }

    pub fn script_commit_failures(&self, scripted: Scripted) {
        self.state.lock().unwrap().commit_script = Some(scripted);
    }

    pub fn script_fetch_page_failures(&self, scripted: Scripted) {
        self.state.lock().unwrap().fetch_page_script = Some(scripted);
    }

    /// Queues the pages `execute_statement`/`fetch_page` will hand back for
    /// the *next* transaction that's started. First entry is returned as
    /// the first page inline from `execute_statement`.
    pub fn queue_pages(&self, txn_id: &str, pages: Vec<Page>) {
        self.state
            .lock()
            .unwrap()
            .pending_pages
            .insert(txn_id.to_string(), pages.into());
    }

    pub fn start_session_calls(&self) -> u64 {
        self.start_session_calls.load(Ordering::SeqCst)
    }

    pub fn commits_seen(&self) -> Vec<[u8; 32]> {
        self.state.lock().unwrap().commits_seen.clone()
    }

    pub fn live_session_count(&self) -> usize {
        self.state.lock().unwrap().live_sessions.len()
    }
}

fn consume_script(script: &mut Option<Scripted>) -> Option<TransportError> {
    let done = match script {
        Some(s) if s.remaining_failures > 0 => {
            s.remaining_failures -= 1;
            Some(TransportError::new(s.kind, s.message.clone()))
        }
        _ => None,
    };
    done
}

#[async_trait]
impl Transport for FakeTransport {
    async fn start_session(&self) -> Result<String, TransportError> {
        self.start_session_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.next_session_id += 1;
        let token = format!("session-{}", state.next_session_id);
        state.live_sessions.insert(token.clone());
        Ok(token)
    }

    async fn start_transaction(&self, session_token: &str) -> Result<String, TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.live_sessions.contains(session_token) {
            return Err(TransportError::new(ErrorKind::InvalidSession, "unknown session"));
        }
        if let Some(err) = consume_script(&mut state.start_transaction_script) {
            return Err(err);
        }
        state.next_txn_id += 1;
        let txn_id = format!("txn-{}", state.next_txn_id);
        state.live_transactions.insert(txn_id.clone(), session_token.to_string());
        Ok(txn_id)
    }

    async fn execute_statement(
        &self,
        _session_token: &str,
        transaction_id: &str,
        _statement_text: &str,
        _params: Vec<Bytes>,
    ) -> Result<ExecuteStatementResult, TransportError> {
        let mut state = self.state.lock().unwrap();
        let page = state
            .pending_pages
            .get_mut(transaction_id)
            .and_then(|q| q.pop_front())
            .unwrap_or_default();
        Ok(ExecuteStatementResult {
            first_page: page,
            stats: PageStats {
                read_ios: Some(1),
                processing_time_ms: Some(1),
            },
        })
    }

    async fn fetch_page(
        &self,
        _session_token: &str,
        transaction_id: &str,
        _next_page_token: &str,
    ) -> Result<FetchPageResult, TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = consume_script(&mut state.fetch_page_script) {
            return Err(err);
        }
        let page = state
            .pending_pages
            .get_mut(transaction_id)
            .and_then(|q| q.pop_front())
            .unwrap_or_default();
        Ok(FetchPageResult {
            page,
            stats: PageStats {
                read_ios: Some(1),
                processing_time_ms: Some(1),
            },
        })
    }

    async fn commit(
        &self,
        _session_token: &str,
        transaction_id: &str,
        commit_digest: [u8; 32],
    ) -> Result<[u8; 32], TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = consume_script(&mut state.commit_script) {
            return Err(err);
        }
        state.live_transactions.remove(transaction_id);
        state.commits_seen.push(commit_digest);
        Ok(commit_digest)
    }

    async fn abort_transaction(&self, _session_token: &str, transaction_id: &str) -> Result<(), TransportError> {
        self.state.lock().unwrap().live_transactions.remove(transaction_id);
        Ok(())
    }

    async fn end_session(&self, session_token: &str) -> Result<(), TransportError> {
        self.state.lock().unwrap().live_sessions.remove(session_token);
        Ok(())
    }
}

pub fn page_of(values: &[&str], next_page_token: Option<&str>) -> Page {
    Page {
        values: values.iter().map(|s| Bytes::from(s.as_bytes().to_vec())).collect(),
        next_page_token: next_page_token.map(|s| s.to_string()),
    }
}
