//! The top-level client: owns the session pool and transport, and drives
//! the start-transaction/execute/commit retry loop. Per spec §4.7.
//! Grounded in `spanner/src/client.rs`'s `Client::read_write_transaction`
//! for the "acquire session, loop start-transaction-through-commit,
//! release session per outcome" shape.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time::sleep;

use crate::codec::Codec;
use crate::error::Error;
use crate::retry::{self, ExecutionContext, RetryConfig, RetryDecision, SessionDisposition};
use crate::session_pool::{ManagedSession, PoolConfig, ReleaseMode, SessionPool};
use crate::transaction::{Transaction, TransactionExecutor};
use crate::transport::Transport;

/// Client-side driver runtime for a ledger database, per spec §1-§3.
/// Cheap to clone: internally `Arc`-backed state, mirroring the teacher's
/// `Client` (`spanner/src/client.rs`).
#[derive(Clone)]
pub struct Driver {
    ledger_name: Arc<str>,
    pool: SessionPool,
    codec: Arc<dyn Codec>,
    default_retry: Arc<RetryConfig>,
    closed: Arc<AtomicBool>,
}

enum Outcome {
    Retry,
    Surface,
}

impl Driver {
    pub fn new(
        ledger_name: impl Into<String>,
        transport: Arc<dyn Transport>,
        codec: Arc<dyn Codec>,
        max_sessions: usize,
        retry_config: RetryConfig,
    ) -> Self {
        let pool_config = PoolConfig {
            max_sessions,
            ..PoolConfig::default()
        };
        Driver {
            ledger_name: ledger_name.into().into(),
            pool: SessionPool::new(transport, pool_config),
            codec,
            default_retry: Arc::new(retry_config),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn ledger_name(&self) -> &str {
        &self.ledger_name
    }

    /// Runs `f` inside a transaction, retrying per the classification table
    /// in spec §4.6 until it commits, a non-retriable error surfaces, or
    /// the retry limit is exhausted. `retry_config` overrides the driver's
    /// default for this call only.
    pub async fn execute_lambda<F, Fut, T>(&self, f: F, retry_config: Option<&RetryConfig>) -> Result<T, Error>
    where
        F: Fn(TransactionExecutor<'_>) -> Fut,
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::DriverClosed);
        }

        let config = retry_config.unwrap_or(&self.default_retry);
        let mut session = self.pool.acquire().await.map_err(Error::from)?;
        let mut ctx = ExecutionContext::default();

        loop {
            ctx.attempt += 1;

            let transaction_id = match session.start_transaction().await {
                Ok(id) => id,
                Err(e) => {
                    let err = Error::StartTransactionFailed(e);
                    match self.handle_failure(&mut session, &err, config, &ctx).await? {
                        Outcome::Retry => continue,
                        Outcome::Surface => {
                            self.pool.release(session, ReleaseMode::Return).await;
                            return Err(err);
                        }
                    }
                }
            };

            let transaction = Transaction::new(session, transaction_id, self.codec.clone());
            let result = f(TransactionExecutor::new(&transaction)).await;

            match result {
                Ok(value) => {
                    let commit_result = transaction.commit().await;
                    let mut session_back = transaction.into_session().await;
                    match commit_result {
                        Ok(()) => {
                            self.pool.release(session_back, ReleaseMode::Return).await;
                            return Ok(value);
                        }
                        Err(err) => match self.handle_failure(&mut session_back, &err, config, &ctx).await? {
                            Outcome::Retry => {
                                session = session_back;
                                continue;
                            }
                            Outcome::Surface => {
                                self.pool.release(session_back, ReleaseMode::Return).await;
                                return Err(err);
                            }
                        },
                    }
                }
                Err(err) => {
                    transaction.abort().await;
                    let mut session_back = transaction.into_session().await;
                    match self.handle_failure(&mut session_back, &err, config, &ctx).await? {
                        Outcome::Retry => {
                            session = session_back;
                            continue;
                        }
                        Outcome::Surface => {
                            self.pool.release(session_back, ReleaseMode::Return).await;
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    /// Classifies `err`, applies the session disposition in place — a
    /// discarded session is ended and `*session` is swapped for a freshly
    /// acquired one — sleeps for backoff when the decision calls for it,
    /// and reports whether the caller should retry or surface.
    async fn handle_failure(
        &self,
        session: &mut ManagedSession,
        err: &Error,
        config: &RetryConfig,
        ctx: &ExecutionContext,
    ) -> Result<Outcome, Error> {
        match retry::classify(err) {
            RetryDecision::Surface { disposition } => {
                if disposition == SessionDisposition::Discard {
                    self.replace_session(session).await?;
                }
                Ok(Outcome::Surface)
            }
            RetryDecision::Retry {
                disposition,
                skip_backoff,
            } => {
                if ctx.attempt > config.retry_limit {
                    if disposition == SessionDisposition::Discard {
                        self.replace_session(session).await?;
                    }
                    return Ok(Outcome::Surface);
                }
                if disposition == SessionDisposition::Discard {
                    self.replace_session(session).await?;
                }
                if !skip_backoff {
                    let delay = retry::backoff_delay(config, ctx.attempt, err, None);
                    sleep(delay).await;
                }
                Ok(Outcome::Retry)
            }
        }
    }

    /// Discards the session currently held and acquires a fresh one in its
    /// place.
    async fn replace_session(&self, session: &mut ManagedSession) -> Result<(), Error> {
        let fresh = self.pool.acquire().await.map_err(Error::from)?;
        let old = std::mem::replace(session, fresh);
        self.pool.release(old, ReleaseMode::Discard).await;
        Ok(())
    }

    /// Lists table names by running a metadata-schema query inside a
    /// managed transaction, per spec §4.7. Table names are plain UTF-8
    /// document bytes; no document type system is involved.
    pub async fn list_table_names(&self) -> Result<Vec<String>, Error> {
        self.execute_lambda(
            |tx| async move {
                let result = tx
                    .execute("SELECT name FROM information_schema.user_tables", vec![])
                    .await?;
                let mut names = Vec::with_capacity(result.len());
                for doc in result.into_documents() {
                    names.push(String::from_utf8_lossy(&doc).into_owned());
                }
                Ok(names)
            },
            None,
        )
        .await
    }

    /// Closes the underlying session pool and makes every subsequent call
    /// fail fast with `Error::DriverClosed`.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.pool.close().await;
    }
}
