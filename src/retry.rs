//! Classifies failures and decides retry vs surface, per spec §4.6.
//! Grounded in `spanner/src/retry.rs`'s `TransactionCondition` /
//! `TransactionRetrySetting` / `invoke_with_session_retry` for the overall
//! shape — a condition object deciding retry-or-not, a backoff iterator,
//! and a loop threading the session back out on failure so the caller can
//! decide reuse vs replace. Spec §4.6's classification table replaces the
//! teacher's gRPC-status-code condition.

use std::time::Duration;

use rand::Rng;

use crate::error::{self, Error};

/// What the retry engine should do about a session after a classified
/// failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionDisposition {
    /// Return the session to the pool for reuse.
    Return,
    /// Discard the session; a replacement must be acquired.
    Discard,
}

/// The decision produced by classifying one failure.
pub enum RetryDecision {
    Retry {
        disposition: SessionDisposition,
        /// `true` for the "invalid session, first encounter" case, which
        /// retries immediately without a backoff sleep (spec §4.6).
        skip_backoff: bool,
    },
    Surface {
        disposition: SessionDisposition,
    },
}

/// Classifies an error per spec §4.6's table. This only decides retry vs
/// surface and session disposition; counting attempts against the retry
/// limit is the caller's job ([`RetryEngine::run`]).
pub fn classify(err: &Error) -> RetryDecision {
    if matches!(err, Error::LambdaAborted) {
        return RetryDecision::Surface {
            disposition: SessionDisposition::Return,
        };
    }
    if error::is_transaction_expired(err) {
        return RetryDecision::Surface {
            disposition: SessionDisposition::Discard,
        };
    }
    if error::is_invalid_session(err) {
        return RetryDecision::Retry {
            disposition: SessionDisposition::Discard,
            skip_backoff: true,
        };
    }
    if error::is_occ_conflict(err) {
        return RetryDecision::Retry {
            disposition: SessionDisposition::Return,
            skip_backoff: false,
        };
    }
    if error::is_bad_request(err) {
        return RetryDecision::Retry {
            disposition: SessionDisposition::Return,
            skip_backoff: false,
        };
    }
    if is_retriable_server_error(err) {
        return RetryDecision::Retry {
            disposition: SessionDisposition::Return,
            skip_backoff: false,
        };
    }
    RetryDecision::Surface {
        disposition: SessionDisposition::Return,
    }
}

fn is_retriable_server_error(err: &Error) -> bool {
    matches!(err, Error::Transport(e) if matches!(
        e.kind,
        crate::transport::ErrorKind::RetriableServer
    ))
}

/// Attempts made in the current `execute_lambda` invocation, passed to the
/// backoff function (spec §3's `ExecutionContext`).
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecutionContext {
    pub attempt: u32,
}

pub type BackoffFn = dyn Fn(u32, &Error, Option<&str>) -> i64 + Send + Sync;

/// `retry_limit` and the backoff function, per spec §3's `RetryConfig`.
pub struct RetryConfig {
    pub retry_limit: u32,
    pub backoff: Box<BackoffFn>,
}

impl RetryConfig {
    pub fn new(retry_limit: u32, backoff: Box<BackoffFn>) -> Self {
        RetryConfig { retry_limit, backoff }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            retry_limit: 4,
            backoff: Box::new(default_backoff),
        }
    }
}

/// `min(cap, base * 2^(attempt-1)) * random_in_[1,2)`, full-jitter-style
/// exponential backoff, per spec §4.6. `base = 10ms`, `cap = 5000ms`.
pub fn default_backoff(attempt: u32, _last_error: &Error, _txn_id: Option<&str>) -> i64 {
    const BASE_MS: u64 = 10;
    const CAP_MS: u64 = 5000;
    let exp = attempt.saturating_sub(1).min(20);
    let raw = BASE_MS.saturating_mul(1u64 << exp);
    let capped = raw.min(CAP_MS);
    let jitter = rand::thread_rng().gen_range(1.0..2.0);
    (capped as f64 * jitter) as i64
}

/// Computes the backoff delay for an attempt, clamping negative results to
/// zero per spec §4.6.
pub fn backoff_delay(config: &RetryConfig, attempt: u32, last_error: &Error, txn_id: Option<&str>) -> Duration {
    let ms = (config.backoff)(attempt, last_error, txn_id).max(0);
    Duration::from_millis(ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ErrorKind, TransportError};

    #[test]
    fn occ_conflict_retries_and_returns_session() {
        let err = Error::OccConflict(TransportError::new(ErrorKind::OccConflict, "conflict"));
        match classify(&err) {
            RetryDecision::Retry { disposition, skip_backoff } => {
                assert_eq!(disposition, SessionDisposition::Return);
                assert!(!skip_backoff);
            }
            RetryDecision::Surface { .. } => panic!("expected retry"),
        }
    }

    #[test]
    fn invalid_session_retries_without_backoff_and_discards() {
        let err = Error::InvalidSession(TransportError::new(ErrorKind::InvalidSession, "gone"));
        match classify(&err) {
            RetryDecision::Retry { disposition, skip_backoff } => {
                assert_eq!(disposition, SessionDisposition::Discard);
                assert!(skip_backoff);
            }
            RetryDecision::Surface { .. } => panic!("expected retry"),
        }
    }

    #[test]
    fn transaction_expired_surfaces_and_discards() {
        let err = Error::TransactionExpired(TransportError::new(ErrorKind::TransactionExpired, "Transaction X has expired"));
        match classify(&err) {
            RetryDecision::Surface { disposition } => assert_eq!(disposition, SessionDisposition::Discard),
            RetryDecision::Retry { .. } => panic!("expected surface"),
        }
    }

    #[test]
    fn lambda_aborted_surfaces_and_returns_session() {
        match classify(&Error::LambdaAborted) {
            RetryDecision::Surface { disposition } => assert_eq!(disposition, SessionDisposition::Return),
            RetryDecision::Retry { .. } => panic!("expected surface"),
        }
    }

    #[test]
    fn default_backoff_is_bounded_by_cap_and_monotone() {
        let err = Error::LambdaAborted;
        for attempt in 1..12 {
            let ms = default_backoff(attempt, &err, None);
            assert!(ms >= 0);
            assert!((ms as f64) <= 5000.0 * 2.0);
        }
    }
}
